use super::{Session, current_project};
use crate::cli::GlobalArgs;
use crate::output;
use crate::prompt::{self, StdinConfirm};
use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use nscm_core::operations::whitelist::{self, Reconciler};
use nscm_core::{ConfigStore, PackageSpec, console};

#[derive(Args, Debug)]
pub struct WhitelistArgs {
    /// Add every uncertified package without asking
    #[arg(short = 'a', long)]
    pub all: bool,

    #[command(subcommand)]
    pub action: Option<WhitelistAction>,
}

#[derive(Subcommand, Debug)]
pub enum WhitelistAction {
    /// Show whitelisted packages
    #[command(visible_alias = "l", alias = "ls")]
    List,
    /// Whitelist a package and everything it depends on
    #[command(visible_alias = "a")]
    Add {
        /// `name[@version]`
        package: String,
        /// Version or range, when not given in the package spec
        version: Option<String>,
    },
    /// Remove a package from the whitelist
    #[command(visible_alias = "d", alias = "del")]
    Delete {
        /// `name[@version]`
        package: String,
    },
    /// Remove every package from the whitelist
    Reset {
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

pub async fn run(args: WhitelistArgs, global: &GlobalArgs, store: &dyn ConfigStore) -> Result<()> {
    console::header("whitelist", env!("CARGO_PKG_VERSION"));

    match args.action {
        None => start(args.all, global, store).await,
        Some(WhitelistAction::List) => {
            let session = Session::open(global, false, store).await?;
            let entries = whitelist::list(&session.client).await?;
            output::print_whitelist(&entries, session.options.json)?;
            console::status(&format!(
                "{} packages exist in the whitelist.",
                console::bold_green(&entries.len().to_string())
            ));
            Ok(())
        }
        Some(WhitelistAction::Add { package, version }) => {
            let mut spec = PackageSpec::parse(&package);
            if spec.name.is_empty() {
                bail!("please provide a package name");
            }
            if spec.version.is_none() {
                spec.version = version.filter(|v| !v.trim().is_empty());
            }

            let session = Session::open(global, false, store).await?;
            console::step("please wait while we process the information");
            let added = whitelist::add(
                &session.client,
                &session.source,
                &spec,
                session.options.concurrency,
            )
            .await?;

            output::print_whitelist(&added, session.options.json)?;
            console::status(&format!(
                "{} packages were added to the whitelist.",
                console::bold_green(&added.len().to_string())
            ));
            Ok(())
        }
        Some(WhitelistAction::Delete { package }) => {
            let spec = PackageSpec::parse(&package);
            if spec.name.is_empty() {
                bail!("please provide a package name");
            }

            let session = Session::open(global, false, store).await?;
            whitelist::delete(&session.client, &spec).await?;
            console::status(&format!(
                "{} was removed from the whitelist.",
                console::bold_green(&spec.to_string())
            ));
            Ok(())
        }
        Some(WhitelistAction::Reset { yes }) => {
            if !yes && !prompt::confirm_yes("Are you sure?")? {
                return Ok(());
            }

            let session = Session::open(global, false, store).await?;
            let removed = whitelist::reset(&session.client, session.options.concurrency).await?;
            console::status(&format!(
                "{} packages were removed from the whitelist.",
                console::bold_green(&removed.len().to_string())
            ));
            Ok(())
        }
    }
}

async fn start(all: bool, global: &GlobalArgs, store: &dyn ConfigStore) -> Result<()> {
    if !all && !prompt::is_interactive() {
        bail!("stdin is not a terminal, pass --all to whitelist every uncertified package");
    }

    let project = current_project()?;
    let session = Session::open(global, all, store).await?;

    console::step(&format!(
        "please patiently wait while we evaluate the Node modules of {}...",
        project.display_name()
    ));
    let mut reconciler = Reconciler::new(&session.client, &session.source, &session.options);
    let outcome = reconciler.run(&project.contents, &mut StdinConfirm).await?;

    if outcome.already_whitelisted > 0 {
        console::verbose(&format!(
            "{} uncertified packages were already whitelisted",
            outcome.already_whitelisted
        ));
    }

    if outcome.added.is_empty() {
        console::status("no packages were added to the whitelist.");
        return Ok(());
    }

    output::print_whitelist(&outcome.added, session.options.json)?;
    console::status(&format!(
        "{} packages were added to the whitelist.",
        console::bold_green(&outcome.added.len().to_string())
    ));
    Ok(())
}
