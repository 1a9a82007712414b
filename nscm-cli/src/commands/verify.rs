use super::{Session, current_project};
use crate::cli::GlobalArgs;
use crate::output;
use anyhow::Result;
use clap::Args;
use nscm_core::operations::verify;
use nscm_core::{ConfigStore, console};
use std::process;

#[derive(Args, Debug)]
pub struct VerifyArgs {}

pub async fn run(_args: VerifyArgs, global: &GlobalArgs, store: &dyn ConfigStore) -> Result<()> {
    console::header("verify", env!("CARGO_PKG_VERSION"));

    let project = current_project()?;
    let session = Session::open(global, false, store).await?;
    let options = &session.options;

    console::step(&format!(
        "please patiently wait while we evaluate the Node modules of {}...",
        project.display_name()
    ));
    let outcome = verify(
        &session.client,
        &session.source,
        &project.contents,
        options.threshold,
        options.concurrency,
    )
    .await?;

    if outcome.whitelisted > 0 {
        console::verbose(&format!(
            "{} uncertified packages are whitelisted",
            outcome.whitelisted
        ));
    }

    if outcome.passed() {
        console::status(&format!(
            "{} all {} packages are certified",
            console::bold_green("✓"),
            outcome.total
        ));
        return Ok(());
    }

    if options.json {
        output::print_packages(&outcome.uncertified, true, options.threshold)?;
    }
    console::error(
        "one or more packages aren't certified, please run `nscm report --failed` for more information",
    );
    process::exit(1);
}
