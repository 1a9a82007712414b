use crate::prompt;
use anyhow::Result;
use clap::Args;
use nscm_core::config::rc;
use nscm_core::operations::{self, AuthSettings, SsoConnection};
use nscm_core::registry::http_client;
use nscm_core::{ConfigStore, console};

#[derive(Args, Debug)]
pub struct SigninArgs {
    /// Sign in with GitHub
    #[arg(short = 'g', long, conflicts_with = "google")]
    pub github: bool,
    /// Sign in with Google
    #[arg(short = 'o', long)]
    pub google: bool,
}

pub async fn run(args: SigninArgs, store: &mut dyn ConfigStore) -> Result<()> {
    console::header("signin", env!("CARGO_PKG_VERSION"));

    let settings = AuthSettings::from_store(store);
    let client = http_client()?;

    let connection = if args.github {
        Some(SsoConnection::Github)
    } else if args.google {
        Some(SsoConnection::Google)
    } else {
        None
    };

    let grant = match connection {
        Some(connection) => {
            console::status("a browser will launch and ask you to sign in.");
            operations::sso_signin(
                &client,
                &settings,
                connection,
                Box::new(|url| open::that(url).map_err(|e| e.to_string())),
                |_| prompt::line("once you have the authorization code, please enter it here: "),
            )
            .await?
        }
        None => {
            let email = prompt::line("email: ")?;
            let password = prompt::password("password: ")?;
            operations::email_signin(&client, &settings, &email, &password).await?
        }
    };

    let team = match grant.teams.as_slice() {
        [only] => only,
        teams => prompt::choose_team(teams)?,
    };

    let registry = operations::team_registry(&settings, team)?;
    operations::apply_signin(
        store,
        &rc::global_npmrc_path(),
        &rc::local_npmrc_path(),
        &registry,
        &grant.jwt,
    )?;

    console::info(&format!(
        "successfully logged into team: {}",
        console::bold_green(if team.name.is_empty() { &team.id } else { &team.name })
    ));
    Ok(())
}
