use anyhow::Result;
use clap::Parser;
use nscm_core::{ErrorKind, FileStore, NscmError, console};
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;
mod prompt;

use cli::{Cli, Command};
use commands::report::ReportArgs;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Cli::parse();
    init_tracing(args.global.verbose);
    console::set_verbose(args.global.verbose);

    if let Err(err) = run(args).await {
        console::error(&format!("{err:#}"));
        if let Some(hint) = err.downcast_ref::<NscmError>().and_then(|e| hint(e.kind())) {
            console::status(hint);
        }
        process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    let mut store = FileStore::open_default()?;
    tracing::debug!(path = %store.path().display(), "config store");

    match args.command.unwrap_or(Command::Report(ReportArgs::default())) {
        Command::Report(report) => commands::report::run(report, &args.global, &store).await,
        Command::Verify(verify) => commands::verify::run(verify, &args.global, &store).await,
        Command::Whitelist(whitelist) => {
            commands::whitelist::run(whitelist, &args.global, &store).await
        }
        Command::Config(config) => commands::config::run(config, &mut store),
        Command::Signin(signin) => commands::signin::run(signin, &mut store).await,
        Command::Signout(signout) => commands::signout::run(signout, &mut store),
    }
}

fn hint(kind: ErrorKind) -> Option<&'static str> {
    match kind {
        ErrorKind::Configuration => Some("inspect the current values with `nscm config list`"),
        ErrorKind::Transport => Some("check your network connection and HTTP(S)_PROXY settings"),
        _ => None,
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("nscm=debug,nscm_core=debug,nscm_cli=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_follow_the_error_kind() {
        assert!(hint(NscmError::MissingToken.kind()).unwrap().contains("config list"));
        assert!(hint(ErrorKind::Transport).unwrap().contains("PROXY"));
        assert_eq!(hint(NscmError::Authentication.kind()), None);
    }
}
