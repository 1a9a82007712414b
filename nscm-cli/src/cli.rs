use crate::commands;
use clap::{Args, Parser, Subcommand};
use nscm_core::{Overrides, ResolverKind};

#[derive(Parser, Debug)]
#[command(
    name = "nscm",
    about = "NodeSource Certified Modules",
    version,
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Defaults to `report` when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Certified modules registry url
    #[arg(short = 'r', long, global = true, value_name = "URL")]
    pub registry: Option<String>,

    /// Registry auth token
    #[arg(short = 't', long, global = true)]
    pub token: Option<String>,

    /// Only production dependencies
    #[arg(short = 'p', long, global = true)]
    pub production: bool,

    /// Maximum concurrent registry requests
    #[arg(short = 'c', long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Print JSON instead of a table
    #[arg(short = 'j', long, global = true)]
    pub json: bool,

    /// Print the dependency graph in Graphviz DOT format
    #[arg(short = 'd', long, global = true, conflicts_with = "svg")]
    pub dot: bool,

    /// Render the dependency graph as SVG (requires Graphviz)
    #[arg(short = 's', long, global = true)]
    pub svg: bool,

    /// Where the dependency tree comes from: npm or registry
    #[arg(long, global = true, value_name = "KIND")]
    pub resolver: Option<String>,

    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn overrides(&self, all: bool) -> anyhow::Result<Overrides> {
        let resolver = self
            .resolver
            .as_deref()
            .map(str::parse::<ResolverKind>)
            .transpose()?;

        Ok(Overrides {
            registry: self.registry.clone(),
            token: self.token.clone(),
            concurrency: self.concurrency.map(usize::from),
            resolver,
            production: self.production,
            json: self.json,
            dot: self.dot,
            svg: self.svg,
            all,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score every dependency of the current project
    #[command(visible_alias = "r")]
    Report(commands::report::ReportArgs),
    /// Exit non-zero if any dependency is uncertified and not whitelisted
    Verify(commands::verify::VerifyArgs),
    /// Review uncertified dependencies and manage the whitelist
    #[command(visible_alias = "w")]
    Whitelist(commands::whitelist::WhitelistArgs),
    /// Read and write persisted settings
    #[command(visible_alias = "c")]
    Config(commands::config::ConfigArgs),
    /// Sign in and configure the team registry
    Signin(commands::signin::SigninArgs),
    /// Remove stored registry credentials
    Signout(commands::signout::SignoutArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_has_no_subcommand() {
        let cli = Cli::try_parse_from(["nscm"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn global_flags_work_after_subcommands() {
        let cli = Cli::try_parse_from([
            "nscm",
            "whitelist",
            "add",
            "gpl-2.0@1.0.0",
            "--registry",
            "https://a.test",
            "-c",
            "3",
        ])
        .unwrap();

        let overrides = cli.global.overrides(false).unwrap();
        assert_eq!(overrides.registry.as_deref(), Some("https://a.test"));
        assert_eq!(overrides.concurrency, Some(3));
        assert!(matches!(cli.command, Some(Command::Whitelist(_))));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(Cli::try_parse_from(["nscm", "--concurrency", "0"]).is_err());
    }

    #[test]
    fn aliases_resolve() {
        let cli = Cli::try_parse_from(["nscm", "r", "--failed"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Report(ref args)) if args.failed));
    }

    #[test]
    fn unknown_resolver_is_an_error() {
        let cli = Cli::try_parse_from(["nscm", "--resolver", "yarn"]).unwrap();
        assert!(cli.global.overrides(false).is_err());
    }
}
