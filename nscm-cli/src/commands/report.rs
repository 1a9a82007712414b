use super::{Session, current_project};
use crate::cli::GlobalArgs;
use crate::output;
use anyhow::Result;
use clap::Args;
use nscm_core::operations::report;
use nscm_core::{ConfigStore, console};

#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// Only list packages that are not certified
    #[arg(short = 'f', long)]
    pub failed: bool,
}

pub async fn run(args: ReportArgs, global: &GlobalArgs, store: &dyn ConfigStore) -> Result<()> {
    console::header("report", env!("CARGO_PKG_VERSION"));

    let project = current_project()?;
    let session = Session::open(global, false, store).await?;
    let options = &session.options;

    console::step(&format!(
        "evaluating {}, please wait while we process the information",
        project.display_name()
    ));
    let report = report::build(
        &session.client,
        &session.source,
        &project.contents,
        options.concurrency,
    )
    .await?;

    if options.dot || options.svg {
        let dot = report::to_dot(&report, options.threshold);
        let rendered = if options.svg {
            report::render_svg(&dot).await?
        } else {
            dot
        };
        console::info(rendered.trim_end());
        return Ok(());
    }

    let packages = if args.failed {
        report.failed(options.threshold)
    } else {
        report.packages.clone()
    };

    output::print_packages(&packages, options.json, options.threshold)?;
    console::status(&format!("Total: {}", packages.len()));
    Ok(())
}
