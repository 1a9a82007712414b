use anyhow::Result;
use nscm_core::operations::report;
use nscm_core::{FlatPackage, WhitelistEntry, console};

const NAME_WIDTH: usize = 36;
const VERSION_WIDTH: usize = 15;
const SCORE_WIDTH: usize = 8;

fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        format!("{text:<width$}")
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn rule() -> String {
    console::dim(&format!(
        "{}  {}  {}",
        "─".repeat(NAME_WIDTH),
        "─".repeat(VERSION_WIDTH),
        "─".repeat(SCORE_WIDTH)
    ))
}

fn header(third: &str) -> String {
    format!(
        "{}  {}  {}",
        console::bold_green(&fit("Package", NAME_WIDTH)),
        console::bold_green(&fit("Version", VERSION_WIDTH)),
        console::bold_green(&fit(third, SCORE_WIDTH))
    )
}

pub fn package_table(packages: &[FlatPackage], threshold: f64) -> String {
    let mut lines = vec![header("Score"), rule()];

    for package in packages {
        let score_text = package
            .score
            .map(|score| format!("{score}"))
            .unwrap_or_else(|| "-".to_string());
        let padding = " ".repeat(SCORE_WIDTH.saturating_sub(score_text.chars().count()));

        lines.push(format!(
            "{}  {}  {}{}",
            fit(&package.name, NAME_WIDTH),
            fit(&package.version, VERSION_WIDTH),
            console::score(package.score, threshold),
            padding
        ));
    }

    lines.join("\n")
}

pub fn whitelist_table(entries: &[WhitelistEntry]) -> String {
    let mut lines = vec![
        format!(
            "{}  {}",
            console::bold_green(&fit("Package", NAME_WIDTH)),
            console::bold_green(&fit("Version", VERSION_WIDTH))
        ),
        console::dim(&format!(
            "{}  {}",
            "─".repeat(NAME_WIDTH),
            "─".repeat(VERSION_WIDTH)
        )),
    ];

    for entry in entries {
        lines.push(format!(
            "{}  {}",
            fit(&entry.name, NAME_WIDTH),
            fit(&entry.version, VERSION_WIDTH)
        ));
    }

    lines.join("\n")
}

pub fn print_packages(packages: &[FlatPackage], json: bool, threshold: f64) -> Result<()> {
    if json {
        console::info(&report::to_json(packages)?);
    } else {
        console::info(&package_table(packages, threshold));
    }
    Ok(())
}

pub fn print_whitelist(entries: &[WhitelistEntry], json: bool) -> Result<()> {
    if json {
        console::info(&serde_json::to_string_pretty(entries)?);
    } else {
        console::info(&whitelist_table(entries));
    }
    Ok(())
}
