use nscm_core::operations::whitelist::Confirm;
use nscm_core::operations::Team;
use nscm_core::{FlatPackage, NscmError, Result, console};
use std::io::{self, BufRead, Write};

pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}

/// Print `question` and read one line; end of input is an error.
pub fn line(question: &str) -> Result<String> {
    eprint!("{question}");
    io::stderr()
        .flush()
        .map_err(|source| NscmError::Prompt { source })?;

    let mut input = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut input)
        .map_err(|source| NscmError::Prompt { source })?;

    if read == 0 {
        return Err(NscmError::Prompt {
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"),
        });
    }

    Ok(input.trim().to_string())
}

pub fn password(question: &str) -> Result<String> {
    rpassword::prompt_password(question).map_err(|source| NscmError::Prompt { source })
}

pub fn confirm_yes(question: &str) -> Result<bool> {
    let answer = line(&format!(
        "{} {} ",
        console::yellow("?"),
        console::bold_red(question)
    ))?;
    let answer = answer.to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Ask which team to use until a listed number is entered.
pub fn choose_team(teams: &[Team]) -> Result<&Team> {
    for (index, team) in teams.iter().enumerate() {
        let role = team.role.as_deref().unwrap_or("member");
        console::status(&format!("{}: {} ({})", index + 1, team.name, role));
    }

    loop {
        let answer = line("Enter the number of the NodeSource team you would like to use for this session: ")?;
        match answer.parse::<usize>() {
            Ok(choice) if (1..=teams.len()).contains(&choice) => return Ok(&teams[choice - 1]),
            _ => console::warn(&format!("please enter a number between 1 and {}", teams.len())),
        }
    }
}

/// Per package whitelist questions on stdin.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn begin(&mut self, pending: &[FlatPackage]) {
        console::status(&format!(
            "\n{} packages are not certified! Do you want to add them to the whitelist?",
            console::bold_red(&pending.len().to_string())
        ));
    }

    fn confirm(&mut self, package: &FlatPackage) -> Result<String> {
        line(&format!(
            "{} add {} {} ",
            console::yellow("?"),
            console::bold_green(&package.key()),
            console::dim("[y(es), n(o), a(ll)]")
        ))
    }
}
