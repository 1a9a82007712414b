use anyhow::Result;
use clap::{Args, Subcommand};
use nscm_core::config::store::{self, validate_key, validate_value};
use nscm_core::{ConfigStore, console};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Persist a setting
    Set { key: String, value: String },
    /// Print one setting
    Get { key: String },
    /// Forget a setting, falling back to its default
    #[command(alias = "del")]
    Delete { key: String },
    /// Print every setting
    #[command(visible_alias = "ls")]
    List,
    /// Forget every setting
    Reset,
}

pub fn run(args: ConfigArgs, store: &mut dyn ConfigStore) -> Result<()> {
    match args.action.unwrap_or(ConfigAction::List) {
        ConfigAction::Set { key, value } => {
            validate_value(&key, &value)?;
            store.set(&key, value.trim())?;
            console::status(&format!("{} set", console::bold_green(&key)));
        }
        ConfigAction::Get { key } => {
            validate_key(&key)?;
            match store.get(&key) {
                Some(value) => console::info(&value),
                None => console::status(&console::dim(&format!("{key} is not set"))),
            }
        }
        ConfigAction::Delete { key } => {
            validate_key(&key)?;
            store.delete(&key)?;
            console::status(&format!("{} deleted", console::bold_green(&key)));
        }
        ConfigAction::List => {
            for (key, value) in store.all() {
                let shown = if key == store::TOKEN { mask(&value) } else { value };
                console::info(&format!("{} = {}", key, shown));
            }
        }
        ConfigAction::Reset => {
            store.reset()?;
            console::status("configuration restored to defaults");
        }
    }

    Ok(())
}

fn mask(token: &str) -> String {
    let count = token.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
