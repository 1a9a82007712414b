use anyhow::Result;
use clap::Args;
use nscm_core::config::rc;
use nscm_core::operations::{self, AuthSettings};
use nscm_core::{ConfigStore, console};

#[derive(Args, Debug)]
pub struct SignoutArgs {}

pub fn run(_args: SignoutArgs, store: &mut dyn ConfigStore) -> Result<()> {
    console::header("signout", env!("CARGO_PKG_VERSION"));

    let settings = AuthSettings::from_store(store);
    let removed = operations::signout(store, &settings, &rc::global_npmrc_path())?;

    console::verbose(&format!("removed {removed} auth tokens from ~/.npmrc"));
    console::info("signed out");
    Ok(())
}
