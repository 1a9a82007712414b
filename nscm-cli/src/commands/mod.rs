pub mod config;
pub mod report;
pub mod signin;
pub mod signout;
pub mod verify;
pub mod whitelist;

use crate::cli::GlobalArgs;
use anyhow::Result;
use nscm_core::config::{rc, resolve_options};
use nscm_core::{AnySource, ConfigStore, NpmConfig, Options, Project, RegistryClient};
use std::env;

/// Everything a registry backed command needs.
pub struct Session {
    pub options: Options,
    pub client: RegistryClient,
    pub source: AnySource,
}

impl Session {
    pub async fn open<S>(global: &GlobalArgs, all: bool, store: &S) -> Result<Self>
    where
        S: ConfigStore + ?Sized,
    {
        let overrides = global.overrides(all)?;
        let options =
            resolve_options(overrides, store, &NpmConfig, &rc::global_npmrc_path()).await?;
        let client = RegistryClient::from_options(&options)?;
        let source = AnySource::from_options(&options, &client);

        Ok(Session {
            options,
            client,
            source,
        })
    }
}

/// The project in the working directory. Loaded before any network call so
/// a missing manifest fails fast.
pub fn current_project() -> Result<Project> {
    let cwd = env::current_dir()?;
    let project = Project::load(&cwd)?;
    tracing::debug!(manifest = %project.manifest_path.display(), "loaded project");
    Ok(project)
}
