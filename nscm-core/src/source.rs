use crate::config::{Options, RegistryDiscovery, ResolverKind};
use crate::registry::RegistryClient;
use crate::tree::PackageNode;
use crate::{NscmError, Result};
use std::fs;
use std::future::Future;
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;

/// Produces the resolved dependency tree for a manifest.
pub trait TreeSource {
    fn resolve(&self, manifest_json: &str) -> impl Future<Output = Result<PackageNode>> + Send;
}

/// Parse resolver output. A body carrying an `error` field is the
/// resolver reporting failure, not a tree.
pub fn parse_tree(bytes: &[u8]) -> Result<PackageNode> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|err| NscmError::Resolution {
            reason: format!("unreadable resolver output: {err}"),
        })?;

    if let Some(error) = value.get("error") {
        let reason = match error {
            serde_json::Value::String(message) => message.clone(),
            serde_json::Value::Object(fields) => fields
                .get("summary")
                .or_else(|| fields.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| error.to_string()),
            other => other.to_string(),
        };
        return Err(NscmError::Resolution { reason });
    }

    serde_json::from_value(value).map_err(|err| NscmError::Resolution {
        reason: format!("unexpected tree shape: {err}"),
    })
}

fn npm_program() -> &'static str {
    if cfg!(windows) { "npm.cmd" } else { "npm" }
}

/// Resolves through `npm install --dry-run --json` in a scratch directory
/// so the project's own `node_modules` is never touched.
#[derive(Debug, Clone)]
pub struct NpmDryRun {
    pub program: String,
    pub public_registry: Option<String>,
    pub production: bool,
}

impl NpmDryRun {
    pub fn new(public_registry: Option<String>, production: bool) -> Self {
        NpmDryRun {
            program: npm_program().to_string(),
            public_registry,
            production,
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "install".to_string(),
            "--dry-run".to_string(),
            "--json".to_string(),
        ];
        if let Some(registry) = &self.public_registry {
            args.push("--registry".to_string());
            args.push(registry.clone());
        }
        if self.production {
            args.push("--production".to_string());
        }
        args
    }
}

impl TreeSource for NpmDryRun {
    async fn resolve(&self, manifest_json: &str) -> Result<PackageNode> {
        let scratch = TempDir::with_prefix("nscm-").map_err(|source| NscmError::Spawn {
            command: "mktemp".to_string(),
            source,
        })?;
        let manifest_path = scratch.path().join("package.json");
        fs::write(&manifest_path, manifest_json).map_err(|source| NscmError::WriteFile {
            path: manifest_path.clone(),
            source,
        })?;

        let args = self.args();
        let command_line = format!("{} {}", self.program, args.join(" "));
        tracing::debug!(command = %command_line, dir = %scratch.path().display(), "running resolver");

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| NscmError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        // npm reports resolution failures as JSON on stdout with a non zero
        // exit, so stdout is parsed before the status is checked.
        match parse_tree(&output.stdout) {
            Ok(tree) => Ok(tree),
            Err(err) if output.status.success() => Err(err),
            Err(NscmError::Resolution { reason }) if !output.stdout.is_empty() => {
                Err(NscmError::Resolution { reason })
            }
            Err(_) => Err(NscmError::Resolution {
                reason: format!(
                    "{} exited with {}: {}",
                    command_line,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }),
        }
    }
}

/// Server side resolution through the certification registry.
#[derive(Debug, Clone)]
pub struct RegistryResolver {
    client: RegistryClient,
}

impl RegistryResolver {
    pub fn new(client: RegistryClient) -> Self {
        RegistryResolver { client }
    }
}

impl TreeSource for RegistryResolver {
    async fn resolve(&self, manifest_json: &str) -> Result<PackageNode> {
        self.client.resolve_manifest(manifest_json).await
    }
}

/// The configured tree source.
#[derive(Debug, Clone)]
pub enum AnySource {
    Npm(NpmDryRun),
    Registry(RegistryResolver),
}

impl AnySource {
    pub fn from_options(options: &Options, client: &RegistryClient) -> Self {
        match options.resolver {
            ResolverKind::Npm => AnySource::Npm(NpmDryRun::new(
                options.public_registry.clone(),
                options.production,
            )),
            ResolverKind::Registry => AnySource::Registry(RegistryResolver::new(client.clone())),
        }
    }
}

impl TreeSource for AnySource {
    async fn resolve(&self, manifest_json: &str) -> Result<PackageNode> {
        match self {
            AnySource::Npm(source) => source.resolve(manifest_json).await,
            AnySource::Registry(source) => source.resolve(manifest_json).await,
        }
    }
}

/// Reads the registry npm itself is configured with.
#[derive(Debug, Clone, Default)]
pub struct NpmConfig;

impl RegistryDiscovery for NpmConfig {
    async fn discover_registry(&self) -> Option<String> {
        let output = Command::new(npm_program())
            .args(["config", "ls"])
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                registry_from_npm_config(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::debug!(status = %output.status, "npm config ls failed");
                None
            }
            Err(err) => {
                tracing::debug!(error = %err, "npm is not available");
                None
            }
        }
    }
}

/// Last `registry = "<url>"` line of `npm config ls` output.
pub fn registry_from_npm_config(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once('=')?;
            if key.trim() != "registry" {
                return None;
            }
            let value = value.trim();
            let value = value.strip_prefix('"')?.strip_suffix('"')?;
            (!value.is_empty()).then(|| value.to_string())
        })
        .last()
}
