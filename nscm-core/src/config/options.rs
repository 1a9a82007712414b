use super::rc::{self, COMMENT_CHAR};
use super::store::{self, ConfigStore, DEFAULT_CONCURRENCY, DEFAULT_THRESHOLD};
use crate::{NscmError, Result};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;

/// Where the dependency tree comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverKind {
    /// `npm install --dry-run --json` against the public registry.
    #[default]
    Npm,
    /// `POST {registry}/packages` with the manifest contents.
    Registry,
}

impl ResolverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolverKind::Npm => "npm",
            ResolverKind::Registry => "registry",
        }
    }
}

impl FromStr for ResolverKind {
    type Err = NscmError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "npm" => Ok(ResolverKind::Npm),
            "registry" | "remote" => Ok(ResolverKind::Registry),
            other => Err(NscmError::InvalidConfigValue {
                key: store::RESOLVER.to_string(),
                value: other.to_string(),
                reason: "expected npm or registry".to_string(),
            }),
        }
    }
}

/// Values supplied on the command line. Anything left `None` falls through
/// to the store and then to derived sources.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub registry: Option<String>,
    pub token: Option<String>,
    pub concurrency: Option<usize>,
    pub resolver: Option<ResolverKind>,
    pub production: bool,
    pub json: bool,
    pub dot: bool,
    pub svg: bool,
    pub all: bool,
}

/// Fully resolved settings for one command invocation.
#[derive(Debug, Clone)]
pub struct Options {
    pub registry: String,
    pub token: String,
    pub concurrency: usize,
    pub threshold: f64,
    pub public_registry: Option<String>,
    pub resolver: ResolverKind,
    pub production: bool,
    pub json: bool,
    pub dot: bool,
    pub svg: bool,
    pub all: bool,
}

impl Options {
    /// Options with defaults for everything but the registry endpoint and token.
    pub fn new(registry: &str, token: &str) -> Self {
        Options {
            registry: registry.trim_end_matches('/').to_string(),
            token: token.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            threshold: DEFAULT_THRESHOLD,
            public_registry: None,
            resolver: ResolverKind::Npm,
            production: false,
            json: false,
            dot: false,
            svg: false,
            all: false,
        }
    }
}

/// Asks the host package manager for its configured registry.
pub trait RegistryDiscovery {
    fn discover_registry(&self) -> impl Future<Output = Option<String>> + Send;
}

/// Merge overrides, the persisted store and derived credentials into one
/// `Options` value. Fails closed on a missing registry or token.
pub async fn resolve_options<S, D>(
    overrides: Overrides,
    store: &S,
    discovery: &D,
    npmrc_path: &Path,
) -> Result<Options>
where
    S: ConfigStore + ?Sized,
    D: RegistryDiscovery,
{
    let concurrency = match overrides.concurrency {
        Some(value) => positive_concurrency(value.to_string())?,
        None => match store.get(store::CONCURRENCY) {
            Some(value) => positive_concurrency(value)?,
            None => DEFAULT_CONCURRENCY,
        },
    };

    let threshold = match store.get(store::THRESHOLD) {
        Some(value) => parse_threshold(value)?,
        None => DEFAULT_THRESHOLD,
    };

    let resolver = match overrides.resolver {
        Some(kind) => kind,
        None => match store.get(store::RESOLVER) {
            Some(value) => value.parse()?,
            None => ResolverKind::default(),
        },
    };

    let public_registry = store
        .get(store::PUBLIC_REGISTRY)
        .filter(|value| !value.trim().is_empty());

    let raw_registry = match non_empty(overrides.registry).or_else(|| non_empty(store.get(store::REGISTRY))) {
        Some(value) => value,
        None => discovery
            .discover_registry()
            .await
            .ok_or(NscmError::MissingRegistry)?,
    };

    let registry = rc::normalize_registry_url(&raw_registry).ok_or(NscmError::MissingRegistry)?;
    tracing::debug!(%registry, "resolved registry");

    let token = match non_empty(overrides.token).or_else(|| non_empty(store.get(store::TOKEN))) {
        Some(token) => token,
        None => {
            let npmrc = rc::read(npmrc_path, COMMENT_CHAR)?;
            rc::auth_token_for(&npmrc, &registry).ok_or(NscmError::MissingToken)?
        }
    };

    let mut options = Options::new(&registry, &token);
    options.concurrency = concurrency;
    options.threshold = threshold;
    options.public_registry = public_registry;
    options.resolver = resolver;
    options.production = overrides.production;
    options.json = overrides.json;
    options.dot = overrides.dot;
    options.svg = overrides.svg;
    options.all = overrides.all;
    Ok(options)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn positive_concurrency(value: String) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(NscmError::InvalidConfigValue {
            key: store::CONCURRENCY.to_string(),
            value,
            reason: "expected a positive integer".to_string(),
        }),
    }
}

fn parse_threshold(value: String) -> Result<f64> {
    match value.trim().parse::<f64>() {
        Ok(parsed) if (0.0..=100.0).contains(&parsed) => Ok(parsed),
        _ => Err(NscmError::InvalidConfigValue {
            key: store::THRESHOLD.to_string(),
            value,
            reason: "expected a number between 0 and 100".to_string(),
        }),
    }
}
