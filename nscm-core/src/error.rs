use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NscmError {
    #[error("registry option required, set it with `nscm config set registry <url>` or pass --registry")]
    MissingRegistry,

    #[error("token option required, please run `nscm signin` or set a correct token")]
    MissingToken,

    #[error("{key} isn't a valid configuration key")]
    InvalidConfigKey { key: String },

    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidConfigValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("authentication error, please run `nscm signin` or set a correct token")]
    Authentication,

    #[error("request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("failed to build http client: {source}")]
    HttpClient { source: reqwest::Error },

    #[error("Failed to read file {path:?}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },

    #[error("Failed to write file {path:?}: {source}")]
    WriteFile { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse JSON in {path:?}: {source}")]
    ParseJson { path: PathBuf, source: serde_json::Error },

    #[error("failed to encode {what} as JSON: {source}")]
    EncodeJson {
        what: &'static str,
        source: serde_json::Error,
    },

    #[error("no `package.json` found at {path:?}, please run `nscm` inside a Node.js project")]
    ManifestMissing { path: PathBuf },

    #[error("Invalid manifest in {path:?}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("dependency resolution failed: {reason}")]
    Resolution { reason: String },

    #[error("the package {spec} can't be resolved, please specify a valid name and version")]
    UnresolvablePackage { spec: String },

    #[error("we are unable to add {package} to the whitelist")]
    WhitelistAdd { package: String },

    #[error("we are unable to delete {package} from the whitelist")]
    WhitelistDelete { package: String },

    #[error("we are unable to retrieve the whitelist (status {status})")]
    WhitelistFetch { status: u16 },

    #[error("signin failed: {reason}")]
    Auth { reason: String },

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("background task failed: {reason}")]
    Task { reason: String },

    #[error("prompt failed: {source}")]
    Prompt { source: std::io::Error },
}

/// Coarse classification used by callers that only care about the failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    Transport,
    Manifest,
    Registry,
    Io,
}

impl NscmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NscmError::MissingRegistry
            | NscmError::MissingToken
            | NscmError::InvalidConfigKey { .. }
            | NscmError::InvalidConfigValue { .. } => ErrorKind::Configuration,
            NscmError::Authentication | NscmError::Auth { .. } => ErrorKind::Authentication,
            NscmError::Http { .. } | NscmError::HttpClient { .. } => ErrorKind::Transport,
            NscmError::ManifestMissing { .. }
            | NscmError::ManifestInvalid { .. }
            | NscmError::ParseJson { .. } => ErrorKind::Manifest,
            NscmError::Resolution { .. }
            | NscmError::UnresolvablePackage { .. }
            | NscmError::WhitelistAdd { .. }
            | NscmError::WhitelistDelete { .. }
            | NscmError::WhitelistFetch { .. } => ErrorKind::Registry,
            NscmError::ReadFile { .. }
            | NscmError::WriteFile { .. }
            | NscmError::EncodeJson { .. }
            | NscmError::Spawn { .. }
            | NscmError::Task { .. }
            | NscmError::Prompt { .. } => ErrorKind::Io,
        }
    }
}

/// Pretty JSON for output and persisted files.
pub fn to_json_pretty<T>(what: &'static str, value: &T) -> Result<String, NscmError>
where
    T: Serialize + ?Sized,
{
    serde_json::to_string_pretty(value).map_err(|source| NscmError::EncodeJson { what, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn encode_failures_are_io_errors() {
        let mut unencodable: BTreeMap<Vec<u8>, u8> = BTreeMap::new();
        unencodable.insert(vec![1], 1);

        let err = to_json_pretty("report", &unencodable).unwrap_err();
        assert!(matches!(err, NscmError::EncodeJson { what: "report", .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().starts_with("failed to encode report as JSON"));
    }

    #[test]
    fn configuration_errors_name_the_fix() {
        assert_eq!(NscmError::MissingToken.kind(), ErrorKind::Configuration);
        assert!(NscmError::MissingRegistry.to_string().contains("nscm config set registry"));
    }
}
