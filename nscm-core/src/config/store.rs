use crate::{NscmError, Result};
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const REGISTRY: &str = "registry";
pub const TOKEN: &str = "token";
pub const CONCURRENCY: &str = "concurrency";
pub const THRESHOLD: &str = "threshold";
pub const PUBLIC_REGISTRY: &str = "publicRegistry";
pub const RESOLVER: &str = "resolver";
pub const CLIENT_ID: &str = "clientId";
pub const AUTH_PROXY: &str = "authProxy";
pub const REDIRECT_URI: &str = "redirectUri";
pub const AUTH_DOMAIN: &str = "authDomain";

pub const VALID_KEYS: [&str; 10] = [
    REGISTRY,
    TOKEN,
    CONCURRENCY,
    THRESHOLD,
    PUBLIC_REGISTRY,
    RESOLVER,
    CLIENT_ID,
    AUTH_PROXY,
    REDIRECT_URI,
    AUTH_DOMAIN,
];

pub const DEFAULT_CONCURRENCY: usize = 15;
pub const DEFAULT_THRESHOLD: f64 = 85.0;

const DEFAULTS: [(&str, &str); 7] = [
    (CONCURRENCY, "15"),
    (THRESHOLD, "85"),
    (RESOLVER, "npm"),
    (CLIENT_ID, "Ib0SpoV1Cx3hRaYEVJU523ZjFxmZYzfT"),
    (AUTH_PROXY, "nodesource.registry.nodesource.io"),
    (REDIRECT_URI, "https://platform.nodesource.io/pkce"),
    (AUTH_DOMAIN, "nodesource.auth0.com"),
];

pub fn default_value(key: &str) -> Option<&'static str> {
    DEFAULTS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}

pub fn validate_key(key: &str) -> Result<()> {
    if VALID_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(NscmError::InvalidConfigKey {
            key: key.to_string(),
        })
    }
}

/// Checks a value before it is persisted; numeric keys must parse.
pub fn validate_value(key: &str, value: &str) -> Result<()> {
    validate_key(key)?;

    let invalid = |reason: &str| NscmError::InvalidConfigValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    match key {
        CONCURRENCY => match value.trim().parse::<usize>() {
            Ok(parsed) if parsed > 0 => Ok(()),
            _ => Err(invalid("expected a positive integer")),
        },
        THRESHOLD => match value.trim().parse::<f64>() {
            Ok(parsed) if (0.0..=100.0).contains(&parsed) => Ok(()),
            _ => Err(invalid("expected a number between 0 and 100")),
        },
        RESOLVER => match value.trim() {
            "npm" | "registry" => Ok(()),
            _ => Err(invalid("expected npm or registry")),
        },
        _ if value.trim().is_empty() => Err(invalid("value cannot be empty")),
        _ => Ok(()),
    }
}

/// Persisted key/value settings. Reads fall back to the built-in defaults;
/// writes only ever touch the backing storage.
pub trait ConfigStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn delete(&mut self, key: &str) -> Result<()>;
    fn all(&self) -> BTreeMap<String, String>;
    fn reset(&mut self) -> Result<()>;
}

fn lookup(values: &BTreeMap<String, String>, key: &str) -> Option<String> {
    values
        .get(key)
        .cloned()
        .or_else(|| default_value(key).map(String::from))
}

fn merged(values: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut all: BTreeMap<String, String> = DEFAULTS
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    all.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
    all
}

/// JSON file backed store, one per installation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open_default() -> Result<Self> {
        Self::open(default_config_path())
    }

    pub fn open(path: PathBuf) -> Result<Self> {
        let values = read_values(&path)?;
        Ok(FileStore { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| NscmError::WriteFile {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let object: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        let data = crate::error::to_json_pretty("configuration", &object)?;

        fs::write(&self.path, format!("{data}\n")).map_err(|source| NscmError::WriteFile {
            path: self.path.clone(),
            source,
        })
    }
}

impl ConfigStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lookup(&self.values, key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    fn all(&self) -> BTreeMap<String, String> {
        merged(&self.values)
    }

    fn reset(&mut self) -> Result<()> {
        self.values.clear();
        self.save()
    }
}

/// In-process store used by tests and embedders that manage persistence themselves.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lookup(&self.values, key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }

    fn all(&self) -> BTreeMap<String, String> {
        merged(&self.values)
    }

    fn reset(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(dir) = env::var("NSCM_CONFIG_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir).join("config.json");
    }

    match ProjectDirs::from("io", "nodesource", "nscm") {
        Some(dirs) => dirs.config_dir().join("config.json"),
        None => PathBuf::from(".nscm").join("config.json"),
    }
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }

    let data = fs::read_to_string(path).map_err(|source| NscmError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    if data.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&data).map_err(|source| NscmError::ParseJson {
            path: path.to_path_buf(),
            source,
        })?;

    // Older stores kept numbers as JSON numbers.
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(s) => Some((key, s)),
            serde_json::Value::Null => None,
            other => Some((key, other.to_string())),
        })
        .collect())
}
