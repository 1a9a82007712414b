use crate::{NscmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// A throwaway manifest depending on a single package, used to resolve
    /// one spec through the same tree source as a real project.
    pub fn with_dependency(name: &str, range: &str) -> Self {
        let mut manifest = Manifest {
            name: Some("nscm-resolve".to_string()),
            version: Some("0.0.0".to_string()),
            ..Manifest::default()
        };
        manifest
            .dependencies
            .insert(name.to_string(), range.to_string());
        manifest
    }

    pub fn to_json(&self) -> Result<String> {
        crate::error::to_json_pretty("manifest", self)
    }
}

/// The Node.js project nscm was invoked in. The manifest text is kept
/// verbatim because resolvers get the file exactly as written.
#[derive(Debug)]
pub struct Project {
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
    pub contents: String,
}

impl Project {
    /// Loads `package.json` from `dir`. Unlike npm there is no walk up the
    /// tree; a missing file is a manifest error.
    pub fn load(dir: &Path) -> Result<Self> {
        let candidate = dir.join("package.json");
        if !candidate.is_file() {
            return Err(NscmError::ManifestMissing {
                path: dir.to_path_buf(),
            });
        }
        Self::from_manifest_path(candidate)
    }

    /// `name@version` from the manifest, falling back to whatever is set.
    pub fn display_name(&self) -> String {
        match (&self.manifest.name, &self.manifest.version) {
            (Some(name), Some(version)) => format!("{name}@{version}"),
            (Some(name), None) => name.clone(),
            _ => "project".to_string(),
        }
    }

    fn from_manifest_path(path: PathBuf) -> Result<Self> {
        let contents = fs::read_to_string(&path).map_err(|source| NscmError::ReadFile {
            path: path.clone(),
            source,
        })?;

        let value: serde_json::Value =
            serde_json::from_str(&contents).map_err(|source| NscmError::ParseJson {
                path: path.clone(),
                source,
            })?;

        if !value.is_object() {
            return Err(NscmError::ManifestInvalid {
                path,
                reason: "expected a JSON object".into(),
            });
        }

        let manifest: Manifest =
            serde_json::from_value(value).map_err(|source| NscmError::ParseJson {
                path: path.clone(),
                source,
            })?;

        Ok(Project {
            manifest_path: path,
            manifest,
            contents,
        })
    }
}
