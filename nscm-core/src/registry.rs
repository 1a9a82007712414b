use crate::tree::{FlatPackage, PackageNode, PackageSpec};
use crate::{NscmError, Options, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const USER_AGENT: &str = concat!("nscm/", env!("CARGO_PKG_VERSION"));

/// A `name@version` exempted from the certification threshold.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WhitelistEntry {
    pub name: String,
    pub version: String,
}

impl WhitelistEntry {
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

impl From<&FlatPackage> for WhitelistEntry {
    fn from(package: &FlatPackage) -> Self {
        WhitelistEntry {
            name: package.name.clone(),
            version: package.version.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ScoreResponse {
    score: Option<f64>,
}

/// Authenticated client for the certification registry. Cheap to clone;
/// clones share one connection pool.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base: String,
    token: String,
}

impl RegistryClient {
    pub fn new(base: &str, token: &str) -> Result<Self> {
        Ok(RegistryClient {
            client: http_client()?,
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn from_options(options: &Options) -> Result<Self> {
        Self::new(&options.registry, &options.token)
    }

    /// Trust score for one package version. Only a 401 or a transport
    /// failure is an error; any other outcome means "no score".
    pub async fn package_score(&self, name: &str, version: &str) -> Result<Option<f64>> {
        let url = format!(
            "{}/api/v1/package?name={}&version={}",
            self.base,
            urlencoding::encode(name),
            urlencoding::encode(version)
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| NscmError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        tracing::debug!(%name, %version, status = status.as_u16(), "score response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(NscmError::Authentication);
        }

        if !status.is_success() {
            return Ok(None);
        }

        match response.json::<ScoreResponse>().await {
            Ok(body) => Ok(body.score),
            Err(err) => {
                tracing::debug!(%name, %version, error = %err, "unreadable score body");
                Ok(None)
            }
        }
    }

    pub async fn whitelist(&self) -> Result<Vec<WhitelistEntry>> {
        let url = format!("{}/api/v1/whitelist", self.base);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| NscmError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "whitelist response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(NscmError::Authentication);
        }

        if status != StatusCode::OK {
            return Err(NscmError::WhitelistFetch {
                status: status.as_u16(),
            });
        }

        response
            .json::<Vec<WhitelistEntry>>()
            .await
            .map_err(|source| NscmError::Http { url, source })
    }

    /// Adds one package and returns the entry the registry echoed back.
    pub async fn add_to_whitelist(&self, package: &FlatPackage) -> Result<WhitelistEntry> {
        let url = format!("{}/api/v1/whitelist", self.base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(package)
            .send()
            .await
            .map_err(|source| NscmError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        tracing::debug!(package = %package.key(), status = status.as_u16(), "whitelist add");

        if status == StatusCode::UNAUTHORIZED {
            return Err(NscmError::Authentication);
        }

        if status != StatusCode::OK {
            return Err(NscmError::WhitelistAdd {
                package: package.key(),
            });
        }

        Ok(response
            .json::<WhitelistEntry>()
            .await
            .unwrap_or_else(|_| WhitelistEntry::from(package)))
    }

    pub async fn delete_from_whitelist(&self, spec: &PackageSpec) -> Result<()> {
        let mut url = format!(
            "{}/api/v1/whitelist?name={}",
            self.base,
            urlencoding::encode(&spec.name)
        );
        if let Some(version) = &spec.version {
            url.push_str("&version=");
            url.push_str(&urlencoding::encode(version));
        }

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| NscmError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        tracing::debug!(package = %spec, status = status.as_u16(), "whitelist delete");

        if status == StatusCode::UNAUTHORIZED {
            return Err(NscmError::Authentication);
        }

        if status != StatusCode::OK {
            return Err(NscmError::WhitelistDelete {
                package: spec.to_string(),
            });
        }

        Ok(())
    }

    /// Server side resolution of a manifest into a dependency tree.
    pub async fn resolve_manifest(&self, manifest_json: &str) -> Result<PackageNode> {
        let url = format!("{}/packages", self.base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(manifest_json.to_string())
            .send()
            .await
            .map_err(|source| NscmError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "resolution response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(NscmError::Authentication);
        }

        if !status.is_success() {
            return Err(NscmError::Resolution {
                reason: format!("registry answered {status}"),
            });
        }

        let body = response.bytes().await.map_err(|source| NscmError::Http {
            url: url.clone(),
            source,
        })?;

        crate::source::parse_tree(&body)
    }
}

/// Shared client builder; proxies come from `HTTP(S)_PROXY`.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|source| NscmError::HttpClient { source })
}
