use crate::config::rc::{self, COMMENT_CHAR, RcLine};
use crate::config::store::{self, ConfigStore};
use crate::{NscmError, Result, console};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

const SCOPE: &str = "email offline_access openid";
const DEVICE: &str = "nscm";

pub type OpenerFn = Box<dyn Fn(&str) -> std::result::Result<(), String> + Send + Sync>;

/// OAuth client settings, read from the config store so they can be
/// pointed at a staging environment.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub client_id: String,
    pub auth_proxy: String,
    pub redirect_uri: String,
    pub auth_domain: String,
}

impl AuthSettings {
    pub fn from_store<S: ConfigStore + ?Sized>(store: &S) -> Self {
        let read = |key: &str| store.get(key).unwrap_or_default();

        AuthSettings {
            client_id: read(store::CLIENT_ID),
            auth_proxy: read(store::AUTH_PROXY),
            redirect_uri: read(store::REDIRECT_URI),
            auth_domain: read(store::AUTH_DOMAIN),
        }
    }

    /// Proxy base url; a bare host means https.
    pub fn proxy_base(&self) -> String {
        let proxy = self.auth_proxy.trim().trim_end_matches('/');
        if proxy.starts_with("http://") || proxy.starts_with("https://") {
            proxy.to_string()
        } else {
            format!("https://{proxy}")
        }
    }

    fn proxy_host(&self) -> String {
        let base = self.proxy_base();
        let rest = base
            .strip_prefix("https://")
            .or_else(|| base.strip_prefix("http://"))
            .unwrap_or(&base);
        rest.split('/').next().unwrap_or(rest).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsoConnection {
    Github,
    Google,
}

impl SsoConnection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SsoConnection::Github => "github",
            SsoConnection::Google => "google-oauth2",
        }
    }
}

/// Proof key pair for the authorization code exchange.
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_verifier(verifier: String) -> Self {
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(digest);
        Pkce {
            verifier,
            challenge,
        }
    }
}

pub fn authorize_url(settings: &AuthSettings, connection: SsoConnection, pkce: &Pkce) -> String {
    let audience = format!("https://{}/userinfo", settings.auth_domain);
    let params = [
        ("connection", connection.as_str()),
        ("audience", audience.as_str()),
        ("scope", SCOPE),
        ("device", DEVICE),
        ("response_type", "code"),
        ("client_id", settings.client_id.as_str()),
        ("code_challenge", pkce.challenge.as_str()),
        ("code_challenge_method", "S256"),
        ("redirect_uri", settings.redirect_uri.as_str()),
    ];

    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    format!("https://{}/authorize?{}", settings.auth_domain, query)
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Team {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Ok(value),
        serde_json::Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a team id, found {other}"
        ))),
    }
}

/// A successful sign-in: the registry token and the teams it grants.
#[derive(Debug, Clone)]
pub struct Grant {
    pub jwt: String,
    pub teams: Vec<Team>,
}

pub fn parse_grant(body: &str) -> Result<Grant> {
    #[derive(Deserialize)]
    struct GrantResponse {
        jwt: Option<String>,
        teams: Option<Vec<Team>>,
    }

    let parsed: GrantResponse = serde_json::from_str(body).map_err(|err| NscmError::Auth {
        reason: format!("unreadable response from auth proxy: {err}"),
    })?;

    let jwt = parsed
        .jwt
        .filter(|jwt| !jwt.trim().is_empty())
        .ok_or_else(|| NscmError::Auth {
            reason: "did not receive JWT".into(),
        })?;

    let teams = parsed.teams.ok_or_else(|| NscmError::Auth {
        reason: "did not receive teams".into(),
    })?;

    if teams.is_empty() {
        return Err(NscmError::Auth {
            reason: "account does not belong to any team".into(),
        });
    }

    Ok(Grant { jwt, teams })
}

async fn post_for_grant<B: Serialize>(client: &Client, url: &str, body: &B) -> Result<Grant> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|source| NscmError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    let text = response.text().await.map_err(|source| NscmError::Http {
        url: url.to_string(),
        source,
    })?;
    tracing::debug!(%url, status = status.as_u16(), "auth proxy response");

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(NscmError::Auth {
            reason: "invalid credentials".into(),
        });
    }

    if status != StatusCode::OK {
        return Err(NscmError::Auth {
            reason: format!("auth proxy answered {status}: {}", text.trim()),
        });
    }

    parse_grant(&text)
}

pub async fn email_signin(
    client: &Client,
    settings: &AuthSettings,
    email: &str,
    password: &str,
) -> Result<Grant> {
    #[derive(Serialize)]
    struct Credentials<'a> {
        email: &'a str,
        password: &'a str,
    }

    let url = format!("{}/-/signin", settings.proxy_base());
    post_for_grant(client, &url, &Credentials { email, password }).await
}

pub async fn exchange_code(
    client: &Client,
    settings: &AuthSettings,
    pkce: &Pkce,
    code: &str,
) -> Result<Grant> {
    #[derive(Serialize)]
    struct Exchange<'a> {
        grant_type: &'a str,
        client_id: &'a str,
        code_verifier: &'a str,
        code: &'a str,
        redirect_uri: &'a str,
    }

    let code = code.trim();
    if code.is_empty() {
        return Err(NscmError::Auth {
            reason: "authorization code is required".into(),
        });
    }

    let url = format!("{}/api-proxy/v1/oauth/token", settings.proxy_base());
    let body = Exchange {
        grant_type: "authorization_code",
        client_id: &settings.client_id,
        code_verifier: &pkce.verifier,
        code,
        redirect_uri: &settings.redirect_uri,
    };
    post_for_grant(client, &url, &body).await
}

/// Browser based sign-in. `read_code` receives the authorize url (to show
/// when the browser cannot be opened) and returns the pasted code.
pub async fn sso_signin<F>(
    client: &Client,
    settings: &AuthSettings,
    connection: SsoConnection,
    opener: OpenerFn,
    read_code: F,
) -> Result<Grant>
where
    F: FnOnce(&str) -> Result<String>,
{
    let pkce = Pkce::generate();
    let url = authorize_url(settings, connection, &pkce);

    if let Err(e) = opener(&url) {
        console::warn(&format!("could not open browser: {e}"));
        console::info(&format!("open a browser and navigate to: {url}"));
    }

    let code = read_code(&url)?;
    exchange_code(client, settings, &pkce, &code).await
}

/// `https://` url of a team's registry: the proxy host with its
/// `nodesource` label swapped for the team id.
pub fn team_registry(settings: &AuthSettings, team: &Team) -> Result<String> {
    if team.id.trim().is_empty() {
        return Err(NscmError::Auth {
            reason: "invalid team".into(),
        });
    }

    let host = settings.proxy_host();
    let host = host.replacen("nodesource", team.id.trim(), 1);
    rc::normalize_registry_url(&host).ok_or_else(|| NscmError::Auth {
        reason: format!("could not build a registry url from {host}"),
    })
}

/// Persist a sign-in: token in the global npmrc and the store, registry in
/// the local npmrc and the store.
pub fn apply_signin<S>(
    store: &mut S,
    global_npmrc: &Path,
    local_npmrc: &Path,
    registry: &str,
    jwt: &str,
) -> Result<()>
where
    S: ConfigStore + ?Sized,
{
    let token_key = rc::auth_token_key(registry).ok_or_else(|| NscmError::Auth {
        reason: format!("invalid registry url: {registry}"),
    })?;

    rc::update(global_npmrc, COMMENT_CHAR, |file| {
        file.set(&token_key, jwt);
    })?;
    store.set(store::TOKEN, jwt)?;

    rc::update(local_npmrc, COMMENT_CHAR, |file| {
        file.remove_where(|key, value| key == "registry" && value == registry);
        file.comment_out_where(|key, _| key == "registry");
        file.lines.push(RcLine::entry("registry", registry));
    })?;
    store.set(store::REGISTRY, registry)?;

    tracing::debug!(%registry, "stored credentials");
    Ok(())
}

/// Remove every auth token issued under the proxy's domain from the global
/// npmrc and forget the stored token. Returns how many entries were removed.
pub fn signout<S>(store: &mut S, settings: &AuthSettings, global_npmrc: &Path) -> Result<usize>
where
    S: ConfigStore + ?Sized,
{
    let proxy_host = settings.proxy_host();
    let domain = match proxy_host.split_once('.') {
        Some((_, rest)) if rest.contains('.') => rest.to_string(),
        _ => proxy_host.clone(),
    };

    let mut removed = 0;
    if global_npmrc.is_file() {
        rc::update(global_npmrc, COMMENT_CHAR, |file| {
            removed = file.remove_where(|key, _| {
                rc::auth_token_location(key)
                    .map(|location| {
                        let host = location.split('/').next().unwrap_or_default().to_string();
                        host == domain || host.ends_with(&format!(".{domain}"))
                    })
                    .unwrap_or(false)
            });
        })?;
    }

    store.delete(store::TOKEN)?;
    tracing::debug!(removed, %domain, "signed out");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn settings(proxy: &str) -> AuthSettings {
        AuthSettings {
            client_id: "client".into(),
            auth_proxy: proxy.into(),
            redirect_uri: "https://platform.test/pkce".into(),
            auth_domain: "auth.test".into(),
        }
    }

    #[test]
    fn pkce_challenge_matches_rfc_vector() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".into());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn generated_verifier_is_url_safe() {
        let pkce = Pkce::generate();
        assert_eq!(pkce.verifier.len(), 43);
        assert!(
            pkce.verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn authorize_url_carries_challenge() {
        let pkce = Pkce::from_verifier("verifier".into());
        let url = authorize_url(&settings("proxy.test"), SsoConnection::Google, &pkce);
        assert!(url.starts_with("https://auth.test/authorize?connection=google-oauth2&"));
        assert!(url.contains(&format!("code_challenge={}", pkce.challenge)));
        assert!(url.contains("scope=email%20offline_access%20openid"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fplatform.test%2Fpkce"));
    }

    #[test]
    fn grant_requires_jwt_and_teams() {
        assert!(parse_grant(r#"{"teams":[{"id":"t"}]}"#).is_err());
        assert!(parse_grant(r#"{"jwt":"x"}"#).is_err());

        let grant = parse_grant(r#"{"jwt":"x","teams":[{"id":42,"name":"Acme","role":"admin"}]}"#)
            .unwrap();
        assert_eq!(grant.teams[0].id, "42");
    }

    #[test]
    fn team_registry_replaces_first_label() {
        let team = Team {
            id: "acme".into(),
            name: "Acme".into(),
            role: None,
        };
        let registry =
            team_registry(&settings("nodesource.registry.nodesource.io"), &team).unwrap();
        assert_eq!(registry, "https://acme.registry.nodesource.io");
    }

    #[tokio::test]
    async fn email_signin_posts_credentials() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/-/signin")
                .json_body(json!({"email": "dev@acme.test", "password": "hunter2"}));
            then.status(200)
                .json_body(json!({"jwt": "token-1", "teams": [{"id": "acme", "name": "Acme"}]}));
        });

        let grant = email_signin(&Client::new(), &settings(&server.base_url()), "dev@acme.test", "hunter2")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(grant.jwt, "token-1");
    }

    #[tokio::test]
    async fn code_exchange_sends_verifier() {
        let server = MockServer::start();
        let pkce = Pkce::from_verifier("verifier-123".into());
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api-proxy/v1/oauth/token")
                .json_body_includes(
                    json!({"grant_type": "authorization_code", "code_verifier": "verifier-123", "code": "abc"})
                        .to_string(),
                );
            then.status(200)
                .json_body(json!({"jwt": "token-2", "teams": [{"id": "acme"}]}));
        });

        let grant = exchange_code(&Client::new(), &settings(&server.base_url()), &pkce, " abc\n")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(grant.jwt, "token-2");
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/-/signin");
            then.status(401).json_body(json!({"message": "nope"}));
        });

        let err = email_signin(&Client::new(), &settings(&server.base_url()), "a", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, NscmError::Auth { .. }));
    }

    #[test]
    fn signin_rewrites_both_npmrc_files() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.npmrc");
        let local = dir.path().join("local.npmrc");
        fs::write(
            &global,
            "email=dev@acme.test\n//acme.registry.nodesource.io/:_authToken=old\n",
        )
        .unwrap();
        fs::write(&local, "registry=https://registry.npmjs.org/\nsave-exact=true\n").unwrap();

        let mut store = MemoryStore::new();
        apply_signin(
            &mut store,
            &global,
            &local,
            "https://acme.registry.nodesource.io",
            "new-jwt",
        )
        .unwrap();

        let global_text = fs::read_to_string(&global).unwrap();
        assert!(global_text.contains("email=dev@acme.test"));
        assert!(global_text.contains("//acme.registry.nodesource.io/:_authToken=new-jwt"));
        assert!(!global_text.contains("=old"));

        let local_text = fs::read_to_string(&local).unwrap();
        assert!(local_text.contains("#registry=https://registry.npmjs.org/"));
        assert!(local_text.contains("save-exact=true"));
        assert!(local_text.ends_with("registry=https://acme.registry.nodesource.io\n"));

        assert_eq!(store.get(store::TOKEN).as_deref(), Some("new-jwt"));
        assert_eq!(
            store.get(store::REGISTRY).as_deref(),
            Some("https://acme.registry.nodesource.io")
        );
    }

    #[test]
    fn signout_removes_only_proxy_tokens() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join(".npmrc");
        fs::write(
            &global,
            "//acme.registry.nodesource.io/:_authToken=a\n//registry.npmjs.org/:_authToken=b\n//other.registry.nodesource.io/:_authToken=c\n",
        )
        .unwrap();

        let mut store = MemoryStore::new().with(store::TOKEN, "a");
        let removed = signout(
            &mut store,
            &settings("nodesource.registry.nodesource.io"),
            &global,
        )
        .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(
            fs::read_to_string(&global).unwrap(),
            "//registry.npmjs.org/:_authToken=b\n"
        );
        assert_eq!(store.get(store::TOKEN), None);
    }
}
