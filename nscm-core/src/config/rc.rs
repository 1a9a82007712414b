use crate::{NscmError, Result};
use directories::BaseDirs;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const COMMENT_CHAR: char = '#';

const AUTH_TOKEN_SUFFIX: &str = ":_authToken";

/// One line of an npm style rc file. Lines that are not `key=value` pairs
/// are kept verbatim so rewriting a file never loses content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RcLine {
    Blank,
    Entry {
        key: String,
        value: String,
        commented: bool,
    },
    Other(String),
}

impl RcLine {
    pub fn entry(key: &str, value: &str) -> Self {
        RcLine::Entry {
            key: key.to_string(),
            value: value.to_string(),
            commented: false,
        }
    }

    fn active(&self) -> Option<(&str, &str)> {
        match self {
            RcLine::Entry {
                key,
                value,
                commented: false,
            } => Some((key.as_str(), value.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RcFile {
    pub lines: Vec<RcLine>,
}

impl RcFile {
    pub fn parse(raw: &str, comment_char: char) -> Self {
        let lines = raw
            .lines()
            .map(|line| parse_line(line, comment_char))
            .collect();
        RcFile { lines }
    }

    pub fn stringify(&self, comment_char: char) -> String {
        if self.lines.is_empty() {
            return String::new();
        }

        let mut out = self
            .lines
            .iter()
            .map(|line| match line {
                RcLine::Blank => String::new(),
                RcLine::Entry {
                    key,
                    value,
                    commented,
                } => {
                    if *commented {
                        format!("{comment_char}{key}={value}")
                    } else {
                        format!("{key}={value}")
                    }
                }
                RcLine::Other(text) => text.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        out.push('\n');
        out
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(RcLine::active)
    }

    /// Replace every active entry for `key` with a single new one at the end.
    pub fn set(&mut self, key: &str, value: &str) {
        self.remove_where(|k, _| k == key);
        self.lines.push(RcLine::entry(key, value));
    }

    /// Drop active entries matching the predicate; returns how many were removed.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&str, &str) -> bool,
    {
        let before = self.lines.len();
        self.lines.retain(|line| match line.active() {
            Some((k, v)) => !predicate(k, v),
            None => true,
        });
        before - self.lines.len()
    }

    pub fn comment_out_where<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        for line in &mut self.lines {
            if let RcLine::Entry {
                key,
                value,
                commented,
            } = line
                && !*commented
                && predicate(key, value)
            {
                *commented = true;
            }
        }
    }
}

fn parse_line(line: &str, comment_char: char) -> RcLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return RcLine::Blank;
    }

    let Some((raw_key, raw_value)) = trimmed.split_once('=') else {
        return RcLine::Other(line.to_string());
    };

    let raw_key = raw_key.trim();
    let (key, commented) = match raw_key.strip_prefix(comment_char) {
        Some(rest) => (rest.trim_start(), true),
        None => (raw_key, false),
    };

    if key.is_empty() {
        return RcLine::Other(line.to_string());
    }

    RcLine::Entry {
        key: key.to_string(),
        value: raw_value.trim().to_string(),
        commented,
    }
}

pub fn read(path: &Path, comment_char: char) -> Result<RcFile> {
    if !path.is_file() {
        return Ok(RcFile::default());
    }

    fs::read_to_string(path)
        .map(|content| RcFile::parse(&content, comment_char))
        .map_err(|source| NscmError::ReadFile {
            path: path.to_path_buf(),
            source,
        })
}

pub fn write(path: &Path, rc: &RcFile, comment_char: char) -> Result<()> {
    fs::write(path, rc.stringify(comment_char)).map_err(|source| NscmError::WriteFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Read, transform and rewrite an rc file, creating it when missing.
pub fn update<F>(path: &Path, comment_char: char, edit: F) -> Result<()>
where
    F: FnOnce(&mut RcFile),
{
    let mut rc = read(path, comment_char)?;
    edit(&mut rc);
    write(path, &rc, comment_char)
}

pub fn global_npmrc_path() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".npmrc"))
        .unwrap_or_else(|| PathBuf::from(".npmrc"))
}

pub fn local_npmrc_path() -> PathBuf {
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".npmrc")
}

/// `//host/path/:_authToken` for a registry url, the key npm uses for bearer tokens.
pub fn auth_token_key(registry_url: &str) -> Option<String> {
    let location = registry_location(registry_url)?;
    Some(format!("//{location}/{AUTH_TOKEN_SUFFIX}"))
}

/// Looks up the bearer token stored for `registry_url`, ignoring scheme,
/// letter case and trailing slashes.
pub fn auth_token_for(rc: &RcFile, registry_url: &str) -> Option<String> {
    let wanted = registry_location(registry_url)?;

    rc.entries()
        .filter(|(_, value)| !value.is_empty())
        .filter_map(|(key, value)| {
            let location = auth_token_location(key)?;
            (location == wanted).then(|| value.to_string())
        })
        .last()
}

/// Host (and path) part of an `//host/:_authToken` key.
pub fn auth_token_location(key: &str) -> Option<String> {
    let rest = key.strip_prefix("//")?;
    let location = rest.strip_suffix(AUTH_TOKEN_SUFFIX)?;
    let location = location.trim_end_matches('/').to_ascii_lowercase();
    if location.is_empty() {
        None
    } else {
        Some(location)
    }
}

fn registry_location(registry_url: &str) -> Option<String> {
    let normalized = normalize_registry_url(registry_url)?;
    let location = normalized
        .strip_prefix("https://")
        .unwrap_or(&normalized)
        .to_string();
    Some(location)
}

/// Forces `https://`, lowercases the host, drops the scheme's default port
/// and any trailing slash. Returns `None` for an empty host.
pub fn normalize_registry_url(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let was_http = trimmed.starts_with("http://");
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .or_else(|| trimmed.strip_prefix("//"))
        .unwrap_or(trimmed);

    let rest = rest.trim_end_matches('/');
    let mut parts = rest.splitn(2, '/');
    let hostport = parts.next().unwrap_or("").to_ascii_lowercase();
    let suffix = parts.next().unwrap_or("");

    let host = match hostport.split_once(':') {
        Some((host, "443")) => host.to_string(),
        Some((host, "80")) if was_http => host.to_string(),
        _ => hostport,
    };

    if host.is_empty() {
        return None;
    }

    if suffix.is_empty() {
        Some(format!("https://{}", host))
    } else {
        Some(format!("https://{}/{}", host, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Last active value wins, as npm reads it.
    fn get<'a>(rc: &'a RcFile, key: &str) -> Option<&'a str> {
        rc.entries()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v)
            .last()
    }

    const NPMRC: &str = "init.author.name=Max Harris
email=npm@nodesource.com
//registry.npmjs.org/:_authToken=ab01234c-5678
progress=false
#commentedkey=value
# must be mode 0600

//acme.registry.nodesource.io/:_authToken=jwt-value
";

    #[test]
    fn parses_entries_comments_and_blank_lines() {
        let rc = RcFile::parse(NPMRC, COMMENT_CHAR);

        assert_eq!(rc.lines.len(), 8);
        assert_eq!(rc.lines[0], RcLine::entry("init.author.name", "Max Harris"));
        assert_eq!(
            rc.lines[4],
            RcLine::Entry {
                key: "commentedkey".into(),
                value: "value".into(),
                commented: true,
            }
        );
        assert_eq!(rc.lines[5], RcLine::Other("# must be mode 0600".into()));
        assert_eq!(rc.lines[6], RcLine::Blank);
        assert_eq!(get(&rc, "progress"), Some("false"));
        assert_eq!(get(&rc, "commentedkey"), None);
    }

    #[test]
    fn stringify_round_trips() {
        let rc = RcFile::parse(NPMRC, COMMENT_CHAR);
        assert_eq!(rc.stringify(COMMENT_CHAR), NPMRC);
    }

    #[test]
    fn keeps_equals_signs_inside_values() {
        let rc = RcFile::parse("_auth=dXNlcjpwYXNz==\n", COMMENT_CHAR);
        assert_eq!(get(&rc, "_auth"), Some("dXNlcjpwYXNz=="));
    }

    #[test]
    fn lines_with_empty_keys_are_preserved_verbatim() {
        let rc = RcFile::parse("=bar\nfoo=\n", COMMENT_CHAR);
        assert_eq!(rc.lines[0], RcLine::Other("=bar".into()));
        assert_eq!(get(&rc, "foo"), Some(""));
    }

    #[test]
    fn finds_token_for_registry_regardless_of_scheme() {
        let rc = RcFile::parse(NPMRC, COMMENT_CHAR);
        assert_eq!(
            auth_token_for(&rc, "https://acme.registry.nodesource.io/").as_deref(),
            Some("jwt-value")
        );
        assert_eq!(
            auth_token_for(&rc, "acme.registry.nodesource.io").as_deref(),
            Some("jwt-value")
        );
        assert_eq!(auth_token_for(&rc, "https://other.test"), None);
    }

    #[test]
    fn set_replaces_existing_key() {
        let mut rc = RcFile::parse("registry=https://a.test\nregistry=https://b.test\n", '#');
        rc.set("registry", "https://c.test");
        assert_eq!(rc.stringify('#'), "registry=https://c.test\n");
    }

    #[test]
    fn update_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".npmrc");

        update(&path, COMMENT_CHAR, |rc| {
            rc.set("//a.test/:_authToken", "t0k3n");
        })
        .unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "//a.test/:_authToken=t0k3n\n"
        );
    }

    #[test]
    fn normalizes_registry_urls_to_https() {
        assert_eq!(
            normalize_registry_url("http://A.test:443/path/").as_deref(),
            Some("https://a.test/path")
        );
        assert_eq!(
            normalize_registry_url("//a.test").as_deref(),
            Some("https://a.test")
        );
        assert_eq!(
            normalize_registry_url("a.test").as_deref(),
            Some("https://a.test")
        );
        assert_eq!(normalize_registry_url("https://"), None);
    }

    #[test]
    fn drops_default_http_port_when_upgrading() {
        assert_eq!(
            normalize_registry_url("http://h.test:80/").as_deref(),
            Some("https://h.test")
        );
        assert_eq!(
            normalize_registry_url("https://h.test:80").as_deref(),
            Some("https://h.test:80")
        );
        assert_eq!(
            normalize_registry_url("http://h.test:8080").as_deref(),
            Some("https://h.test:8080")
        );
    }

    #[test]
    fn builds_auth_token_keys() {
        assert_eq!(
            auth_token_key("https://team.registry.nodesource.io").as_deref(),
            Some("//team.registry.nodesource.io/:_authToken")
        );
    }
}
