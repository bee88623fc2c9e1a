use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

/// A single cookie scoped to a domain and path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
}

fn default_cookie_path() -> String {
    "/".to_owned()
}

/// Credentials applied to every freshly provisioned renderer session.
///
/// There is deliberately no process-wide credential state: each session
/// provisioning call receives this value explicitly.
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials {
    pub cookies: Vec<Cookie>,
}

impl SessionCredentials {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load cookies from a file.
    ///
    /// Two formats are accepted: a JSON array of cookie objects (each with its
    /// own `domain`/`path` scope), or a browser-copied header string of the
    /// form `name=value; name2=value2`, which is scoped to `fallback_domain`.
    pub fn load(path: &Path, fallback_domain: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read cookie file: {}", path.display()))?;
        let trimmed = raw.trim();

        if trimmed.starts_with('[') {
            let cookies: Vec<Cookie> = serde_json::from_str(trimmed)
                .with_context(|| format!("parse cookie json: {}", path.display()))?;
            return Ok(Self { cookies });
        }

        Self::from_header_string(trimmed, fallback_domain)
            .with_context(|| format!("parse cookie header string: {}", path.display()))
    }

    /// Parse a `name=value; name2=value2` cookie header string.
    pub fn from_header_string(raw: &str, domain: &str) -> anyhow::Result<Self> {
        let mut cookies = Vec::new();
        for entry in raw.split(';') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("cookie entry has no '=': {entry:?}"))?;
            cookies.push(Cookie {
                name: name.trim().to_owned(),
                value: value.trim().to_owned(),
                domain: domain.to_owned(),
                path: "/".to_owned(),
            });
        }
        if cookies.is_empty() {
            anyhow::bail!("cookie string contains no entries");
        }
        Ok(Self { cookies })
    }
}

/// Default cookie scope for a target url: the registrable host with a leading
/// dot, so the cookie also covers subdomains (`www.example.net` -> `.example.net`).
pub fn default_cookie_domain(url: &Url) -> anyhow::Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("url must have a host: {url}"))?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    Ok(format!(".{host}"))
}
