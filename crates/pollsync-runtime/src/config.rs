//! Runtime configuration resolved once from CLI flags and environment.

use anyhow::{Context, bail};
use reqwest::Url;

const CHANNEL_PATH: &str = "/ws";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// REST base without a trailing slash, query or fragment.
    pub backend_url: String,
    pub channel_url: String,
}

impl RuntimeConfig {
    pub fn resolve(backend_url: &str, channel_url: Option<&str>) -> anyhow::Result<Self> {
        let backend = parse_backend(backend_url)?;

        let channel_url = match channel_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => {
                let parsed = Url::parse(url).with_context(|| format!("invalid channel URL: {url}"))?;
                if !matches!(parsed.scheme(), "ws" | "wss") || parsed.host_str().is_none() {
                    bail!("channel URL must be ws:// or wss:// with a host: {url}");
                }
                url.to_string()
            }
            None => derive_channel_url(&backend)?,
        };

        Ok(Self {
            backend_url: backend.as_str().trim_end_matches('/').to_string(),
            channel_url,
        })
    }
}

fn parse_backend(backend_url: &str) -> anyhow::Result<Url> {
    let raw = backend_url.trim();
    let mut url = Url::parse(raw).with_context(|| format!("invalid backend URL: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("backend URL must start with http:// or https://: {raw}");
    }
    if url.host_str().is_none() {
        bail!("backend URL has no host: {raw}");
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Push channel endpoint served next to the REST API.
///
/// ```text
/// http://127.0.0.1:3000       -> ws://127.0.0.1:3000/ws
/// https://polls.example/api   -> wss://polls.example/ws
/// ```
fn derive_channel_url(backend: &Url) -> anyhow::Result<String> {
    let scheme = if backend.scheme() == "https" { "wss" } else { "ws" };
    let mut url = backend.clone();
    if url.set_scheme(scheme).is_err() {
        bail!("cannot derive channel URL from {backend}");
    }
    url.set_path(CHANNEL_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}
