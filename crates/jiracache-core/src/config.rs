use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_SERVER: &str = "127.0.0.1:8085";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// `host:port`, or a Unix socket path (`/path` or `unix:/path`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Base URL of the issue tracker web UI, used to open issues.
    #[serde(
        default,
        rename = "browse-url",
        alias = "browse_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub browse_url: Option<String>,

    #[serde(default, rename = "log_level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("server address is empty")]
    EmptyServer,
    #[error("browse-url must be an http(s) URL with a host: {url}")]
    InvalidBrowseUrl { url: String },
}

impl ConfigFile {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let cfg: ConfigFile = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(server) = &self.server {
            if server.trim().is_empty() {
                return Err(ConfigError::EmptyServer);
            }
        }
        if let Some(raw) = &self.browse_url {
            let raw = raw.trim();
            let web = Url::parse(raw)
                .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
                .unwrap_or(false);
            if !web {
                return Err(ConfigError::InvalidBrowseUrl {
                    url: raw.to_owned(),
                });
            }
        }
        Ok(())
    }

    pub fn effective_server(&self) -> &str {
        match self.server.as_deref().map(str::trim) {
            Some(server) if !server.is_empty() => server,
            _ => DEFAULT_SERVER,
        }
    }

    /// Web link for `key`, when a browse URL is configured.
    pub fn browse_link(&self, key: &str) -> Option<String> {
        let base = self.browse_url.as_deref()?.trim().trim_end_matches('/');
        Some(format!("{base}/browse/{key}"))
    }
}
