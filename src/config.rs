//! Configuration parsing and validation.
//!
//! Jira Harness is configured via a TOML file (default:
//! `./config/jsync.toml`). The file is deserialized into [`Config`] and
//! validated by [`load_config`].
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/jsync.sqlite"
//!
//! [jira]
//! base_url = "https://acme.atlassian.net"
//! email = "bot@acme.com"
//! # api_token = "..."        # or set JIRA_API_TOKEN
//! timeout_secs = 30
//! page_size = 100
//! ```
//!
//! # Environment Variables
//!
//! - `JIRA_API_TOKEN`: used when `jira.api_token` is absent from the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::ClientConfig;

/// Environment variable consulted when the config file carries no token.
pub const API_TOKEN_ENV: &str = "JIRA_API_TOKEN";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub jira: JiraConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub email: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_page_size() -> usize {
    100
}

impl JiraConfig {
    /// Token from the file, or from [`API_TOKEN_ENV`] if the file has none.
    pub fn resolved_token(&self) -> Result<String> {
        match &self.api_token {
            Some(token) if !token.is_empty() => Ok(token.clone()),
            _ => std::env::var(API_TOKEN_ENV).with_context(|| {
                format!(
                    "jira.api_token not set and {} environment variable not set",
                    API_TOKEN_ENV
                )
            }),
        }
    }

    /// Build per-call client settings from this section.
    pub fn client_config(&self) -> Result<ClientConfig> {
        Ok(ClientConfig {
            base_url: self.base_url.clone(),
            email: self.email.clone(),
            api_token: self.resolved_token()?,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let base = config.jira.base_url.trim();
    if base.is_empty() {
        anyhow::bail!("jira.base_url must not be empty");
    }
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        anyhow::bail!("jira.base_url must start with http:// or https://");
    }
    if config.jira.email.trim().is_empty() {
        anyhow::bail!("jira.email must not be empty");
    }
    if config.jira.timeout_secs == 0 {
        anyhow::bail!("jira.timeout_secs must be > 0");
    }
    if config.jira.page_size == 0 {
        anyhow::bail!("jira.page_size must be > 0");
    }
    Ok(())
}
