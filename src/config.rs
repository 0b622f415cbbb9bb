//! Site configuration module.
//!
//! Handles loading, validating, and layering `podcastr.toml`. Values come from
//! three layers, later layers overriding earlier ones:
//!
//! ```text
//! stock defaults  →  podcastr.toml  →  command-line flags (--api-url, --bind)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! title = "Podcastr"
//! locale = "pt-BR"             # "pt-BR" or "en-US"
//!
//! [api]
//! base_url = "http://localhost:3333"
//! timeout_secs = 10
//!
//! [home]
//! limit = 12                   # Episodes fetched for the home page
//! latest_count = 2             # How many of those go in the "latest" strip
//! revalidate_secs = 28800      # 8 hours
//!
//! [episodes]
//! revalidate_secs = 86400      # 24 hours
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::episode::Locale;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full configuration. Every section has defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub site: SiteSettings,
    pub api: ApiConfig,
    pub home: HomeConfig,
    pub episodes: EpisodesConfig,
    pub server: ServerConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.title.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.title must not be empty".into(),
            ));
        }
        match Url::parse(&self.api.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "api.base_url must be an http(s) URL, got {:?}",
                    self.api.base_url
                )));
            }
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "api.timeout_secs must be non-zero".into(),
            ));
        }
        if self.home.limit == 0 {
            return Err(ConfigError::Validation(
                "home.limit must be non-zero".into(),
            ));
        }
        if self.home.latest_count > self.home.limit {
            return Err(ConfigError::Validation(
                "home.latest_count must not exceed home.limit".into(),
            ));
        }
        if self.home.revalidate_secs == 0 || self.episodes.revalidate_secs == 0 {
            return Err(ConfigError::Validation(
                "revalidate_secs must be non-zero".into(),
            ));
        }
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.bind must be an address like 127.0.0.1:3000, got {:?}",
                self.server.bind
            )));
        }
        Ok(())
    }
}

/// Page-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSettings {
    /// Appended to every page title: `Home | Podcastr`.
    pub title: String,
    /// Locale for publication dates and page labels.
    pub locale: Locale,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            title: "Podcastr".to_string(),
            locale: Locale::PtBr,
        }
    }
}

/// Episodes API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3333".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Home page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HomeConfig {
    /// Episodes requested from the API.
    pub limit: usize,
    /// Leading episodes shown in the "latest" strip; the rest go in the table.
    pub latest_count: usize,
    pub revalidate_secs: u64,
}

impl Default for HomeConfig {
    fn default() -> Self {
        Self {
            limit: 12,
            latest_count: 2,
            revalidate_secs: 60 * 60 * 8,
        }
    }
}

impl HomeConfig {
    pub fn revalidate(&self) -> Duration {
        Duration::from_secs(self.revalidate_secs)
    }
}

/// Episode page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EpisodesConfig {
    pub revalidate_secs: u64,
}

impl Default for EpisodesConfig {
    fn default() -> Self {
        Self {
            revalidate_secs: 60 * 60 * 24,
        }
    }
}

impl EpisodesConfig {
    pub fn revalidate(&self) -> Duration {
        Duration::from_secs(self.revalidate_secs)
    }
}

/// `serve` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

// =============================================================================
// Config loading, layering, and validation
// =============================================================================

/// The stock defaults as a TOML table, the bottom layer of every load.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Lay `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut merged), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                let value = match merged.remove(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            toml::Value::Table(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. A missing file is `Ok(None)`.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Command-line overrides as a TOML overlay.
pub fn cli_overrides(api_url: Option<&str>, bind: Option<&str>) -> toml::Value {
    let mut root = toml::Table::new();
    if let Some(url) = api_url {
        let mut api = toml::Table::new();
        api.insert("base_url".into(), toml::Value::String(url.to_string()));
        root.insert("api".into(), toml::Value::Table(api));
    }
    if let Some(bind) = bind {
        let mut server = toml::Table::new();
        server.insert("bind".into(), toml::Value::String(bind.to_string()));
        root.insert("server".into(), toml::Value::Table(server));
    }
    toml::Value::Table(root)
}

/// Merge layers in order onto the stock defaults, then deserialize and validate.
pub fn resolve_config(
    layers: impl IntoIterator<Item = toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = layers
        .into_iter()
        .fold(stock_defaults_value(), merge_toml);
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path` (if present) with command-line overrides on top.
pub fn load_config(path: &Path, overrides: toml::Value) -> Result<SiteConfig, ConfigError> {
    let file = load_raw_config(path)?;
    resolve_config(file.into_iter().chain(Some(overrides)))
}

/// Returns a fully-commented stock `podcastr.toml` with every key.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Podcastr Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys are an error.

# ---------------------------------------------------------------------------
# Site
# ---------------------------------------------------------------------------
[site]
# Appended to every page title ("Home | Podcastr").
title = "Podcastr"

# Locale of dates and page labels: "pt-BR" (8 fev 21) or "en-US" (8 Feb 21).
locale = "pt-BR"

# ---------------------------------------------------------------------------
# Episodes API
# ---------------------------------------------------------------------------
[api]
# Base URL of the episodes API. Episodes are read from {base_url}/episodes.
base_url = "http://localhost:3333"

# Seconds before a request to the API is abandoned.
timeout_secs = 10

# ---------------------------------------------------------------------------
# Home page
# ---------------------------------------------------------------------------
[home]
# Number of newest episodes shown.
limit = 12

# How many of them are featured in the "latest" strip.
latest_count = 2

# Seconds a served home page is reused before it is rebuilt (8 hours).
revalidate_secs = 28800

# ---------------------------------------------------------------------------
# Episode pages
# ---------------------------------------------------------------------------
[episodes]
# Seconds a served episode page is reused before it is rebuilt (24 hours).
revalidate_secs = 86400

# ---------------------------------------------------------------------------
# Server
# ---------------------------------------------------------------------------
[server]
# Address the `serve` command listens on.
bind = "127.0.0.1:3000"
"##
}
