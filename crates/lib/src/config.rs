//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.docbot/config.json`) and environment.
//! The only setting today is the backend base URL; the token file lives next to
//! the config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Base URL used when neither config nor environment provides one.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Backend base URL. Overridden by DOCBOT_API_URL env when set.
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Resolve config path from env or default (~/.docbot/config.json).
pub fn default_config_path() -> PathBuf {
    std::env::var("DOCBOT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".docbot").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Default path for the stored bearer token.
pub fn default_token_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".docbot").join("token"))
        .unwrap_or_else(|| PathBuf::from("token"))
}

/// Resolve the backend base URL: env DOCBOT_API_URL overrides config.
/// Trailing slashes are trimmed so endpoint paths can be appended directly.
pub fn resolve_api_url(config: &Config) -> String {
    let url = std::env::var("DOCBOT_API_URL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            config
                .api_url
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    url.trim_end_matches('/').to_string()
}

/// Load config from the default path (or DOCBOT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
