//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! backend URL, the last used username, and how the session is carried
//! and protected.
//!
//! Configuration is stored at `~/.config/moneytrack/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::{SessionStrategy, DEFAULT_SETTLE_WINDOW_SECS};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "moneytrack";

/// Upper bound for `settle_window_secs`
const MAX_SETTLE_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Environment variable overriding the configured backend URL
pub const BACKEND_URL_ENV: &str = "MONEYTRACK_BACKEND_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub last_username: Option<String>,
    pub strategy: SessionStrategy,
    /// Seconds after login during which a failed refresh does not redirect.
    pub settle_window_secs: i64,
    /// Share one refresh between concurrent expired-session responses.
    pub shared_refresh: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            last_username: None,
            strategy: SessionStrategy::default(),
            settle_window_secs: DEFAULT_SETTLE_WINDOW_SECS,
            shared_refresh: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Backend URL from the environment, then the config file, then the
    /// local development default.
    pub fn backend_url(&self) -> String {
        self.resolve_backend_url(std::env::var(BACKEND_URL_ENV).ok().as_deref())
    }

    pub fn resolve_backend_url(&self, env_value: Option<&str>) -> String {
        let chosen = env_value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| {
                self.backend_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            })
            .unwrap_or(DEFAULT_BACKEND_URL);
        chosen.trim_end_matches('/').to_string()
    }

    /// Negative values are treated as no window; anything over a day is
    /// capped at a day.
    pub fn settle_window(&self) -> Duration {
        Duration::seconds(self.settle_window_secs.clamp(0, MAX_SETTLE_WINDOW_SECS))
    }
}
