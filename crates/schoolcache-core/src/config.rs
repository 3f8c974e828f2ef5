//! Application configuration management.
//!
//! This module handles loading and saving the configuration: where the
//! school store lives, the API key used to reach it, cache freshness and
//! request timeout, and the last student shown.
//!
//! Configuration is stored at `~/.config/schoolcache/config.json`. The
//! `SCHOOLCACHE_URL`, `SCHOOLCACHE_API_KEY` and `SCHOOLCACHE_STALE_TTL_SECS`
//! environment variables override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::rest::DEFAULT_TIMEOUT_SECS;
use crate::cache::{CacheSettings, DEFAULT_STALE_TTL_SECS};

/// Application name used for config directory paths
const APP_NAME: &str = "schoolcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_URL: &str = "SCHOOLCACHE_URL";
pub const ENV_API_KEY: &str = "SCHOOLCACHE_API_KEY";
pub const ENV_STALE_TTL: &str = "SCHOOLCACHE_STALE_TTL_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub stale_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub last_student_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            api_key: None,
            stale_ttl_secs: DEFAULT_STALE_TTL_SECS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            last_student_id: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults when absent), then apply environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_URL) {
            self.backend_url = Some(url);
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(ttl) = get(ENV_STALE_TTL) {
            self.stale_ttl_secs = ttl
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds, got '{}'", ENV_STALE_TTL, ttl))?;
        }
        Ok(())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            stale_ttl: Duration::from_secs(self.stale_ttl_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
