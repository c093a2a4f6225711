//! Layered configuration for the Waypoint client.
//!
//! Values resolve file → environment: a `waypoint.toml` (if present)
//! supplies the base, then `WAYPOINT_*` environment variables override
//! individual fields. Every field has a sensible default so an empty
//! config is valid.
//!
//! ```toml
//! [store]
//! base_url = "https://db.example.com/rest/v1"
//! api_key = "service-key"
//! request_timeout_secs = 10
//!
//! [generate]
//! base_url = "https://api.openai.com/v1"
//! api_key = "sk-..."
//! default_tier = "balanced"
//!
//! [retry]
//! attempts = 3
//! attempt_timeout_ms = 8000
//! base_backoff_ms = 250
//! overall_timeout_ms = 20000
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::generate::ModelTier;
use crate::store::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaypointConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub generate: GenerateConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_url(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    #[serde(default = "default_generate_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub default_tier: ModelTier,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            base_url: default_generate_url(),
            api_key: String::new(),
            default_tier: ModelTier::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_overall_timeout_ms")]
    pub overall_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            base_backoff_ms: default_base_backoff_ms(),
            overall_timeout_ms: default_overall_timeout_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            overall_timeout: Duration::from_millis(self.overall_timeout_ms),
        }
    }
}

fn default_store_url() -> String {
    "http://localhost:54321/rest/v1".to_string()
}

fn default_generate_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_attempts() -> u32 {
    3
}

fn default_attempt_timeout_ms() -> u64 {
    8_000
}

fn default_base_backoff_ms() -> u64 {
    250
}

fn default_overall_timeout_ms() -> u64 {
    20_000
}

impl WaypointConfig {
    /// Load from a TOML file, then apply environment overrides. A
    /// missing file yields defaults (plus overrides).
    pub fn load(path: &Path) -> Result<Self> {
        // Pick up a .env file when present; absence is fine.
        let _ = dotenvy::dotenv();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("WAYPOINT_STORE_URL") {
            self.store.base_url = url;
        }
        if let Ok(key) = std::env::var("WAYPOINT_STORE_KEY") {
            self.store.api_key = key;
        }
        if let Ok(key) = std::env::var("WAYPOINT_GENERATE_KEY") {
            self.generate.api_key = key;
        }
    }
}
