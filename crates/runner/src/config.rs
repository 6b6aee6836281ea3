//! Engine configuration.

use kestrel_router::StrategySettings;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_heartbeat_secs() -> u64 {
    1
}

/// Top-level engine configuration, loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Seconds between heartbeats (ticker refresh + order status poll).
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Streaming feed base URL. Absent means no live book feeds are run
    /// and ticks come from the heartbeat's ticker poll alone.
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub api_key_id: String,
    #[serde(default)]
    pub api_key_secret: String,
    /// Minimum price increment per composite code, `SYMBOL.venue`.
    #[serde(default)]
    pub min_tick_size: HashMap<String, Decimal>,
    /// Per-strategy settings, keyed by strategy name.
    #[serde(default)]
    pub strategies: HashMap<String, StrategySettings>,
}

impl TradingConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_str(&raw)
    }

    pub fn from_str(raw: &str) -> Result<Self, ConfigError> {
        let config: TradingConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_secs == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_secs must be at least 1".to_string(),
            ));
        }
        let live_feed = self.feed_url.is_some();
        if live_feed && (self.api_key_id.is_empty() || self.api_key_secret.is_empty()) {
            return Err(ConfigError::Invalid(
                "feed_url requires api_key_id and api_key_secret".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_size(&self, code: &str) -> Option<Decimal> {
        self.min_tick_size.get(code).copied()
    }
}
