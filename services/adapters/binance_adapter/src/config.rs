//! Adapter configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AdapterError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    /// Combined-stream websocket endpoint
    pub ws_endpoint: String,
    /// REST origin for historical candles
    pub rest_endpoint: String,
    /// Stream name carrying account balance updates
    pub balance_stream: String,
    /// Give up on a single connect attempt after this long
    pub connection_timeout_ms: u64,
    /// Fixed pause between reconnect attempts
    pub reconnect_delay_ms: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            ws_endpoint: "wss://stream.binance.com:9443/stream".to_string(),
            rest_endpoint: "https://api.binance.com".to_string(),
            balance_stream: "!balance@arr".to_string(),
            connection_timeout_ms: 5_000,
            reconnect_delay_ms: 1_000,
        }
    }
}

impl BinanceConfig {
    /// Loads a TOML config, filling missing fields from the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| AdapterError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| AdapterError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.ws_endpoint.starts_with("wss://") && !self.ws_endpoint.starts_with("ws://") {
            return Err(AdapterError::InvalidConfig(format!(
                "ws_endpoint must be a websocket url, got {:?}",
                self.ws_endpoint
            )));
        }
        if !self.rest_endpoint.starts_with("https://") && !self.rest_endpoint.starts_with("http://")
        {
            return Err(AdapterError::InvalidConfig(format!(
                "rest_endpoint must be an http url, got {:?}",
                self.rest_endpoint
            )));
        }
        if self.balance_stream.is_empty() {
            return Err(AdapterError::InvalidConfig(
                "balance_stream must not be empty".to_string(),
            ));
        }
        if self.connection_timeout_ms == 0 {
            return Err(AdapterError::InvalidConfig(
                "connection_timeout_ms must be positive".to_string(),
            ));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(AdapterError::InvalidConfig(
                "reconnect_delay_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
