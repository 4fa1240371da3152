//! Strategy configuration
//!
//! Loaded from TOML with every field defaulted, so a missing file runs the
//! stock setup. The Telegram token and chat id come from the environment
//! when set, keeping credentials out of config files.

use binance_adapter::BinanceConfig;
use market::Interval;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, StrategyError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Label prefixed to signal alerts so several deployments can share
    /// one chat
    pub instance: String,
    /// Symbols tracked and arbitrated over
    pub symbols: Vec<String>,
    /// Candle interval shared by every symbol
    pub interval: Interval,
    /// Rolling window capacity in bars
    pub window_capacity: usize,
    /// Seconds between evaluation sweeps
    pub evaluate_secs: u64,
    /// SQLite database path
    pub database_url: String,
    /// Directory receiving the per-symbol audit CSVs
    pub audit_dir: PathBuf,
    pub indicators: IndicatorConfig,
    pub thresholds: ThresholdConfig,
    pub telegram: TelegramConfig,
    pub binance: BinanceConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            instance: "band-trader".to_string(),
            symbols: [
                "SOLUSDT", "RLCUSDT", "LITUSDT", "ATAUSDT", "IDEXUSDT", "SCRTUSDT", "STEEMUSDT",
                "MDTUSDT", "OGNUSDT", "UTKUSDT",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            interval: Interval::FifteenMinutes,
            window_capacity: 200,
            evaluate_secs: 60,
            database_url: "trades.sqlite".to_string(),
            audit_dir: PathBuf::from("csv"),
            indicators: IndicatorConfig::default(),
            thresholds: ThresholdConfig::default(),
            telegram: TelegramConfig::default(),
            binance: BinanceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ma_period: usize,
    pub bb_period: usize,
    /// Bars examined for support/resistance, split into two halves
    pub sr_lookback: usize,
    pub rsi_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_period: 50,
            bb_period: 20,
            sr_lookback: 20,
            rsi_period: 14,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Price may sit up to these factors above support level one and two
    pub support_near: [f64; 2],
    /// Price may sit down to this factor below either resistance level
    pub resistance_near: f64,
    /// Minimum resistance-headroom ratio required to open a position
    pub entry_headroom: f64,
    /// A SELL close is refused while price/buy stays strictly inside
    /// (exit_floor, exit_ceiling)
    pub exit_floor: f64,
    pub exit_ceiling: f64,
    /// Unrealized ratio that arms the trailing stop
    pub trailing_arm: f64,
    /// Fraction of the max seen price that forces a close once armed
    pub trailing_drop: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            support_near: [1.005, 1.01],
            resistance_near: 0.995,
            entry_headroom: 1.01,
            exit_floor: 0.99,
            exit_ceiling: 1.005,
            trailing_arm: 1.02,
            trailing_drop: 0.99,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token; empty disables Telegram and routes alerts to the log
    pub token: String,
    /// Chat receiving alerts; commands from other chats are ignored
    pub chat_id: i64,
    /// Long-poll timeout for command updates
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            chat_id: 0,
            poll_timeout_secs: 30,
        }
    }
}

/// Config path from an environment variable, falling back to a default
/// relative path.
pub fn resolve_config_path(env_var: &str, default: &str) -> PathBuf {
    std::env::var(env_var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

impl StrategyConfig {
    /// Loads the file when it exists, otherwise runs on defaults. Either
    /// way the environment overrides are applied and the result validated.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| StrategyError::Config {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            toml::from_str(&raw).map_err(|e| StrategyError::Config {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_env();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Credentials come from the environment when present.
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                self.telegram.token = token;
            }
        }
        if let Ok(chat) = std::env::var("TELEGRAM_CHAT_ID") {
            match chat.parse() {
                Ok(id) => self.telegram.chat_id = id,
                Err(_) => warn!(value = %chat, "ignoring unparsable TELEGRAM_CHAT_ID"),
            }
        }
    }

    fn normalize(&mut self) {
        for symbol in &mut self.symbols {
            *symbol = symbol.to_uppercase();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "symbols must not be empty".to_string(),
            ));
        }
        if self.window_capacity == 0 {
            return Err(StrategyError::InvalidConfig(
                "window_capacity must be positive".to_string(),
            ));
        }
        if self.evaluate_secs == 0 {
            return Err(StrategyError::InvalidConfig(
                "evaluate_secs must be positive".to_string(),
            ));
        }
        let ind = &self.indicators;
        if ind.ma_period == 0 || ind.bb_period == 0 || ind.sr_lookback == 0 || ind.rsi_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "indicator periods must be positive".to_string(),
            ));
        }
        let th = &self.thresholds;
        if th.support_near.iter().any(|t| *t < 1.0) {
            return Err(StrategyError::InvalidConfig(
                "support_near factors must be at least 1.0".to_string(),
            ));
        }
        if th.resistance_near > 1.0 || th.resistance_near <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "resistance_near must be in (0, 1]".to_string(),
            ));
        }
        if th.exit_floor >= th.exit_ceiling {
            return Err(StrategyError::InvalidConfig(
                "exit_floor must be below exit_ceiling".to_string(),
            ));
        }
        if th.trailing_arm <= 1.0 {
            return Err(StrategyError::InvalidConfig(
                "trailing_arm must exceed 1.0".to_string(),
            ));
        }
        if th.trailing_drop <= 0.0 || th.trailing_drop >= 1.0 {
            return Err(StrategyError::InvalidConfig(
                "trailing_drop must be in (0, 1)".to_string(),
            ));
        }
        if !self.telegram.token.is_empty() && self.telegram.chat_id == 0 {
            return Err(StrategyError::InvalidConfig(
                "telegram.chat_id is required when a token is set".to_string(),
            ));
        }
        self.binance.validate()?;
        Ok(())
    }
}
