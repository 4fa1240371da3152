//! Strategy error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Market(#[from] market::MarketError),

    #[error(transparent)]
    Adapter(#[from] binance_adapter::AdapterError),

    #[error("database query: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("database connection: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("migrations: {0}")]
    Migration(String),

    #[error("audit file {path}: {source}")]
    Audit {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("audit csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("telegram transport: {0}")]
    Telegram(#[from] reqwest::Error),

    #[error("telegram api returned {status}: {body}")]
    TelegramStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("config file {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, StrategyError>;
