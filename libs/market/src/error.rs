//! Error types for market data handling

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("window for {symbol}@{interval} holds no bars")]
    EmptyWindow { symbol: String, interval: String },

    #[error("unknown candle interval: {0}")]
    UnknownInterval(String),

    #[error("stream payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("field {field} is not a valid number: {value}")]
    NumericField { field: &'static str, value: String },

    #[error("unsupported stream event type: {0}")]
    UnsupportedEvent(String),
}

pub type Result<T> = std::result::Result<T, MarketError>;
