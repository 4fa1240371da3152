//! Adapter error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("websocket connect to {url} timed out after {timeout_ms}ms")]
    ConnectTimeout { url: String, timeout_ms: u64 },

    #[error("websocket transport error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("stream driver is no longer running")]
    DriverGone,

    #[error("REST request failed: {0}")]
    Rest(#[from] reqwest::Error),

    #[error("REST returned {status} for {url}")]
    RestStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Market(#[from] market::MarketError),

    #[error("config file {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
