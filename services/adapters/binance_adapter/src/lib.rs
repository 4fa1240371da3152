//! Binance market data adapter
//!
//! Owns one combined-stream websocket per process and fans decoded events
//! out to in-process subscribers keyed by stream name. Subscriptions are
//! managed over a command channel so the driver task is the only writer to
//! the socket; on disconnect it reconnects after a fixed delay and replays
//! SUBSCRIBE frames for every stream that still has a listener.
//!
//! The REST side is a single call that preloads historical candles so a
//! freshly started strategy has a full window before the first live bar.

pub mod config;
pub mod error;
pub mod rest;
pub mod stream;

pub use config::BinanceConfig;
pub use error::{AdapterError, Result};
pub use rest::{klines_url, preload_klines};
pub use stream::KlineStream;
