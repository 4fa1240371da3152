//! Market data primitives shared by the Binance adapter and the trading
//! strategies: candle types, rolling windows, technical indicators, trading
//! signals, and the typed decode of raw stream payloads.
//!
//! Everything in this crate is pure data plumbing. Nothing here performs
//! I/O; the adapter and strategy services own sockets, files, and clocks.

pub mod bar;
pub mod error;
pub mod events;
pub mod indicators;
pub mod signal;
pub mod window;

pub use bar::{stream_key, Bar, Interval};
pub use error::{MarketError, Result};
pub use events::{BalanceDelta, HistoricalKline, KlineEvent, StreamEvent};
pub use signal::{Signal, TradeSignal};
pub use window::{BarUpdate, KlineWindow};
