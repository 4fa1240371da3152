//! OHLCV candles and their intervals

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MarketError;

/// One OHLCV candle for a symbol and interval.
///
/// The exchange re-sends the in-progress candle on every trade until it
/// closes, so the newest bar of a series is mutable until the next one
/// opens. `Bar` itself is plain data; whether an update is final travels
/// with the stream event that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Candle open time, milliseconds since the Unix epoch
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base asset volume
    pub volume: f64,
    /// Candle close time, milliseconds since the Unix epoch
    pub close_time: i64,
    /// Quote asset volume
    pub quote_volume: f64,
    /// Number of trades inside the candle
    pub trade_count: i64,
    /// Taker buy base asset volume
    pub taker_buy_base: f64,
    /// Taker buy quote asset volume
    pub taker_buy_quote: f64,
}

/// Candle intervals, named the way the exchange names them on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    /// Wire name used in stream keys and REST parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::ThreeMinutes => "3m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::SixHours => "6h",
            Interval::EightHours => "8h",
            Interval::TwelveHours => "12h",
            Interval::OneDay => "1d",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::OneMinute),
            "3m" => Ok(Interval::ThreeMinutes),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            "30m" => Ok(Interval::ThirtyMinutes),
            "1h" => Ok(Interval::OneHour),
            "2h" => Ok(Interval::TwoHours),
            "4h" => Ok(Interval::FourHours),
            "6h" => Ok(Interval::SixHours),
            "8h" => Ok(Interval::EightHours),
            "12h" => Ok(Interval::TwelveHours),
            "1d" => Ok(Interval::OneDay),
            other => Err(MarketError::UnknownInterval(other.to_string())),
        }
    }
}

/// Combined-stream key for a kline subscription, e.g. `solusdt@kline_15m`.
pub fn stream_key(symbol: &str, interval: Interval) -> String {
    format!("{}@kline_{}", symbol.to_lowercase(), interval)
}
