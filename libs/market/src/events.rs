//! Wire payloads from the exchange and their decoded forms
//!
//! The combined websocket multiplexes every subscription onto one socket
//! and wraps each payload in a `{"stream": ..., "data": ...}` envelope.
//! Numeric fields arrive as strings and are parsed here so the rest of
//! the codebase only ever sees `f64`.

use serde::Deserialize;
use serde_json::Value;

use crate::bar::{Bar, Interval};
use crate::error::{MarketError, Result};

/// A decoded message from the combined stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Candle update for one symbol and interval
    Kline(KlineEvent),
    /// Account balance snapshot deltas
    Balance(Vec<BalanceDelta>),
}

/// One candle update, final or still in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineEvent {
    pub symbol: String,
    pub interval: Interval,
    /// True once the candle has closed; the exchange re-sends the open
    /// candle on every trade until then.
    pub is_final: bool,
    pub bar: Bar,
}

/// Post-trade balance for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceDelta {
    pub asset: String,
    pub free: f64,
    pub locked: f64,
}

impl StreamEvent {
    /// Decodes one websocket text frame.
    ///
    /// Returns `Ok(None)` for subscribe acknowledgements, which echo the
    /// request id and carry no payload. Unknown event types are an error
    /// so a silently changed upstream schema surfaces in the logs instead
    /// of vanishing.
    pub fn decode(text: &str) -> Result<Option<StreamEvent>> {
        let value: Value = serde_json::from_str(text)?;
        if value.get("id").is_some() {
            return Ok(None);
        }
        // Accept both the combined envelope and a bare payload.
        let data = value.get("data").unwrap_or(&value);
        if data.is_array() {
            let raw: Vec<RawBalance> = serde_json::from_value(data.clone())?;
            let deltas = raw
                .into_iter()
                .map(RawBalance::into_delta)
                .collect::<Result<Vec<_>>>()?;
            return Ok(Some(StreamEvent::Balance(deltas)));
        }
        match data.get("e").and_then(Value::as_str) {
            Some("kline") => {
                let raw: RawKlineEvent = serde_json::from_value(data.clone())?;
                Ok(Some(StreamEvent::Kline(raw.into_event()?)))
            }
            Some(other) => Err(MarketError::UnsupportedEvent(other.to_string())),
            None => Err(MarketError::UnsupportedEvent("<untagged>".to_string())),
        }
    }
}

fn parse_field(field: &'static str, value: &str) -> Result<f64> {
    value.parse().map_err(|_| MarketError::NumericField {
        field,
        value: value.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct RawKlineEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "k")]
    kline: RawKline,
}

/// Candle payload with the exchange's one-letter field names.
#[derive(Debug, Deserialize)]
struct RawKline {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "T")]
    close_time: i64,
    #[serde(rename = "i")]
    interval: Interval,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "n")]
    trade_count: i64,
    #[serde(rename = "x")]
    is_final: bool,
    #[serde(rename = "q")]
    quote_volume: String,
    #[serde(rename = "V")]
    taker_buy_base: String,
    #[serde(rename = "Q")]
    taker_buy_quote: String,
}

impl RawKlineEvent {
    fn into_event(self) -> Result<KlineEvent> {
        let k = self.kline;
        let bar = Bar {
            open_time: k.open_time,
            open: parse_field("k.o", &k.open)?,
            high: parse_field("k.h", &k.high)?,
            low: parse_field("k.l", &k.low)?,
            close: parse_field("k.c", &k.close)?,
            volume: parse_field("k.v", &k.volume)?,
            close_time: k.close_time,
            quote_volume: parse_field("k.q", &k.quote_volume)?,
            trade_count: k.trade_count,
            taker_buy_base: parse_field("k.V", &k.taker_buy_base)?,
            taker_buy_quote: parse_field("k.Q", &k.taker_buy_quote)?,
        };
        Ok(KlineEvent {
            symbol: self.symbol,
            interval: k.interval,
            is_final: k.is_final,
            bar,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    #[serde(rename = "a")]
    asset: String,
    #[serde(rename = "f")]
    free: String,
    #[serde(rename = "l")]
    locked: String,
}

impl RawBalance {
    fn into_delta(self) -> Result<BalanceDelta> {
        Ok(BalanceDelta {
            free: parse_field("balance.f", &self.free)?,
            locked: parse_field("balance.l", &self.locked)?,
            asset: self.asset,
        })
    }
}

/// One row of the REST klines response, a positional twelve-element array.
///
/// Field order follows the exchange: open time, OHLC and volume as strings,
/// close time, quote volume, trade count, taker buy volumes, and a legacy
/// field the API docs say to ignore.
#[derive(Debug, Deserialize)]
pub struct HistoricalKline(
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    i64,
    String,
    String,
    serde::de::IgnoredAny,
);

impl HistoricalKline {
    pub fn into_bar(self) -> Result<Bar> {
        Ok(Bar {
            open_time: self.0,
            open: parse_field("kline[1]", &self.1)?,
            high: parse_field("kline[2]", &self.2)?,
            low: parse_field("kline[3]", &self.3)?,
            close: parse_field("kline[4]", &self.4)?,
            volume: parse_field("kline[5]", &self.5)?,
            close_time: self.6,
            quote_volume: parse_field("kline[7]", &self.7)?,
            trade_count: self.8,
            taker_buy_base: parse_field("kline[9]", &self.9)?,
            taker_buy_quote: parse_field("kline[10]", &self.10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KLINE_FRAME: &str = r#"{
        "stream": "solusdt@kline_15m",
        "data": {
            "e": "kline",
            "E": 1700000123456,
            "s": "SOLUSDT",
            "k": {
                "t": 1700000100000,
                "T": 1700000999999,
                "s": "SOLUSDT",
                "i": "15m",
                "f": 100,
                "L": 200,
                "o": "58.12000000",
                "c": "58.49000000",
                "h": "58.60000000",
                "l": "58.01000000",
                "v": "1234.50000000",
                "n": 321,
                "x": false,
                "q": "72190.44000000",
                "V": "600.00000000",
                "Q": "35100.00000000",
                "B": "0"
            }
        }
    }"#;

    #[test]
    fn decodes_combined_kline_frame() {
        let event = StreamEvent::decode(KLINE_FRAME).unwrap().unwrap();
        let StreamEvent::Kline(kline) = event else {
            panic!("expected kline event");
        };
        assert_eq!(kline.symbol, "SOLUSDT");
        assert_eq!(kline.interval, Interval::FifteenMinutes);
        assert!(!kline.is_final);
        assert_eq!(kline.bar.open_time, 1700000100000);
        assert_eq!(kline.bar.close_time, 1700000999999);
        assert!((kline.bar.close - 58.49).abs() < 1e-12);
        assert!((kline.bar.volume - 1234.5).abs() < 1e-12);
        assert_eq!(kline.bar.trade_count, 321);
    }

    #[test]
    fn subscribe_ack_is_not_an_event() {
        let ack = r#"{"result": null, "id": 7}"#;
        assert_eq!(StreamEvent::decode(ack).unwrap(), None);
    }

    #[test]
    fn decodes_balance_array_frame() {
        let frame = r#"{
            "stream": "!balance@arr",
            "data": [
                {"a": "USDT", "f": "41.25000000", "l": "0.00000000"},
                {"a": "SOL", "f": "2.00000000", "l": "0.50000000"}
            ]
        }"#;
        let event = StreamEvent::decode(frame).unwrap().unwrap();
        let StreamEvent::Balance(deltas) = event else {
            panic!("expected balance event");
        };
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].asset, "USDT");
        assert!((deltas[0].free - 41.25).abs() < 1e-12);
        assert_eq!(deltas[1].asset, "SOL");
        assert!((deltas[1].locked - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_event_type_is_an_error() {
        let frame = r#"{"stream": "solusdt@trade", "data": {"e": "trade", "p": "1.0"}}"#;
        let err = StreamEvent::decode(frame).unwrap_err();
        assert!(matches!(err, MarketError::UnsupportedEvent(ref e) if e == "trade"));
    }

    #[test]
    fn malformed_number_names_the_field() {
        let frame = KLINE_FRAME.replace("\"58.49000000\"", "\"not-a-price\"");
        let err = StreamEvent::decode(&frame).unwrap_err();
        assert!(matches!(err, MarketError::NumericField { field: "k.c", .. }));
    }

    #[test]
    fn historical_kline_array_becomes_a_bar() {
        let row = r#"[
            1700000100000,
            "58.12000000", "58.60000000", "58.01000000", "58.49000000",
            "1234.50000000",
            1700000999999,
            "72190.44000000",
            321,
            "600.00000000", "35100.00000000", "0"
        ]"#;
        let kline: HistoricalKline = serde_json::from_str(row).unwrap();
        let bar = kline.into_bar().unwrap();
        assert_eq!(bar.open_time, 1700000100000);
        assert!((bar.high - 58.6).abs() < 1e-12);
        assert!((bar.taker_buy_quote - 35100.0).abs() < 1e-12);
    }
}
