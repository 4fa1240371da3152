//! Fixed-size rolling window of candles for one symbol and interval

use std::collections::VecDeque;

use crate::bar::{Bar, Interval};
use crate::error::{MarketError, Result};

/// What [`KlineWindow::apply`] did with an incoming bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarUpdate {
    /// Bar opened a new candle slot; the oldest bar was evicted if full.
    Appended,
    /// Bar refreshed the in-progress candle in place.
    Replaced,
    /// Bar was older than the newest held candle and was dropped.
    Ignored,
}

/// Rolling OHLCV history with FIFO eviction.
///
/// Bars arrive in stream order. A bar whose open time is newer than the
/// newest held bar appends (evicting the oldest at capacity), one with an
/// equal open time replaces the newest in place, and anything older is
/// ignored so a replayed backlog after reconnect cannot rewind history.
#[derive(Debug, Clone)]
pub struct KlineWindow {
    symbol: String,
    interval: Interval,
    capacity: usize,
    bars: VecDeque<Bar>,
}

impl KlineWindow {
    /// Creates an empty window. Capacity is clamped to at least one bar.
    pub fn new(symbol: impl Into<String>, interval: Interval, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol: symbol.into(),
            interval,
            capacity,
            bars: VecDeque::with_capacity(capacity),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Folds one bar into the window. See the type docs for ordering rules.
    pub fn apply(&mut self, bar: Bar) -> BarUpdate {
        let newest_open = self.bars.back().map(|b| b.open_time);
        match newest_open {
            None => {
                self.push(bar);
                BarUpdate::Appended
            }
            Some(t) if bar.open_time > t => {
                self.push(bar);
                BarUpdate::Appended
            }
            Some(t) if bar.open_time == t => {
                if let Some(newest) = self.bars.back_mut() {
                    *newest = bar;
                }
                BarUpdate::Replaced
            }
            Some(_) => BarUpdate::Ignored,
        }
    }

    fn push(&mut self, bar: Bar) {
        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    /// Oldest-to-newest view of the held bars.
    pub fn bars(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Close of the newest bar, or [`MarketError::EmptyWindow`] before the
    /// first bar arrives.
    pub fn latest_close(&self) -> Result<f64> {
        self.latest()
            .map(|b| b.close)
            .ok_or_else(|| MarketError::EmptyWindow {
                symbol: self.symbol.clone(),
                interval: self.interval.to_string(),
            })
    }

    /// Close prices oldest to newest, re-derived on every call so indicator
    /// input always reflects the current bars.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn open_times(&self) -> Vec<i64> {
        self.bars.iter().map(|b| b.open_time).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bar(open_time: i64, close: f64) -> Bar {
        Bar {
            open_time,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            close_time: open_time + 899_999,
            quote_volume: close,
            trade_count: 1,
            taker_buy_base: 0.5,
            taker_buy_quote: 0.5,
        }
    }

    #[test]
    fn appends_in_order_and_evicts_oldest_at_capacity() {
        let mut window = KlineWindow::new("SOLUSDT", Interval::FifteenMinutes, 3);
        for t in 0..5 {
            assert_eq!(window.apply(bar(t, t as f64)), BarUpdate::Appended);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.open_times(), vec![2, 3, 4]);
        assert_eq!(window.closes(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn equal_open_time_replaces_newest_in_place() {
        let mut window = KlineWindow::new("SOLUSDT", Interval::FifteenMinutes, 3);
        window.apply(bar(10, 1.0));
        window.apply(bar(20, 2.0));
        assert_eq!(window.apply(bar(20, 2.5)), BarUpdate::Replaced);
        assert_eq!(window.len(), 2);
        assert_eq!(window.closes(), vec![1.0, 2.5]);
    }

    #[test]
    fn older_bars_are_ignored() {
        let mut window = KlineWindow::new("SOLUSDT", Interval::FifteenMinutes, 3);
        window.apply(bar(10, 1.0));
        window.apply(bar(20, 2.0));
        assert_eq!(window.apply(bar(10, 9.9)), BarUpdate::Ignored);
        assert_eq!(window.closes(), vec![1.0, 2.0]);
    }

    #[test]
    fn latest_close_fails_on_empty_window() {
        let window = KlineWindow::new("SOLUSDT", Interval::FifteenMinutes, 3);
        let err = window.latest_close().unwrap_err();
        assert!(matches!(err, MarketError::EmptyWindow { ref symbol, .. } if symbol == "SOLUSDT"));
    }

    #[test]
    fn latest_close_tracks_replacement() {
        let mut window = KlineWindow::new("SOLUSDT", Interval::FifteenMinutes, 3);
        window.apply(bar(10, 1.0));
        window.apply(bar(10, 1.5));
        assert_eq!(window.latest_close().unwrap(), 1.5);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut window = KlineWindow::new("SOLUSDT", Interval::FifteenMinutes, 0);
        window.apply(bar(1, 1.0));
        window.apply(bar(2, 2.0));
        assert_eq!(window.len(), 1);
        assert_eq!(window.closes(), vec![2.0]);
    }

    proptest! {
        /// After any run of strictly increasing bars the window holds the
        /// last `capacity` of them, in arrival order.
        #[test]
        fn window_is_a_suffix_of_the_stream(
            capacity in 1usize..32,
            count in 0usize..128,
        ) {
            let mut window = KlineWindow::new("X", Interval::OneMinute, capacity);
            for t in 0..count as i64 {
                window.apply(bar(t, t as f64));
            }
            let expected: Vec<i64> = (0..count as i64)
                .rev()
                .take(capacity)
                .rev()
                .collect();
            prop_assert_eq!(window.open_times(), expected);
            prop_assert!(window.len() <= capacity);
        }
    }
}
