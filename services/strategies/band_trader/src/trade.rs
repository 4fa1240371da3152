//! Position domain type and its chat formatting
//!
//! While a trade is open its `sell_price` carries the last marked price
//! and `sell_date` stays empty, so the same row and the same summary block
//! serve both unrealized and realized reporting. Closing fills `sell_date`
//! and flips `open`.

use chrono::{LocalResult, TimeZone, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    /// Entry time, epoch milliseconds
    pub buy_date: i64,
    pub buy_price: f64,
    /// Last marked price while open, realized exit price once closed
    pub sell_price: Option<f64>,
    /// Exit time, epoch milliseconds; set only when closed
    pub sell_date: Option<i64>,
    pub open: bool,
}

impl Trade {
    pub fn new(symbol: impl Into<String>, buy_price: f64, now_ms: i64) -> Self {
        Self {
            symbol: symbol.into(),
            buy_date: now_ms,
            buy_price,
            sell_price: None,
            sell_date: None,
            open: true,
        }
    }

    /// Marks the open position to the current price without closing it.
    pub fn mark(&mut self, price: f64) {
        if self.open {
            self.sell_price = Some(price);
        }
    }

    /// Closes at `price` unless the move is still inside the indifference
    /// band `[floor, ceiling]` of price/buy ratios. Returns whether the
    /// trade closed.
    pub fn sell(&mut self, price: f64, now_ms: i64, floor: f64, ceiling: f64) -> bool {
        if !self.open {
            return false;
        }
        let ratio = price / self.buy_price;
        if ratio < floor || ratio > ceiling {
            self.close(price, now_ms);
            true
        } else {
            false
        }
    }

    /// Unconditional close used by the trailing stop.
    pub fn force_sell(&mut self, price: f64, now_ms: i64) {
        if self.open {
            self.close(price, now_ms);
        }
    }

    fn close(&mut self, price: f64, now_ms: i64) {
        self.sell_price = Some(price);
        self.sell_date = Some(now_ms);
        self.open = false;
    }

    /// Realized ratio once closed, marked ratio while open, 1.0 before the
    /// first mark.
    pub fn result(&self) -> f64 {
        match self.sell_price {
            Some(sell) => sell / self.buy_price,
            None => 1.0,
        }
    }

    /// Fixed-width block sent to the chat for both open and closed trades.
    pub fn summary(&self) -> String {
        let sell_date = self
            .sell_date
            .map(format_timestamp)
            .unwrap_or_else(|| "N/A".to_string());
        let sell_price = self
            .sell_price
            .map(|p| format!("{p:.8}"))
            .unwrap_or_else(|| "N/A".to_string());
        let pl = (self.result() - 1.0) * 100.0;
        format!(
            "SYMBOL_: {}\nBUY____: {} {:.8}\nSELL___: {} {}\nP/L____: {:.2}% \n",
            self.symbol.to_uppercase(),
            format_timestamp(self.buy_date),
            self.buy_price,
            sell_date,
            sell_price,
            pl,
        )
    }
}

/// Compound return across trades as a percentage, multiplying the
/// individual ratios.
pub fn compound_return(trades: &[Trade]) -> f64 {
    let product: f64 = trades.iter().map(Trade::result).product();
    (product - 1.0) * 100.0
}

fn format_timestamp(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms) {
        LocalResult::Single(dt) => dt.format("%d/%m %H:%M").to_string(),
        _ => "N/A".to_string(),
    }
}
