//! Strategy decisions emitted per evaluation tick

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a strategy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One symbol's priced decision at one evaluation tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSignal {
    pub symbol: String,
    pub signal: Signal,
    /// Close of the newest bar at evaluation time
    pub price: f64,
    /// Mean of the two resistance levels divided by `price`. Ranks BUY
    /// candidates by how much room remains below overhead resistance;
    /// values at or under 1.0 mean resistance is already at or below
    /// the current price.
    pub bb_upper_distance: f64,
}
