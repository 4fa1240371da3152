//! Single-position lifecycle across all tracked symbols
//!
//! At most one trade is open at a time. While flat, the manager picks the
//! BUY candidate with the most room below its upper band; while long, every
//! evaluation of the held symbol marks the trade to market, and exits go
//! through either the SELL tolerance band or the trailing stop. Every
//! mutation is persisted before it takes effect in memory, so a restart
//! resumes from the stored state.

use chrono::Utc;
use market::{Signal, TradeSignal};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ThresholdConfig;
use crate::db::TradeStore;
use crate::error::Result;
use crate::telegram::{code_block, Alerter};
use crate::trade::Trade;

/// Read view shared with the chat commands.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub symbol: Option<String>,
    pub buy_price: f64,
    pub last_price: f64,
    /// Last price over entry price
    pub unrealized: f64,
    pub max_price_seen: f64,
    pub trailing_armed: bool,
}

impl Default for PositionSnapshot {
    fn default() -> Self {
        Self {
            symbol: None,
            buy_price: 0.0,
            last_price: 0.0,
            unrealized: 1.0,
            max_price_seen: 0.0,
            trailing_armed: false,
        }
    }
}

enum Status {
    Flat,
    Long(Trade),
}

pub struct PositionManager {
    store: Arc<TradeStore>,
    alerter: Arc<dyn Alerter>,
    thresholds: ThresholdConfig,
    status: Status,
    max_price_seen: f64,
    trailing_armed: bool,
    snapshot: Arc<RwLock<PositionSnapshot>>,
}

impl PositionManager {
    /// Builds the manager, resuming any trade a previous run left open.
    /// The trailing stop always re-arms from scratch after a restart.
    pub fn new(
        store: Arc<TradeStore>,
        alerter: Arc<dyn Alerter>,
        thresholds: ThresholdConfig,
    ) -> Result<Self> {
        let status = match store.last_open_trade()? {
            Some(trade) => {
                info!(
                    symbol = %trade.symbol,
                    buy_price = trade.buy_price,
                    "resuming open position"
                );
                Status::Long(trade)
            }
            None => Status::Flat,
        };
        let max_price_seen = match &status {
            Status::Long(trade) => trade.buy_price,
            Status::Flat => 0.0,
        };
        let manager = Self {
            store,
            alerter,
            thresholds,
            status,
            max_price_seen,
            trailing_armed: false,
            snapshot: Arc::new(RwLock::new(PositionSnapshot::default())),
        };
        manager.publish();
        Ok(manager)
    }

    pub fn snapshot_handle(&self) -> Arc<RwLock<PositionSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    /// Feeds one evaluation sweep through the lifecycle. Storage failures
    /// propagate; the position must never drift from the persisted state.
    pub fn on_tick(&mut self, signals: &[TradeSignal]) -> Result<()> {
        let now_ms = Utc::now().timestamp_millis();
        if matches!(self.status, Status::Flat) {
            self.consider_entry(signals, now_ms)
        } else {
            self.manage_position(signals, now_ms)
        }
    }

    fn consider_entry(&mut self, signals: &[TradeSignal], now_ms: i64) -> Result<()> {
        let Some(best) = signals
            .iter()
            .filter(|signal| signal.signal == Signal::Buy)
            .max_by(|a, b| {
                a.bb_upper_distance
                    .partial_cmp(&b.bb_upper_distance)
                    .unwrap_or(Ordering::Equal)
            })
        else {
            return Ok(());
        };
        if best.bb_upper_distance <= self.thresholds.entry_headroom {
            debug!(
                symbol = %best.symbol,
                headroom = best.bb_upper_distance,
                "buy candidate lacks headroom"
            );
            return Ok(());
        }
        let trade = Trade::new(best.symbol.clone(), best.price, now_ms);
        self.store.save(&trade)?;
        info!(symbol = %trade.symbol, price = trade.buy_price, "opened position");
        self.alerter.alert_formatted(&code_block(&trade.summary()));
        self.max_price_seen = trade.buy_price;
        self.trailing_armed = false;
        self.status = Status::Long(trade);
        self.publish();
        Ok(())
    }

    fn manage_position(&mut self, signals: &[TradeSignal], now_ms: i64) -> Result<()> {
        let Status::Long(trade) = &mut self.status else {
            return Ok(());
        };
        let Some(update) = signals.iter().find(|signal| signal.symbol == trade.symbol)
        else {
            return Ok(());
        };
        let price = update.price;
        let ratio = price / trade.buy_price;
        let symbol = trade.symbol.clone();

        if !self.trailing_armed && ratio > self.thresholds.trailing_arm {
            self.trailing_armed = true;
            self.max_price_seen = price;
            info!(symbol = %symbol, price, "trailing stop armed");
            self.alerter.alert(&format!(
                "{symbol}: trailing stop armed at {price} ({:+.2}%)",
                (ratio - 1.0) * 100.0
            ));
        } else if self.trailing_armed && price > self.max_price_seen {
            self.max_price_seen = price;
            self.alerter.alert(&format!("{symbol}: new high {price}"));
        }

        let stop = self.max_price_seen * self.thresholds.trailing_drop;
        if self.trailing_armed && price < stop {
            trade.force_sell(price, now_ms);
            info!(symbol = %symbol, price, stop, "trailing stop fired");
            return self.settle();
        }

        if update.signal == Signal::Sell
            && trade.sell(
                price,
                now_ms,
                self.thresholds.exit_floor,
                self.thresholds.exit_ceiling,
            )
        {
            info!(symbol = %symbol, price, "sell signal closed position");
            return self.settle();
        }

        trade.mark(price);
        let marked = trade.clone();
        self.store.save(&marked)?;
        self.publish();
        Ok(())
    }

    /// Persists the closed trade, reports it, and goes flat.
    fn settle(&mut self) -> Result<()> {
        let Status::Long(trade) = std::mem::replace(&mut self.status, Status::Flat) else {
            return Ok(());
        };
        self.store.save(&trade)?;
        self.alerter.alert_formatted(&code_block(&trade.summary()));
        self.alerter
            .alert(if trade.result() > 1.0 { "🤑" } else { "😭" });
        self.trailing_armed = false;
        self.max_price_seen = 0.0;
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        let mut snapshot = self.snapshot.write();
        *snapshot = match &self.status {
            Status::Flat => PositionSnapshot::default(),
            Status::Long(trade) => PositionSnapshot {
                symbol: Some(trade.symbol.clone()),
                buy_price: trade.buy_price,
                last_price: trade.sell_price.unwrap_or(trade.buy_price),
                unrealized: trade.result(),
                max_price_seen: self.max_price_seen,
                trailing_armed: self.trailing_armed,
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::RecordingAlerter;

    fn signal(symbol: &str, kind: Signal, price: f64, headroom: f64) -> TradeSignal {
        TradeSignal {
            symbol: symbol.to_string(),
            signal: kind,
            price,
            bb_upper_distance: headroom,
        }
    }

    fn buy(symbol: &str, price: f64, headroom: f64) -> TradeSignal {
        signal(symbol, Signal::Buy, price, headroom)
    }

    fn hold(symbol: &str, price: f64) -> TradeSignal {
        signal(symbol, Signal::Hold, price, 1.0)
    }

    fn sell(symbol: &str, price: f64) -> TradeSignal {
        signal(symbol, Signal::Sell, price, 1.0)
    }

    fn manager() -> (PositionManager, Arc<TradeStore>, Arc<RecordingAlerter>) {
        let store = Arc::new(TradeStore::open(":memory:").unwrap());
        let alerter = Arc::new(RecordingAlerter::default());
        let sink: Arc<dyn Alerter> = alerter.clone();
        let manager =
            PositionManager::new(Arc::clone(&store), sink, ThresholdConfig::default()).unwrap();
        (manager, store, alerter)
    }

    #[test]
    fn entry_needs_headroom_above_threshold() {
        let (mut manager, store, alerter) = manager();
        manager
            .on_tick(&[buy("SOLUSDT", 100.0, 1.005)])
            .unwrap();
        assert!(store.open_trades().unwrap().is_empty());
        assert!(alerter.formatted().is_empty());
        assert!(manager.snapshot_handle().read().symbol.is_none());
    }

    #[test]
    fn best_buy_candidate_wins_entry() {
        let (mut manager, store, alerter) = manager();
        manager
            .on_tick(&[
                buy("SOLUSDT", 100.0, 1.02),
                buy("OGNUSDT", 5.0, 1.08),
                hold("LITUSDT", 3.0),
            ])
            .unwrap();

        let open = store.open_trades().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].symbol, "OGNUSDT");
        assert_eq!(open[0].buy_price, 5.0);

        let blocks = alerter.formatted();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("SYMBOL_: OGNUSDT"));

        let snapshot = manager.snapshot_handle().read().clone();
        assert_eq!(snapshot.symbol.as_deref(), Some("OGNUSDT"));
        assert!(!snapshot.trailing_armed);
    }

    #[test]
    fn long_position_marks_to_market_and_ignores_other_buys() {
        let (mut manager, store, _alerter) = manager();
        manager.on_tick(&[buy("SOLUSDT", 100.0, 1.05)]).unwrap();

        manager
            .on_tick(&[hold("SOLUSDT", 101.0), buy("OGNUSDT", 5.0, 1.10)])
            .unwrap();

        let open = store.open_trades().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].symbol, "SOLUSDT");
        assert_eq!(open[0].sell_price, Some(101.0));
        assert!(open[0].open);

        let snapshot = manager.snapshot_handle().read().clone();
        assert_eq!(snapshot.last_price, 101.0);
        assert!((snapshot.unrealized - 1.01).abs() < 1e-12);
    }

    #[test]
    fn trailing_stop_arms_tracks_highs_and_fires() {
        let (mut manager, store, alerter) = manager();
        manager.on_tick(&[buy("SOLUSDT", 100.0, 1.05)]).unwrap();

        // below the arm threshold nothing happens
        manager.on_tick(&[hold("SOLUSDT", 101.0)]).unwrap();
        assert!(alerter.plain().is_empty());
        assert!(!manager.snapshot_handle().read().trailing_armed);

        manager.on_tick(&[hold("SOLUSDT", 103.0)]).unwrap();
        let snapshot = manager.snapshot_handle().read().clone();
        assert!(snapshot.trailing_armed);
        assert_eq!(snapshot.max_price_seen, 103.0);
        assert!(alerter.plain()[0].contains("trailing stop armed at 103"));

        manager.on_tick(&[hold("SOLUSDT", 104.0)]).unwrap();
        assert_eq!(manager.snapshot_handle().read().max_price_seen, 104.0);
        assert!(alerter.plain()[1].contains("new high 104"));

        // 102.5 is under 104 * 0.99, so the stop fires even on a HOLD
        manager.on_tick(&[hold("SOLUSDT", 102.5)]).unwrap();
        let closed = store.closed_trades().unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].sell_price, Some(102.5));
        assert!(!closed[0].open);
        assert!(manager.snapshot_handle().read().symbol.is_none());
        assert_eq!(alerter.plain().last().map(String::as_str), Some("\u{1f911}"));
    }

    #[test]
    fn sell_inside_tolerance_band_keeps_position() {
        let (mut manager, store, _alerter) = manager();
        manager.on_tick(&[buy("SOLUSDT", 100.0, 1.05)]).unwrap();

        manager.on_tick(&[sell("SOLUSDT", 100.2)]).unwrap();
        let open = store.open_trades().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].sell_price, Some(100.2));

        manager.on_tick(&[sell("SOLUSDT", 101.0)]).unwrap();
        assert!(store.open_trades().unwrap().is_empty());
        let closed = store.closed_trades().unwrap();
        assert_eq!(closed[0].sell_price, Some(101.0));
    }

    #[test]
    fn losing_close_reports_accordingly() {
        let (mut manager, _store, alerter) = manager();
        manager.on_tick(&[buy("SOLUSDT", 100.0, 1.05)]).unwrap();
        manager.on_tick(&[sell("SOLUSDT", 98.0)]).unwrap();
        assert_eq!(alerter.plain().last().map(String::as_str), Some("\u{1f62d}"));
    }

    #[test]
    fn restart_resumes_open_trade_with_trailing_reset() {
        let store = Arc::new(TradeStore::open(":memory:").unwrap());
        let mut trade = Trade::new("SOLUSDT", 100.0, 1_700_000_000_000);
        trade.mark(105.0);
        store.save(&trade).unwrap();

        let alerter = Arc::new(RecordingAlerter::default());
        let sink: Arc<dyn Alerter> = alerter.clone();
        let mut manager =
            PositionManager::new(Arc::clone(&store), sink, ThresholdConfig::default()).unwrap();

        let snapshot = manager.snapshot_handle().read().clone();
        assert_eq!(snapshot.symbol.as_deref(), Some("SOLUSDT"));
        assert!(!snapshot.trailing_armed);
        assert_eq!(snapshot.max_price_seen, 100.0);

        // already past the arm threshold, so the first tick re-arms
        manager.on_tick(&[hold("SOLUSDT", 106.0)]).unwrap();
        let snapshot = manager.snapshot_handle().read().clone();
        assert!(snapshot.trailing_armed);
        assert_eq!(snapshot.max_price_seen, 106.0);
    }
}
