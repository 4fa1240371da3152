//! Signal evaluation sweep
//!
//! Every tick recomputes the full indicator snapshot per symbol from its
//! window, classifies it into BUY/SELL/HOLD, alerts on signal changes, and
//! appends one audit row per symbol. Decisions are handed back for the
//! position lifecycle to arbitrate.

use chrono::Utc;
use market::indicators::{
    bollinger_bands, moving_average, pivot_points, rsi, support_resistance, BollingerBands,
    PivotPoints, SupportResistance,
};
use market::{Interval, KlineWindow, MarketError, Signal, TradeSignal};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::audit::{AuditRow, AuditWriter};
use crate::config::{IndicatorConfig, StrategyConfig, ThresholdConfig};
use crate::telegram::Alerter;

/// All indicator outputs for one symbol at one tick, derived fresh from
/// the window.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorView {
    /// Close of the newest bar
    pub price: f64,
    pub ma: f64,
    pub bands: BollingerBands,
    pub sr: SupportResistance,
    /// Floor-trader pivots of the newest bar
    pub pivots: PivotPoints,
    pub rsi: f64,
}

impl IndicatorView {
    pub fn compute(window: &KlineWindow, cfg: &IndicatorConfig) -> market::Result<Self> {
        let Some(latest) = window.latest() else {
            return Err(MarketError::EmptyWindow {
                symbol: window.symbol().to_string(),
                interval: window.interval().to_string(),
            });
        };
        let closes = window.closes();
        Ok(Self {
            price: latest.close,
            ma: moving_average(&closes, cfg.ma_period),
            bands: bollinger_bands(&closes, cfg.bb_period),
            sr: support_resistance(&window.highs(), &window.lows(), cfg.sr_lookback),
            pivots: pivot_points(latest.high, latest.low, latest.close),
            rsi: rsi(&closes, cfg.rsi_period),
        })
    }
}

/// Threshold rules over the snapshot. Every comparison fails closed: NaN
/// bands and infinite support/resistance sentinels can never satisfy a
/// proximity or in-band check, so short windows yield HOLD.
pub fn classify(view: &IndicatorView, thresholds: &ThresholdConfig) -> Signal {
    let price = view.price;
    let [s1, s2] = view.sr.support;
    let [r1, r2] = view.sr.resistance;
    let near_support = (price >= s1 && price <= s1 * thresholds.support_near[0])
        || (price >= s2 && price <= s2 * thresholds.support_near[1]);
    let near_resistance = (price <= r1 && price >= r1 * thresholds.resistance_near)
        || (price <= r2 && price >= r2 * thresholds.resistance_near);

    // A price below the lower band always fails the in-band check that
    // follows, leaving the moving-average arm as the only live path to
    // BUY.
    let dip_or_strength = price < view.bands.lower || price > view.ma;

    let mut signal = Signal::Hold;
    if near_support && dip_or_strength && price > view.bands.lower && price < view.bands.middle {
        signal = Signal::Buy;
    }
    if near_resistance && price > view.bands.middle && price < view.bands.upper {
        signal = Signal::Sell;
    }
    signal
}

/// Mean of the two resistance levels over price. Ranks BUY candidates;
/// higher means more room before overhead resistance.
pub fn resistance_headroom(view: &IndicatorView) -> f64 {
    (view.sr.resistance[0] + view.sr.resistance[1]) / 2.0 / view.price
}

pub struct Evaluator {
    windows: BTreeMap<String, Arc<RwLock<KlineWindow>>>,
    previous: HashMap<String, Signal>,
    audit: AuditWriter,
    alerter: Arc<dyn Alerter>,
    instance: String,
    interval: Interval,
    indicators: IndicatorConfig,
    thresholds: ThresholdConfig,
}

impl Evaluator {
    pub fn new(
        windows: BTreeMap<String, Arc<RwLock<KlineWindow>>>,
        audit: AuditWriter,
        alerter: Arc<dyn Alerter>,
        config: &StrategyConfig,
    ) -> Self {
        Self {
            windows,
            previous: HashMap::new(),
            audit,
            alerter,
            instance: config.instance.clone(),
            interval: config.interval,
            indicators: config.indicators.clone(),
            thresholds: config.thresholds.clone(),
        }
    }

    /// One sweep over every window, in symbol order. Symbols whose window
    /// is still empty are skipped; everything else produces a decision and
    /// an audit row.
    pub fn evaluate_all(&mut self) -> Vec<TradeSignal> {
        let views: Vec<(String, IndicatorView)> = self
            .windows
            .iter()
            .filter_map(|(symbol, window)| {
                let window = window.read();
                match IndicatorView::compute(&window, &self.indicators) {
                    Ok(view) => Some((symbol.clone(), view)),
                    Err(e) => {
                        debug!(symbol = %symbol, error = %e, "skipping evaluation");
                        None
                    }
                }
            })
            .collect();

        views
            .iter()
            .map(|(symbol, view)| self.evaluate_one(symbol, view))
            .collect()
    }

    fn evaluate_one(&mut self, symbol: &str, view: &IndicatorView) -> TradeSignal {
        let signal = classify(view, &self.thresholds);

        let mut headroom = resistance_headroom(view);
        if !headroom.is_finite() {
            debug!(symbol, "window too short for resistance levels");
            headroom = 0.0;
        }

        // Alert only when the signal changed and the change is actionable.
        // HOLD never updates the memory, so BUY then HOLD then BUY alerts
        // once.
        let previous = self.previous.get(symbol).copied().unwrap_or(Signal::Hold);
        if signal != previous && signal != Signal::Hold {
            self.alerter.alert_signal(&format!(
                "{} {}_{}: {} {}",
                self.instance, symbol, self.interval, signal, view.price
            ));
            self.previous.insert(symbol.to_string(), signal);
        }

        let row = AuditRow {
            price: view.price,
            support: view.sr.support,
            resistance: view.sr.resistance,
            upper_band: view.bands.upper,
            lower_band: view.bands.lower,
            moving_average: view.ma,
            signal,
        };
        if let Err(e) = self.audit.append(symbol, self.interval, Utc::now(), &row) {
            warn!(symbol, error = %e, "audit append failed");
        }

        TradeSignal {
            symbol: symbol.to_string(),
            signal,
            price: view.price,
            bb_upper_distance: headroom,
        }
    }
}
