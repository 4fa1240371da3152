//! Indicator math over candle series
//!
//! All functions are pure and operate on slices ordered oldest to newest.
//! Series too short for a given period yield `NaN` (or infinite sentinels
//! for the empty support/resistance halves) rather than an error, and every
//! comparison made on the results is written so `NaN` falls through to the
//! conservative branch.

/// Simple moving average of the last `period` values.
///
/// Returns `NaN` until the series holds at least `period` values, so a
/// partially warmed window never produces an average over fewer points.
pub fn moving_average(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period {
        return f64::NAN;
    }
    let tail = &values[values.len() - period..];
    tail.iter().sum::<f64>() / period as f64
}

/// Bollinger bands around a simple moving average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bands at two population standard deviations around the `period` mean.
///
/// All three bands are `NaN` until the series holds `period` values.
pub fn bollinger_bands(values: &[f64], period: usize) -> BollingerBands {
    if period == 0 || values.len() < period {
        return BollingerBands {
            upper: f64::NAN,
            middle: f64::NAN,
            lower: f64::NAN,
        };
    }
    let tail = &values[values.len() - period..];
    let mean = tail.iter().sum::<f64>() / period as f64;
    let variance = tail.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
    let band = 2.0 * variance.sqrt();
    BollingerBands {
        upper: mean + band,
        middle: mean,
        lower: mean - band,
    }
}

/// Two support and two resistance levels from recent extremes.
///
/// Index 0 holds the level from the most recent half of the lookback,
/// index 1 the level from the half before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportResistance {
    pub support: [f64; 2],
    pub resistance: [f64; 2],
}

/// Splits the last `lookback` bars into two halves and takes the minimum
/// low (support) and maximum high (resistance) of each.
///
/// An empty half folds to `+inf` for support and `-inf` for resistance.
/// Those sentinels can never satisfy a proximity check against a finite
/// price, so short windows simply produce no level hits.
pub fn support_resistance(highs: &[f64], lows: &[f64], lookback: usize) -> SupportResistance {
    let half = lookback / 2;
    SupportResistance {
        support: [
            fold_min(tail(lows, half)),
            fold_min(prior_half(lows, half)),
        ],
        resistance: [
            fold_max(tail(highs, half)),
            fold_max(prior_half(highs, half)),
        ],
    }
}

fn tail(values: &[f64], count: usize) -> &[f64] {
    &values[values.len().saturating_sub(count)..]
}

fn prior_half(values: &[f64], count: usize) -> &[f64] {
    let len = values.len();
    &values[len.saturating_sub(2 * count)..len.saturating_sub(count)]
}

fn fold_min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn fold_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Classic floor-trader pivot levels derived from one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotPoints {
    pub pivot: f64,
    pub r1: f64,
    pub s1: f64,
    pub r2: f64,
    pub s2: f64,
}

pub fn pivot_points(high: f64, low: f64, close: f64) -> PivotPoints {
    let pivot = (high + low + close) / 3.0;
    PivotPoints {
        pivot,
        r1: 2.0 * pivot - low,
        s1: 2.0 * pivot - high,
        r2: pivot + (high - low),
        s2: pivot - (high - low),
    }
}

/// Relative strength index over the first `period` deltas of the series.
///
/// Needs `period + 1` values. Averages gains and losses across the deltas
/// at indices `1..=period`; a flat-or-rising stretch with zero average loss
/// saturates at 100.
pub fn rsi(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period + 1 {
        return f64::NAN;
    }
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for i in 1..=period {
        let delta = values[i] - values[i - 1];
        if delta >= 0.0 {
            gain_sum += delta;
        } else {
            loss_sum -= delta;
        }
    }
    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn moving_average_uses_only_the_tail() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((moving_average(&values, 3) - 4.0).abs() < EPS);
        assert!((moving_average(&values, 5) - 3.0).abs() < EPS);
    }

    #[test]
    fn moving_average_is_nan_before_warmup() {
        assert!(moving_average(&[1.0, 2.0], 3).is_nan());
        assert!(moving_average(&[], 1).is_nan());
        assert!(moving_average(&[1.0], 0).is_nan());
    }

    #[test]
    fn bollinger_bands_collapse_on_constant_series() {
        let values = [10.0; 20];
        let bands = bollinger_bands(&values, 20);
        assert!((bands.middle - 10.0).abs() < EPS);
        assert!((bands.upper - 10.0).abs() < EPS);
        assert!((bands.lower - 10.0).abs() < EPS);
    }

    #[test]
    fn bollinger_bands_use_population_deviation() {
        // mean 3, population variance 2, band width 2*sqrt(2)
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let bands = bollinger_bands(&values, 5);
        let sigma = 2.0_f64.sqrt();
        assert!((bands.middle - 3.0).abs() < EPS);
        assert!((bands.upper - (3.0 + 2.0 * sigma)).abs() < EPS);
        assert!((bands.lower - (3.0 - 2.0 * sigma)).abs() < EPS);
    }

    #[test]
    fn bollinger_bands_are_nan_before_warmup() {
        let bands = bollinger_bands(&[1.0, 2.0], 20);
        assert!(bands.upper.is_nan());
        assert!(bands.middle.is_nan());
        assert!(bands.lower.is_nan());
    }

    #[test]
    fn support_resistance_splits_the_lookback_in_half() {
        let mut lows: Vec<f64> = (1..=20).map(f64::from).collect();
        let mut highs: Vec<f64> = (101..=120).map(f64::from).collect();
        // make the prior half carry the extremes
        lows[3] = 0.5;
        highs[7] = 250.0;
        let sr = support_resistance(&highs, &lows, 20);
        assert!((sr.support[0] - 11.0).abs() < EPS);
        assert!((sr.support[1] - 0.5).abs() < EPS);
        assert!((sr.resistance[0] - 120.0).abs() < EPS);
        assert!((sr.resistance[1] - 250.0).abs() < EPS);
    }

    #[test]
    fn support_resistance_partial_prior_half() {
        // 15 bars: recent half is the last 10, prior half only 5 deep
        let lows: Vec<f64> = (1..=15).map(f64::from).collect();
        let highs: Vec<f64> = (1..=15).map(f64::from).collect();
        let sr = support_resistance(&highs, &lows, 20);
        assert!((sr.support[0] - 6.0).abs() < EPS);
        assert!((sr.support[1] - 1.0).abs() < EPS);
        assert!((sr.resistance[0] - 15.0).abs() < EPS);
        assert!((sr.resistance[1] - 5.0).abs() < EPS);
    }

    #[test]
    fn support_resistance_empty_halves_fold_to_infinities() {
        let sr = support_resistance(&[], &[], 20);
        assert_eq!(sr.support, [f64::INFINITY, f64::INFINITY]);
        assert_eq!(sr.resistance, [f64::NEG_INFINITY, f64::NEG_INFINITY]);

        // exactly one half of data leaves the prior half empty
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let sr = support_resistance(&values, &values, 20);
        assert!((sr.support[0] - 1.0).abs() < EPS);
        assert_eq!(sr.support[1], f64::INFINITY);
        assert!((sr.resistance[0] - 10.0).abs() < EPS);
        assert_eq!(sr.resistance[1], f64::NEG_INFINITY);
    }

    #[test]
    fn infinite_sentinels_never_pass_proximity_checks() {
        let sr = support_resistance(&[], &[], 20);
        let price = 100.0;
        // the buy-side proximity test used downstream
        assert!(!(price >= sr.support[0] && price <= sr.support[0] * 1.005));
        // the sell-side proximity test used downstream
        assert!(!(price <= sr.resistance[0] && price >= sr.resistance[0] * 0.995));
    }

    #[test]
    fn pivot_points_match_floor_trader_formulas() {
        let p = pivot_points(120.0, 90.0, 105.0);
        assert!((p.pivot - 105.0).abs() < EPS);
        assert!((p.r1 - 120.0).abs() < EPS);
        assert!((p.s1 - 90.0).abs() < EPS);
        assert!((p.r2 - 135.0).abs() < EPS);
        assert!((p.s2 - 75.0).abs() < EPS);
    }

    #[test]
    fn rsi_saturates_at_100_without_losses() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((rsi(&values, 4) - 100.0).abs() < EPS);
    }

    #[test]
    fn rsi_on_mixed_series() {
        // deltas: +2, -1, +2, -1 => avg gain 1.0, avg loss 0.5, RS 2, RSI 66.67
        let values = [10.0, 12.0, 11.0, 13.0, 12.0];
        let expected = 100.0 - 100.0 / 3.0;
        assert!((rsi(&values, 4) - expected).abs() < 1e-6);
    }

    #[test]
    fn rsi_needs_period_plus_one_values() {
        assert!(rsi(&[1.0, 2.0, 3.0], 3).is_nan());
        assert!(!rsi(&[1.0, 2.0, 3.0, 4.0], 3).is_nan());
    }

    #[test]
    fn rsi_is_zero_on_pure_decline() {
        let values = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert!(rsi(&values, 4).abs() < EPS);
    }
}
