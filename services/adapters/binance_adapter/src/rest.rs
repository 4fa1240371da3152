//! REST preload of historical candles

use market::{Bar, HistoricalKline, Interval};
use tracing::debug;
use url::Url;

use crate::config::BinanceConfig;
use crate::error::{AdapterError, Result};

/// Fetches the most recent `limit` closed-or-open candles for one symbol,
/// oldest first, exactly as the exchange returns them.
///
/// Used once per tracked symbol at startup so the rolling window is full
/// before the first live kline arrives.
pub async fn preload_klines(
    client: &reqwest::Client,
    config: &BinanceConfig,
    symbol: &str,
    interval: Interval,
    limit: usize,
) -> Result<Vec<Bar>> {
    let url = klines_url(&config.rest_endpoint, symbol, interval, limit)?;
    debug!(%url, "preloading candles");
    let response = client.get(url.clone()).send().await?;
    if !response.status().is_success() {
        return Err(AdapterError::RestStatus {
            status: response.status(),
            url: url.to_string(),
        });
    }
    let rows: Vec<HistoricalKline> = response.json().await?;
    let bars = rows
        .into_iter()
        .map(|row| row.into_bar().map_err(AdapterError::from))
        .collect::<Result<Vec<_>>>()?;
    debug!(symbol, count = bars.len(), "preloaded candles");
    Ok(bars)
}

/// Builds the klines request URL. Split out so the query shape is testable
/// without a live endpoint.
pub fn klines_url(endpoint: &str, symbol: &str, interval: Interval, limit: usize) -> Result<Url> {
    let mut url = Url::parse(endpoint)?.join("api/v3/klines")?;
    url.query_pairs_mut()
        .append_pair("symbol", &symbol.to_uppercase())
        .append_pair("interval", interval.as_str())
        .append_pair("limit", &limit.to_string());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn klines_url_has_uppercased_symbol_and_limit() {
        let url = klines_url(
            "https://api.binance.com",
            "solusdt",
            Interval::FifteenMinutes,
            200,
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.binance.com/api/v3/klines?symbol=SOLUSDT&interval=15m&limit=200"
        );
    }

    #[test]
    fn klines_url_rejects_garbage_endpoint() {
        assert!(klines_url("not a url", "SOLUSDT", Interval::OneHour, 10).is_err());
    }
}
