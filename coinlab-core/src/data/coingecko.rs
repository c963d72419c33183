//! CoinGecko price provider.
//!
//! Fetches the market-cap ranking and daily price histories from the public
//! v3 API. Handles rate limiting through a `BackoffPolicy` and the shared
//! circuit breaker. Only the `prices` array of `market_chart` is used.

use super::backoff::BackoffPolicy;
use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, PriceProvider};
use super::timestamp::from_epoch_millis;
use crate::domain::RawPoint;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// One entry of `/coins/markets`.
#[derive(Debug, Deserialize)]
struct MarketEntry {
    id: String,
}

/// `/coins/{id}/market_chart` response. Each price is `[epoch_ms, price]`.
#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, Option<f64>)>,
}

pub struct CoinGeckoProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    backoff: BackoffPolicy,
    base_url: String,
    vs_currency: String,
}

impl CoinGeckoProvider {
    pub fn new(
        circuit_breaker: Arc<CircuitBreaker>,
        backoff: BackoffPolicy,
        vs_currency: impl Into<String>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("coinlab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            backoff,
            base_url: DEFAULT_BASE_URL.to_string(),
            vs_currency: vs_currency.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn markets_url(&self, n: usize) -> String {
        format!(
            "{}/coins/markets?vs_currency={}&order=market_cap_desc&per_page={n}&page=1",
            self.base_url, self.vs_currency
        )
    }

    fn market_chart_url(&self, asset_id: &str, days: u32) -> String {
        format!(
            "{}/coins/{asset_id}/market_chart?vs_currency={}&days={days}",
            self.base_url, self.vs_currency
        )
    }

    /// GET with retry and circuit breaker logic, decoding JSON on success.
    fn get_json<T: DeserializeOwned>(&self, url: &str, label: &str) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;
        let mut retry_after: Option<Duration> = None;

        for attempt in 0..=self.backoff.max_retries {
            if attempt > 0 {
                let delay = self.backoff.retry_delay_with_hint(attempt, retry_after.take());
                log::debug!("{label}: retry {attempt} in {delay:?}");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::AssetNotFound {
                    asset_id: label.to_string(),
                });
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let secs = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                retry_after = Some(Duration::from_secs(secs));
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: secs,
                });
                continue;
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {label}")));
                continue;
            }

            let body: T = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {label}: {e}"))
            })?;
            self.circuit_breaker.record_success();
            return Ok(body);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Convert `[epoch_ms, price]` pairs, skipping null prices.
fn parse_prices(asset_id: &str, prices: Vec<(f64, Option<f64>)>) -> Result<Vec<RawPoint>, DataError> {
    let mut points = Vec::with_capacity(prices.len());
    for (ms, price) in prices {
        let Some(price) = price else { continue };
        let timestamp = from_epoch_millis(ms as i64)
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ms}")))?;
        points.push(RawPoint::new(timestamp, price));
    }

    if points.is_empty() {
        return Err(DataError::AssetNotFound {
            asset_id: asset_id.to_string(),
        });
    }
    Ok(points)
}

impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn top_assets(&self, n: usize) -> Result<Vec<String>, DataError> {
        let entries: Vec<MarketEntry> = self.get_json(&self.markets_url(n), "coins/markets")?;
        Ok(entries.into_iter().map(|e| e.id).collect())
    }

    fn price_history(&self, asset_id: &str, days: u32) -> Result<Vec<RawPoint>, DataError> {
        let chart: MarketChart = self.get_json(&self.market_chart_url(asset_id, days), asset_id)?;
        parse_prices(asset_id, chart.prices)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> CoinGeckoProvider {
        CoinGeckoProvider::new(
            Arc::new(CircuitBreaker::default_provider()),
            BackoffPolicy::none(),
            "brl",
        )
        .unwrap()
    }

    #[test]
    fn urls_carry_currency_and_window() {
        let p = provider().with_base_url("http://localhost:9");
        assert_eq!(
            p.market_chart_url("bitcoin", 365),
            "http://localhost:9/coins/bitcoin/market_chart?vs_currency=brl&days=365"
        );
        assert!(p.markets_url(10).contains("per_page=10"));
    }

    #[test]
    fn market_chart_payload_parses() {
        let json = r#"{"prices":[[1704067200000,220000.5],[1704153600000,null],[1704240000000,231000.0]],"market_caps":[]}"#;
        let chart: MarketChart = serde_json::from_str(json).unwrap();
        let points = parse_prices("bitcoin", chart.prices).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].price, 220000.5);
        assert_eq!(points[1].timestamp.and_utc().timestamp_millis(), 1704240000000);
    }

    #[test]
    fn empty_prices_is_not_found() {
        let err = parse_prices("ghost", vec![]).unwrap_err();
        assert!(matches!(err, DataError::AssetNotFound { .. }));
    }

    #[test]
    fn tripped_breaker_refuses_without_network() {
        let p = provider();
        p.circuit_breaker.trip();
        assert!(!p.is_available());
        assert!(matches!(
            p.price_history("bitcoin", 365),
            Err(DataError::CircuitBreakerTripped)
        ));
    }
}
