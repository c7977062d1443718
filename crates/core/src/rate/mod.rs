use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Recorded in place of today's rate when the upstream API is unavailable.
pub const SENTINEL_RATE: f64 = 0.0;

const QUOTE_CURRENCY: &str = "KRW";

#[async_trait::async_trait]
pub trait RateSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Today's USD→KRW rate, or [`SENTINEL_RATE`] when the upstream call does not succeed.
    async fn fetch_today_rate(&self) -> Result<f64>;
}

#[derive(Debug, Clone)]
pub struct ExchangeRateApiClient {
    http: reqwest::Client,
    url: String,
}

impl ExchangeRateApiClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait::async_trait]
impl RateSource for ExchangeRateApiClient {
    fn source_name(&self) -> &'static str {
        "exchangerate_api"
    }

    async fn fetch_today_rate(&self) -> Result<f64> {
        let res = match self.http.get(self.url.as_str()).send().await {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    sentinel = SENTINEL_RATE,
                    "rate API request failed; recording sentinel rate"
                );
                return Ok(SENTINEL_RATE);
            }
        };

        let status = res.status();
        if !status.is_success() {
            tracing::warn!(
                http_status = %status,
                sentinel = SENTINEL_RATE,
                "rate API returned non-success status; recording sentinel rate"
            );
            return Ok(SENTINEL_RATE);
        }

        // A body cut short by timeout or disconnect is a transport failure, not a bad payload.
        let text = match res.text().await {
            Ok(t) => t,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    sentinel = SENTINEL_RATE,
                    "rate API response body could not be read; recording sentinel rate"
                );
                return Ok(SENTINEL_RATE);
            }
        };
        parse_krw_rate(&text)
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    conversion_rates: BTreeMap<String, f64>,
}

fn parse_krw_rate(text: &str) -> Result<f64> {
    let body = serde_json::from_str::<LatestRatesResponse>(text)
        .with_context(|| format!("rate API response is not the expected JSON: {text}"))?;
    body.conversion_rates
        .get(QUOTE_CURRENCY)
        .copied()
        .with_context(|| format!("rate API response has no conversion_rates.{QUOTE_CURRENCY}"))
}

/// Fixed-rate source for tests and dry runs against recorded values.
#[derive(Debug, Clone, Copy)]
pub struct FixedRate(pub f64);

#[async_trait::async_trait]
impl RateSource for FixedRate {
    fn source_name(&self) -> &'static str {
        "fixed"
    }

    async fn fetch_today_rate(&self) -> Result<f64> {
        Ok(self.0)
    }
}
