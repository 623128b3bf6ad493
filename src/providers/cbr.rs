use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::currency::{CurrencyRateProvider, ExchangeRate, RateSnapshot};
use crate::providers::util::{RetryPolicy, with_retry};

/// Daily rates of the Central Bank of Russia, quoted in roubles.
pub struct CbrRateProvider {
    base_url: String,
    retry: RetryPolicy,
    /// Per request, covers connecting and reading the body.
    timeout: Duration,
}

impl CbrRateProvider {
    pub fn new(base_url: &str) -> Self {
        CbrRateProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Debug, Deserialize)]
struct CbrDailyResponse {
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "Valute")]
    valute: HashMap<String, CbrValute>,
}

#[derive(Debug, Deserialize)]
struct CbrValute {
    #[serde(rename = "CharCode")]
    char_code: String,
    #[serde(rename = "Nominal")]
    nominal: u32,
    #[serde(rename = "Value")]
    value: f64,
}

fn parse_snapshot(text: &str) -> Result<RateSnapshot> {
    let data: CbrDailyResponse =
        serde_json::from_str(text).map_err(|e| anyhow!("Failed to parse CBR rates: {}", e))?;

    let published = data.date.as_deref().and_then(|d| {
        DateTime::parse_from_rfc3339(d)
            .map(|dt| dt.date_naive())
            .map_err(|e| debug!("Could not parse CBR date '{}': {}", d, e))
            .ok()
    });

    Ok(RateSnapshot::new(
        published,
        data.valute
            .into_values()
            .map(|v| ExchangeRate::new(&v.char_code, v.value, v.nominal)),
    ))
}

#[async_trait]
impl CurrencyRateProvider for CbrRateProvider {
    #[instrument(name = "CbrRateFetch", skip(self))]
    async fn fetch_rates(&self) -> Result<RateSnapshot> {
        let url = format!("{}/daily_json.js", self.base_url);
        debug!("Requesting exchange rates from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("finhealth/0.1")
            .timeout(self.timeout)
            .build()?;
        let response = with_retry(|| client.get(&url).send(), self.retry)
            .await
            .with_context(|| format!("Failed to request exchange rates from {url}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for exchange rates",
                response.status()
            ));
        }

        let text = response.text().await?;
        let snapshot = parse_snapshot(&text)?;
        if snapshot.is_empty() {
            return Err(anyhow!("No exchange rates found in CBR response"));
        }
        debug!(rates = snapshot.len(), published = ?snapshot.published, "Received exchange rates");
        Ok(snapshot)
    }
}
