//! Currency conversion through a single pivot currency.
//!
//! Rates are quoted the way the central bank feed quotes them: `nominal` units
//! of a currency cost `value` units of the base currency. Every conversion goes
//! through the base, and the result is rounded once, half-up to 2 places.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRate {
    pub currency: String,
    pub value: f64,
    pub nominal: u32,
}

impl ExchangeRate {
    pub fn new(currency: &str, value: f64, nominal: u32) -> Self {
        ExchangeRate {
            currency: currency.to_string(),
            value,
            nominal,
        }
    }

    /// Price of a single unit in base currency.
    pub fn unit_value(&self) -> f64 {
        self.value / f64::from(self.nominal)
    }
}

/// An immutable set of rates as published by a provider at one point in time.
#[derive(Debug, Clone, Default)]
pub struct RateSnapshot {
    pub published: Option<NaiveDate>,
    rates: HashMap<String, ExchangeRate>,
}

impl RateSnapshot {
    pub fn new(published: Option<NaiveDate>, rates: impl IntoIterator<Item = ExchangeRate>) -> Self {
        let mut map = HashMap::new();
        for rate in rates {
            if rate.nominal == 0 {
                warn!(currency = %rate.currency, "Dropping exchange rate with zero nominal");
                continue;
            }
            if !(rate.value > 0.0 && rate.value.is_finite()) {
                warn!(
                    currency = %rate.currency,
                    value = rate.value,
                    "Dropping exchange rate with unusable value"
                );
                continue;
            }
            map.insert(rate.currency.clone(), rate);
        }
        RateSnapshot {
            published,
            rates: map,
        }
    }

    pub fn get(&self, currency: &str) -> Option<&ExchangeRate> {
        self.rates.get(currency)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rates sorted by currency code.
    pub fn rates(&self) -> Vec<&ExchangeRate> {
        let mut rates: Vec<_> = self.rates.values().collect();
        rates.sort_by(|a, b| a.currency.cmp(&b.currency));
        rates
    }
}

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn fetch_rates(&self) -> Result<RateSnapshot>;
}

/// Rounds half away from zero to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    // Going through the shortest decimal representation keeps 2.345 at 2.345
    // instead of 2.34499999...
    Decimal::from_str(&value.to_string())
        .ok()
        .and_then(|d| {
            d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
                .to_f64()
        })
        .unwrap_or_else(|| (value * 100.0).round() / 100.0)
}

/// Converts amounts using one rate snapshot.
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    base: String,
    rates: Arc<RateSnapshot>,
}

impl CurrencyConverter {
    pub fn new(base: &str, rates: Arc<RateSnapshot>) -> Self {
        CurrencyConverter {
            base: base.to_string(),
            rates,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn snapshot(&self) -> &RateSnapshot {
        &self.rates
    }

    fn unit_value(&self, currency: &str) -> Option<f64> {
        let rate = self.rates.get(currency);
        if rate.is_none() {
            warn!("Couldn't find exchange rate for {}", currency);
        }
        rate.map(ExchangeRate::unit_value)
    }

    /// Converts `amount` from one currency to another.
    ///
    /// An empty code or identical codes only round the amount. A code missing
    /// from the snapshot leaves the amount untouched (and unrounded).
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        self.try_convert(amount, from, to).unwrap_or(amount)
    }

    /// Like [`convert`](Self::convert) but `None` when a rate is missing.
    pub fn try_convert(&self, amount: f64, from: &str, to: &str) -> Option<f64> {
        if from.is_empty() || to.is_empty() || from == to {
            return Some(round2(amount));
        }

        let converted = if to == self.base {
            self.unit_value(from).map(|from_unit| amount * from_unit)
        } else if from == self.base {
            self.unit_value(to).map(|to_unit| amount / to_unit)
        } else {
            self.unit_value(from)
                .zip(self.unit_value(to))
                .map(|(from_unit, to_unit)| amount * from_unit / to_unit)
        }?;

        let value = round2(converted);
        debug!("Converted {amount} {from} to {value} {to}");
        Some(value)
    }
}

/// Shared holder of the current rate snapshot.
///
/// Empty until the first request for a converter, then filled from the
/// provider. A refresh swaps the whole snapshot; readers keep whichever `Arc`
/// they already hold.
pub struct RateTable {
    provider: Arc<dyn CurrencyRateProvider>,
    base: String,
    current: RwLock<Arc<RateSnapshot>>,
    /// Serializes lazy loads and remembers when the last one failed.
    last_failure: Mutex<Option<Instant>>,
    retry_after: Duration,
}

impl RateTable {
    pub fn new(provider: Arc<dyn CurrencyRateProvider>, base: &str) -> Self {
        RateTable {
            provider,
            base: base.to_string(),
            current: RwLock::new(Arc::new(RateSnapshot::default())),
            last_failure: Mutex::new(None),
            retry_after: Duration::from_secs(60),
        }
    }

    /// How long requests skip the lazy load after it failed.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Fetches a new snapshot and swaps it in. On error the old snapshot stays.
    pub async fn refresh(&self) -> Result<Arc<RateSnapshot>> {
        let snapshot = Arc::new(self.provider.fetch_rates().await?);
        debug!(rates = snapshot.len(), "Replacing rate snapshot");
        *self.current.write().await = Arc::clone(&snapshot);
        Ok(snapshot)
    }

    pub async fn replace(&self, snapshot: RateSnapshot) {
        *self.current.write().await = Arc::new(snapshot);
    }

    async fn loaded(&self) -> Option<Arc<RateSnapshot>> {
        let current = self.current.read().await;
        (!current.is_empty()).then(|| Arc::clone(&current))
    }

    /// Current snapshot, loading it on first use.
    ///
    /// A failed load is logged and yields the empty snapshot, so conversions
    /// fall back to unconverted amounts instead of failing the report. After a
    /// failure no load is attempted until `retry_after` has passed.
    pub async fn snapshot(&self) -> Arc<RateSnapshot> {
        if let Some(snapshot) = self.loaded().await {
            return snapshot;
        }

        let mut last_failure = self.last_failure.lock().await;
        if let Some(snapshot) = self.loaded().await {
            return snapshot;
        }
        if last_failure.is_some_and(|at| at.elapsed() < self.retry_after) {
            return Arc::clone(&*self.current.read().await);
        }

        // The rate lock is not held here, so a refresh or replace can proceed.
        match self.provider.fetch_rates().await {
            Ok(snapshot) => {
                debug!(rates = snapshot.len(), "Loaded initial rate snapshot");
                let snapshot = Arc::new(snapshot);
                *self.current.write().await = Arc::clone(&snapshot);
                *last_failure = None;
                snapshot
            }
            Err(e) => {
                warn!("Failed to load exchange rates: {e}");
                *last_failure = Some(Instant::now());
                Arc::clone(&*self.current.read().await)
            }
        }
    }

    pub async fn converter(&self) -> CurrencyConverter {
        CurrencyConverter::new(&self.base, self.snapshot().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn converter(rates: Vec<ExchangeRate>) -> CurrencyConverter {
        CurrencyConverter::new("RUB", Arc::new(RateSnapshot::new(None, rates)))
    }

    struct MockRateProvider {
        rates: Vec<ExchangeRate>,
        fail: bool,
        call_count: AtomicUsize,
    }

    impl MockRateProvider {
        fn new(rates: Vec<ExchangeRate>) -> Self {
            MockRateProvider {
                rates,
                fail: false,
                call_count: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            MockRateProvider {
                rates: Vec::new(),
                fail: true,
                call_count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CurrencyRateProvider for MockRateProvider {
        async fn fetch_rates(&self) -> Result<RateSnapshot> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("Rate service unavailable"));
            }
            // Every fetch moves the rates up a little so refreshes are observable.
            let bump = call as f64;
            Ok(RateSnapshot::new(
                None,
                self.rates
                    .iter()
                    .map(|r| ExchangeRate::new(&r.currency, r.value + bump, r.nominal)),
            ))
        }
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(2.345), 2.35);
        assert_eq!(round2(-2.345), -2.35);
        assert_eq!(round2(10.0), 10.0);
        assert_eq!(round2(0.004), 0.0);
        assert!(round2(f64::NAN).is_nan());
    }

    #[test]
    fn test_identity_conversion_rounds() {
        let conv = converter(vec![]);
        assert_eq!(conv.convert(12.345, "USD", "USD"), 12.35);
        assert_eq!(conv.convert(12.345, "", "USD"), 12.35);
        assert_eq!(conv.convert(12.345, "USD", ""), 12.35);
    }

    #[test]
    fn test_convert_to_and_from_base() {
        let conv = converter(vec![ExchangeRate::new("USD", 90.0, 1)]);
        assert_eq!(conv.convert(100.0, "USD", "RUB"), 9000.0);
        assert_eq!(conv.convert(9000.0, "RUB", "USD"), 100.0);
    }

    #[test]
    fn test_convert_respects_nominal() {
        let conv = converter(vec![ExchangeRate::new("JPY", 60.0, 100)]);
        assert_eq!(conv.convert(1000.0, "JPY", "RUB"), 600.0);
        assert_eq!(conv.convert(600.0, "RUB", "JPY"), 1000.0);
    }

    #[test]
    fn test_cross_conversion_goes_through_base() {
        let conv = converter(vec![
            ExchangeRate::new("USD", 90.0, 1),
            ExchangeRate::new("EUR", 100.0, 1),
        ]);
        assert_eq!(conv.convert(100.0, "EUR", "USD"), 111.11);
        assert_eq!(conv.convert(90.0, "USD", "EUR"), 81.0);
    }

    #[test]
    fn test_round_trip_within_rounding_tolerance() {
        let conv = converter(vec![
            ExchangeRate::new("USD", 92.4512, 1),
            ExchangeRate::new("KZT", 19.0733, 100),
        ]);
        for amount in [0.01, 1.0, 17.37, 1234.56, -250.5] {
            let there = conv.convert(amount, "USD", "KZT");
            let back = conv.convert(there, "KZT", "USD");
            assert!((back - amount).abs() <= 0.01, "{amount} came back as {back}");
        }
    }

    #[test]
    fn test_missing_rate_returns_original_amount() {
        let conv = converter(vec![ExchangeRate::new("USD", 90.0, 1)]);
        assert_eq!(conv.convert(12.345, "GBP", "RUB"), 12.345);
        assert_eq!(conv.convert(12.345, "RUB", "GBP"), 12.345);
        assert_eq!(conv.convert(12.345, "USD", "GBP"), 12.345);
        assert_eq!(conv.convert(12.345, "GBP", "USD"), 12.345);
        assert_eq!(conv.try_convert(12.345, "GBP", "USD"), None);
        assert_eq!(conv.try_convert(12.345, "GBP", "GBP"), Some(12.35));
    }

    #[test]
    fn test_zero_nominal_rates_are_dropped() {
        let snapshot = RateSnapshot::new(
            None,
            vec![
                ExchangeRate::new("USD", 90.0, 1),
                ExchangeRate::new("XXX", 1.0, 0),
            ],
        );
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("XXX").is_none());
    }

    #[test]
    fn test_non_positive_or_nan_rates_are_dropped() {
        let snapshot = RateSnapshot::new(
            None,
            vec![
                ExchangeRate::new("USD", 90.0, 1),
                ExchangeRate::new("XAU", 0.0, 1),
                ExchangeRate::new("XAG", -5.0, 1),
                ExchangeRate::new("XPT", f64::NAN, 1),
                ExchangeRate::new("XPD", f64::INFINITY, 1),
            ],
        );
        assert_eq!(snapshot.len(), 1);

        let conv = CurrencyConverter::new("RUB", Arc::new(snapshot));
        // A dropped rate is a rate miss: the amount comes back untouched.
        assert_eq!(conv.convert(100.0, "RUB", "XAU"), 100.0);
        assert_eq!(conv.try_convert(100.0, "RUB", "XAU"), None);
    }

    #[tokio::test]
    async fn test_rate_table_loads_lazily_once() {
        let provider = Arc::new(MockRateProvider::new(vec![ExchangeRate::new("USD", 90.0, 1)]));
        let table = RateTable::new(provider.clone(), "RUB");
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 0);

        let conv = table.converter().await;
        assert_eq!(conv.convert(1.0, "USD", "RUB"), 90.0);
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 1);

        let _ = table.converter().await;
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_swaps_whole_snapshot() {
        let provider = Arc::new(MockRateProvider::new(vec![ExchangeRate::new("USD", 90.0, 1)]));
        let table = RateTable::new(provider, "RUB");

        let before = table.converter().await;
        table.refresh().await.unwrap();
        let after = table.converter().await;

        // A reader holding the old snapshot still sees the old rates.
        assert_eq!(before.convert(1.0, "USD", "RUB"), 90.0);
        assert_eq!(after.convert(1.0, "USD", "RUB"), 91.0);
    }

    #[tokio::test]
    async fn test_failed_load_degrades_to_fallback() {
        let table = RateTable::new(Arc::new(MockRateProvider::failing()), "RUB");
        let conv = table.converter().await;
        assert!(conv.snapshot().is_empty());
        assert_eq!(conv.convert(10.0, "USD", "RUB"), 10.0);
        assert!(table.refresh().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_load_is_not_retried_until_retry_after() {
        let provider = Arc::new(MockRateProvider::failing());
        let table = RateTable::new(provider.clone(), "RUB");

        for _ in 0..5 {
            assert!(table.snapshot().await.is_empty());
        }
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 1);

        // An explicit refresh always asks the provider.
        assert!(table.refresh().await.is_err());
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried_after_delay() {
        let provider = Arc::new(MockRateProvider::failing());
        let table = RateTable::new(provider.clone(), "RUB").with_retry_after(Duration::ZERO);

        table.snapshot().await;
        table.snapshot().await;
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 2);
    }
}
