//! Request pipeline on top of the core: identity check, window resolution,
//! aggregation, metric computation and the JSON envelopes handed back to the
//! transport layer.

use crate::core::aggregator::{Analytics, RecordAggregator};
use crate::core::config::AppConfig;
use crate::core::error::{FinHealthError, Result};
use crate::core::metrics::{self, MetricKind, MetricResult};
use crate::core::profile::{App, CategoryGroup, CategorySettings, More, Settings, group_by_bank};
use crate::core::window::{Page, TimeWindow};
use crate::store::RecordStore;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use tracing::{debug, error, instrument, warn};

/// Caller supplied parameters of one metric or analytics request.
#[derive(Debug, Clone, Default)]
pub struct MetricRequest {
    pub user_id: Option<String>,
    pub currency: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl MetricRequest {
    pub fn for_user(user_id: &str) -> Self {
        MetricRequest {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        }
    }
}

/// Successful metric envelope: `{"message", <field>, "status_code"}` where the
/// field is `delta`, `ratio` or `expense_propensity` depending on the result.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResponse {
    pub kind: MetricKind,
    pub message: String,
    pub result: MetricResult,
    pub status_code: u16,
}

impl MetricResponse {
    pub fn new(kind: MetricKind, result: MetricResult) -> Self {
        MetricResponse {
            kind,
            message: format!("{} calculated successfully", kind.label()),
            result,
            status_code: 200,
        }
    }
}

fn field_name(result: &MetricResult) -> &'static str {
    match result {
        MetricResult::Delta(_) => "delta",
        MetricResult::Ratio(_) => "ratio",
        MetricResult::Propensity(_) => "expense_propensity",
    }
}

impl Serialize for MetricResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry(field_name(&self.result), &self.result.value())?;
        map.serialize_entry("status_code", &self.status_code)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status_code: u16,
}

impl From<&FinHealthError> for ErrorResponse {
    fn from(err: &FinHealthError) -> Self {
        if let FinHealthError::Storage { .. } = err {
            error!("Request failed: {err:#}");
        }
        ErrorResponse {
            error: err.public_message(),
            status_code: err.status_code(),
        }
    }
}

/// All metrics of one user over one window.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub user_id: String,
    pub currency: String,
    pub window: TimeWindow,
    pub metrics: Vec<MetricResponse>,
}

pub struct FinHealthService<S: RecordStore + ?Sized> {
    aggregator: RecordAggregator<S>,
    reporting_currency: String,
    window_days: i64,
    max_page_size: u32,
    today: Option<NaiveDate>,
}

impl<S: RecordStore + ?Sized> FinHealthService<S> {
    pub fn new(aggregator: RecordAggregator<S>) -> Self {
        FinHealthService {
            aggregator,
            reporting_currency: String::new(),
            window_days: 30,
            max_page_size: 100,
            today: None,
        }
    }

    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.reporting_currency = config.reporting_currency.clone();
        self.window_days = config.default_window_days;
        self.max_page_size = config.max_page_size;
        self
    }

    /// Pins "today" used for default windows.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    fn window(&self, request: &MetricRequest) -> Result<TimeWindow> {
        TimeWindow::resolve(
            request.start.as_deref(),
            request.end.as_deref(),
            self.today(),
            self.window_days,
        )
    }

    fn currency<'a>(&'a self, request: &'a MetricRequest) -> &'a str {
        request
            .currency
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(self.reporting_currency.as_str())
    }

    #[instrument(skip(self, request), fields(user = ?request.user_id))]
    pub async fn metric(&self, kind: MetricKind, request: &MetricRequest) -> Result<MetricResponse> {
        let user_id = authenticate(request.user_id.as_deref())?;
        let window = self.window(request)?;
        let set = self
            .aggregator
            .fetch_records(user_id, self.currency(request), window)
            .await?;

        let result = metrics::compute(kind, &set);
        debug!(%kind, value = result.value(), "Computed metric");
        Ok(MetricResponse::new(kind, result))
    }

    /// Every metric from a single fetch of the user's records.
    #[instrument(skip(self, request), fields(user = ?request.user_id))]
    pub async fn report(&self, request: &MetricRequest) -> Result<Report> {
        let user_id = authenticate(request.user_id.as_deref())?;
        let window = self.window(request)?;
        let currency = self.currency(request);
        let set = self
            .aggregator
            .fetch_records(user_id, currency, window)
            .await?;

        Ok(Report {
            user_id: user_id.to_string(),
            currency: currency.to_string(),
            window,
            metrics: MetricKind::ALL
                .into_iter()
                .map(|kind| MetricResponse::new(kind, metrics::compute(kind, &set)))
                .collect(),
        })
    }

    #[instrument(skip(self, request), fields(user = ?request.user_id))]
    pub async fn analytics(
        &self,
        request: &MetricRequest,
        limit: u32,
        offset: u32,
    ) -> Result<Analytics> {
        let user_id = authenticate(request.user_id.as_deref())?;
        let window = self.window(request)?;
        let page = Page::clamped(limit, offset, self.max_page_size);
        self.aggregator
            .fetch_analytics(user_id, self.currency(request), page, window)
            .await
    }

    /// Subscription, connected accounts and category settings. A failing
    /// lookup is logged and leaves its part at the default.
    #[instrument(skip(self))]
    pub fn more(&self, user_id: Option<&str>) -> Result<More> {
        let user_id = authenticate(user_id)?;
        let store = self.aggregator.store();

        let subscription = store
            .fetch_subscription(user_id)
            .unwrap_or_else(|e| {
                warn!("Failed to get subscription for user {user_id}: {e:#}");
                None
            })
            .unwrap_or_default();

        let accounts = store.fetch_connected_accounts(user_id).unwrap_or_else(|e| {
            warn!("Failed to get connected accounts for user {user_id}: {e:#}");
            Vec::new()
        });

        let categories = |group: CategoryGroup| {
            store.fetch_categories(user_id, group).unwrap_or_else(|e| {
                warn!("Failed to get {group:?} categories for user {user_id}: {e:#}");
                Vec::new()
            })
        };

        Ok(More {
            app: App {
                connected_accounts: group_by_bank(accounts),
                category_settings: CategorySettings {
                    income_categories: categories(CategoryGroup::Income),
                    expense_categories: categories(CategoryGroup::Expense),
                    investment_categories: categories(CategoryGroup::Investment),
                },
            },
            settings: Settings { subscription },
        })
    }
}

fn authenticate(user_id: Option<&str>) -> Result<&str> {
    user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(FinHealthError::AuthenticationMissing)
}
