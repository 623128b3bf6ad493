//! Currency normalization, record aggregation and the financial health metrics

pub mod aggregator;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod metrics;
pub mod profile;
pub mod records;
pub mod window;

pub use aggregator::{Analytics, RecordAggregator, RecordSet};
pub use currency::{CurrencyConverter, CurrencyRateProvider, RateTable};
pub use error::FinHealthError;
pub use metrics::{MetricKind, MetricResult};
pub use window::{Page, TimeWindow};
