pub mod cli;
pub mod core;
pub mod providers;
pub mod service;
pub mod store;

pub use crate::core::config;

use crate::core::aggregator::RecordAggregator;
use crate::core::currency::RateTable;
use crate::core::metrics::MetricKind;
use crate::providers::CbrRateProvider;
use crate::service::{FinHealthService, MetricRequest};
use crate::store::SqliteStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Rates,
    Analytics {
        request: MetricRequest,
        limit: u32,
        offset: u32,
        json: bool,
    },
    Metric {
        kind: MetricKind,
        request: MetricRequest,
    },
    Report {
        users: Vec<String>,
        request: MetricRequest,
    },
    More {
        user_id: Option<String>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("finhealth starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let provider = Arc::new(CbrRateProvider::new(config.cbr_base_url()));
    let rates = Arc::new(RateTable::new(provider, &config.base_currency));

    match command {
        AppCommand::Rates => cli::rates::run(&rates).await,
        AppCommand::Analytics {
            request,
            limit,
            offset,
            json,
        } => {
            let service = open_service(&config, rates)?;
            cli::analytics::run(&service, &request, limit, offset, json).await
        }
        AppCommand::Metric { kind, request } => {
            let service = open_service(&config, rates)?;
            cli::metric::run(&service, kind, &request).await
        }
        AppCommand::Report { users, request } => {
            let service = open_service(&config, rates)?;
            cli::report::run(&service, &users, &request).await
        }
        AppCommand::More { user_id } => {
            let service = open_service(&config, rates)?;
            cli::more::run(&service, user_id.as_deref())
        }
    }
}

fn open_service(
    config: &config::AppConfig,
    rates: Arc<RateTable>,
) -> Result<FinHealthService<SqliteStore>> {
    let db_path = config.database_path()?;
    debug!("Opening database at {}", db_path.display());
    let store = Arc::new(SqliteStore::open(&db_path)?);
    store.ensure_tables()?;

    Ok(FinHealthService::new(RecordAggregator::new(store, rates)).with_config(config))
}
