use chrono::{Duration, Local, NaiveDate};
use finhealth::core::aggregator::RecordAggregator;
use finhealth::core::currency::{CurrencyRateProvider, RateTable};
use finhealth::core::metrics::{MetricKind, MetricResult};
use finhealth::core::records::{FinancialRecord, Liquidity, MonetaryAmount, RecordKind};
use finhealth::providers::CbrRateProvider;
use finhealth::service::{FinHealthService, MetricRequest};
use finhealth::store::SqliteStore;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const DAILY_RATES: &str = r#"{
        "Date": "2024-05-30T11:30:00+03:00",
        "Valute": {
            "USD": {"CharCode": "USD", "Nominal": 1, "Value": 90.0},
            "EUR": {"CharCode": "EUR", "Nominal": 1, "Value": 100.0},
            "JPY": {"CharCode": "JPY", "Nominal": 100, "Value": 60.0}
        }
    }"#;

    pub async fn create_cbr_mock_server() -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/daily_json.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DAILY_RATES))
            .mount(&mock_server)
            .await;
        mock_server
    }
}

fn days_ago(days: i64) -> NaiveDate {
    Local::now().date_naive() - Duration::days(days)
}

fn record(kind: RecordKind, value: f64, currency: &str, date: NaiveDate) -> FinancialRecord {
    FinancialRecord::new(kind, "42", MonetaryAmount::new(value, currency), date)
}

/// Income of 100 USD, 500 RUB of planned and 420 RUB of actual expenses.
fn seed_database(path: &Path) {
    let store = SqliteStore::open(path).expect("Failed to open database");
    store.ensure_tables().expect("Failed to create tables");

    let records = [
        record(RecordKind::Income, 100.0, "USD", days_ago(2)),
        record(RecordKind::Expense, 500.0, "RUB", days_ago(3)).planned(true),
        record(RecordKind::Expense, -400.0, "RUB", days_ago(3)),
        record(RecordKind::Expense, -20.0, "RUB", days_ago(1)),
        record(RecordKind::Expense, -1000.0, "RUB", days_ago(90)),
        record(RecordKind::WealthFund, 900.0, "RUB", days_ago(5)).with_liquidity(Liquidity::Liquid),
        record(RecordKind::WealthFund, 10.0, "EUR", days_ago(200))
            .with_liquidity(Liquidity::Illiquid),
    ];
    for r in &records {
        store.insert_record(r).expect("Failed to insert record");
    }
}

fn write_config(dir: &Path, db_path: &Path, cbr_url: &str) -> String {
    let config_path = dir.join("config.yaml");
    let config_content = format!(
        r#"
        database_path: "{}"
        base_currency: "RUB"
        reporting_currency: "RUB"
        providers:
          cbr:
            base_url: {}
    "#,
        db_path.display(),
        cbr_url
    );
    fs::write(&config_path, config_content).expect("Failed to write config file");
    config_path.to_string_lossy().into_owned()
}

#[test_log::test(tokio::test)]
async fn test_metrics_over_sqlite_with_mocked_rates() {
    let mock_server = test_utils::create_cbr_mock_server().await;
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("finhealth.db");
    seed_database(&db_path);

    let store = Arc::new(SqliteStore::open(&db_path).unwrap());
    let rates = Arc::new(RateTable::new(
        Arc::new(CbrRateProvider::new(&mock_server.uri())),
        "RUB",
    ));
    let service = FinHealthService::new(RecordAggregator::new(store, rates));

    let request = MetricRequest {
        currency: Some("RUB".to_string()),
        ..MetricRequest::for_user("42")
    };

    let delta = service
        .metric(MetricKind::ExpenditureDelta, &request)
        .await
        .unwrap();
    assert_eq!(delta.result, MetricResult::Delta(80.0));

    let propensity = service
        .metric(MetricKind::ExpensePropensity, &request)
        .await
        .unwrap();
    assert!((propensity.result.value() - 420.0 / 9000.0).abs() < 1e-9);

    // 900 liquid RUB against 900 + 1000 (10 EUR) in total.
    let liquid = service
        .metric(MetricKind::LiquidFundRatio, &request)
        .await
        .unwrap();
    assert!((liquid.result.value() - 900.0 / 1900.0).abs() < 1e-9);

    let body = serde_json::to_value(&delta).unwrap();
    assert_eq!(body["message"], "Expenditure delta calculated successfully");
    assert_eq!(body["status_code"], 200);
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = test_utils::create_cbr_mock_server().await;
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("data").join("finhealth.db");
    seed_database(&db_path);
    let config_path = write_config(temp_dir.path(), &db_path, &mock_server.uri());

    let commands = vec![
        finhealth::AppCommand::Rates,
        finhealth::AppCommand::Metric {
            kind: MetricKind::SavingsToIncomeRatio,
            request: MetricRequest::for_user("42"),
        },
        finhealth::AppCommand::Report {
            users: vec!["42".to_string(), "43".to_string()],
            request: MetricRequest::default(),
        },
        finhealth::AppCommand::Analytics {
            request: MetricRequest::for_user("42"),
            limit: 10,
            offset: 0,
            json: false,
        },
        finhealth::AppCommand::More {
            user_id: Some("42".to_string()),
        },
    ];

    for command in commands {
        let result = finhealth::run_command(command, Some(&config_path)).await;
        assert!(
            result.is_ok(),
            "Command failed with: {:?}",
            result.err()
        );
    }
}

#[test_log::test(tokio::test)]
async fn test_missing_user_fails_command() {
    let mock_server = test_utils::create_cbr_mock_server().await;
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("finhealth.db");
    let config_path = write_config(temp_dir.path(), &db_path, &mock_server.uri());

    let result = finhealth::run_command(
        finhealth::AppCommand::Metric {
            kind: MetricKind::LoansPropensity,
            request: MetricRequest::default(),
        },
        Some(&config_path),
    )
    .await;
    assert!(result.unwrap_err().to_string().contains("401"));
}

#[test_log::test(tokio::test)]
async fn test_unreachable_rate_feed_keeps_amounts() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("finhealth.db");
    seed_database(&db_path);

    // No mock mounted: every request answers 404.
    let mock_server = wiremock::MockServer::start().await;
    let store = Arc::new(SqliteStore::open(&db_path).unwrap());
    let rates = Arc::new(RateTable::new(
        Arc::new(CbrRateProvider::new(&mock_server.uri())),
        "RUB",
    ));
    let service = FinHealthService::new(RecordAggregator::new(store, rates));

    let analytics = service
        .analytics(
            &MetricRequest {
                currency: Some("RUB".to_string()),
                ..MetricRequest::for_user("42")
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(analytics.income[0].amount.value, 100.0);
    assert_eq!(analytics.income[0].amount.currency, "USD");
}

#[test_log::test(tokio::test)]
#[ignore = "hits the live CBR feed"]
async fn test_real_cbr_rates() {
    let provider = CbrRateProvider::new(finhealth::config::DEFAULT_CBR_URL);

    match provider.fetch_rates().await {
        Ok(snapshot) => {
            info!(rates = snapshot.len(), published = ?snapshot.published, "Received rates");
            let usd = snapshot.get("USD").expect("USD rate should be published");
            assert!(usd.value > 0.0, "Rate should be positive");
            assert!(usd.nominal >= 1);
        }
        Err(e) => {
            error!("CBR request failed: {e}\n{e:?}");
            panic!("CBR request failed: {e}");
        }
    }
}

#[test_log::test(tokio::test)]
async fn test_rates_command_needs_no_database() {
    let mock_server = test_utils::create_cbr_mock_server().await;
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    // A regular file in place of the data directory makes the database unopenable.
    let blocker = temp_dir.path().join("not_a_dir");
    fs::write(&blocker, "").expect("Failed to write file");
    let config_path = write_config(
        temp_dir.path(),
        &blocker.join("finhealth.db"),
        &mock_server.uri(),
    );

    let rates = finhealth::run_command(finhealth::AppCommand::Rates, Some(&config_path)).await;
    assert!(rates.is_ok(), "Rates failed with: {:?}", rates.err());

    let more = finhealth::run_command(
        finhealth::AppCommand::More {
            user_id: Some("42".to_string()),
        },
        Some(&config_path),
    )
    .await;
    assert!(more.is_err());
}
