use super::ui;
use crate::core::metrics::MetricResult;
use crate::service::{FinHealthService, MetricRequest, Report};
use crate::store::RecordStore;
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;

impl Report {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);

        for metric in &self.metrics {
            let decimals = match metric.result {
                MetricResult::Delta(_) => 2,
                MetricResult::Ratio(_) | MetricResult::Propensity(_) => 4,
            };
            table.add_row(vec![
                Cell::new(metric.kind.label()),
                ui::metric_cell(metric.result.value(), decimals),
            ]);
        }

        let currency = if self.currency.is_empty() {
            "recorded currencies"
        } else {
            self.currency.as_str()
        };
        format!(
            "User: {}\n{}\n\n{}",
            ui::style_text(&self.user_id, ui::StyleType::Title),
            ui::style_text(
                &format!(
                    "{} to {}, in {}",
                    self.window.start, self.window.end, currency
                ),
                ui::StyleType::Subtle
            ),
            table
        )
    }
}

/// Computes the report of every user concurrently and prints them in order.
/// Fails when any user's report failed, after printing the others.
pub async fn run<S: RecordStore + ?Sized>(
    service: &FinHealthService<S>,
    users: &[String],
    template: &MetricRequest,
) -> Result<()> {
    let pb = ui::new_progress_bar(users.len() as u64, true);
    pb.set_message("Computing reports...");

    let futures = users.iter().map(|user| {
        let pb = pb.clone();
        let request = MetricRequest {
            user_id: Some(user.clone()),
            ..template.clone()
        };
        async move {
            let report = service.report(&request).await;
            pb.inc(1);
            (user, report)
        }
    });
    let reports = join_all(futures).await;
    pb.finish_and_clear();

    let mut failed = 0;
    let count = reports.len();
    for (i, (user, report)) in reports.into_iter().enumerate() {
        match report {
            Ok(report) => println!("{}", report.display_as_table()),
            Err(e) => {
                failed += 1;
                let body = super::render_envelope::<Report>(&Err(e))?;
                println!(
                    "User: {}\n{}",
                    ui::style_text(user, ui::StyleType::Title),
                    ui::style_text(&body, ui::StyleType::Error)
                );
            }
        }
        if i + 1 < count {
            ui::print_separator();
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {count} reports failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::MetricKind;
    use crate::core::window::TimeWindow;
    use crate::service::MetricResponse;
    use chrono::NaiveDate;

    #[test]
    fn test_report_table() {
        let report = Report {
            user_id: "u1".to_string(),
            currency: "RUB".to_string(),
            window: TimeWindow::trailing(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(), 30)
                .unwrap(),
            metrics: vec![
                MetricResponse::new(MetricKind::ExpenditureDelta, MetricResult::Delta(80.0)),
                MetricResponse::new(MetricKind::LiquidFundRatio, MetricResult::Ratio(0.6)),
            ],
        };

        let output = report.display_as_table();
        assert!(output.contains("u1"));
        assert!(output.contains("2024-05-01 to 2024-05-31, in RUB"));
        assert!(output.contains("Expenditure delta"));
        assert!(output.contains("80.00"));
        assert!(output.contains("0.6000"));
    }
}
