use super::ui;
use crate::core::aggregator::Analytics;
use crate::core::records::FinancialRecord;
use crate::service::{FinHealthService, MetricRequest};
use crate::store::RecordStore;
use anyhow::Result;
use comfy_table::Cell;

fn records_table(title: &str, records: &[FinancialRecord]) -> String {
    if records.is_empty() {
        return format!(
            "{}\n{}",
            ui::style_text(title, ui::StyleType::Title),
            ui::style_text("No records in this window", ui::StyleType::Subtle)
        );
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Amount"),
        ui::header_cell("Currency"),
        ui::header_cell("Planned"),
        ui::header_cell("Counterparty"),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(record.date),
            ui::amount_cell(record.amount.value),
            Cell::new(&record.amount.currency),
            Cell::new(if record.planned { "yes" } else { "no" }),
            ui::optional_cell(record.counterparty.as_deref()),
        ]);
    }
    format!("{}\n{}", ui::style_text(title, ui::StyleType::Title), table)
}

pub fn display_analytics(analytics: &Analytics) -> String {
    [
        records_table("Income", &analytics.income),
        records_table("Expense", &analytics.expense),
        records_table("Wealth fund", &analytics.wealth_fund),
    ]
    .join("\n\n")
}

pub async fn run<S: RecordStore + ?Sized>(
    service: &FinHealthService<S>,
    request: &MetricRequest,
    limit: u32,
    offset: u32,
    json: bool,
) -> Result<()> {
    let result = service.analytics(request, limit, offset).await;
    if json {
        return super::respond(result);
    }
    match result {
        Ok(analytics) => {
            println!("{}", display_analytics(&analytics));
            Ok(())
        }
        Err(e) => super::respond::<Analytics>(Err(e)),
    }
}
