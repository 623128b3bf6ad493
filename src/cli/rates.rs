use super::ui;
use crate::core::currency::{RateSnapshot, RateTable};
use anyhow::Result;
use comfy_table::Cell;

pub fn display_rates_table(snapshot: &RateSnapshot, base: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Nominal"),
        ui::header_cell(&format!("Rate ({base})")),
        ui::header_cell(&format!("Per unit ({base})")),
    ]);

    for rate in snapshot.rates() {
        table.add_row(vec![
            Cell::new(&rate.currency),
            Cell::new(rate.nominal),
            ui::amount_cell(rate.value),
            Cell::new(format!("{:.4}", rate.unit_value())),
        ]);
    }

    let published = snapshot
        .published
        .map_or("unknown date".to_string(), |d| d.to_string());
    format!(
        "Exchange rates published {}\n\n{}",
        ui::style_text(&published, ui::StyleType::Title),
        table
    )
}

/// Fetches a fresh snapshot and prints it.
pub async fn run(rates: &RateTable) -> Result<()> {
    let pb = ui::new_spinner("Fetching exchange rates...");
    let snapshot = rates.refresh().await;
    pb.finish_and_clear();

    let snapshot = snapshot?;
    println!("{}", display_rates_table(&snapshot, rates.base()));
    Ok(())
}
