//! Terminal front end: one module per command.

pub mod analytics;
pub mod metric;
pub mod more;
pub mod rates;
pub mod report;
pub mod setup;
pub mod ui;

use crate::core::error::FinHealthError;
use crate::service::ErrorResponse;
use serde::Serialize;

/// Renders a service result as the JSON body the transport layer would send.
pub fn render_envelope<T: Serialize>(result: &Result<T, FinHealthError>) -> anyhow::Result<String> {
    let body = match result {
        Ok(value) => serde_json::to_string_pretty(value)?,
        Err(err) => serde_json::to_string_pretty(&ErrorResponse::from(err))?,
    };
    Ok(body)
}

/// Prints the envelope and turns a service error into a command failure.
pub fn respond<T: Serialize>(result: Result<T, FinHealthError>) -> anyhow::Result<()> {
    println!("{}", render_envelope(&result)?);
    result.map(|_| ()).map_err(|e| {
        anyhow::anyhow!(
            "Request failed with status {}: {}",
            e.status_code(),
            e.public_message()
        )
    })
}
