//! Error taxonomy for the request pipeline.
//!
//! Only missing identity, a bad window and storage failures stop a request.
//! Missing exchange rates and zero denominators degrade inside the pipeline
//! and never surface here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FinHealthError>;

#[derive(Error, Debug)]
pub enum FinHealthError {
    #[error("authentication error")]
    AuthenticationMissing,

    #[error("invalid time window: {0}")]
    InvalidWindow(String),

    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FinHealthError {
    pub fn storage(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        FinHealthError::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    /// HTTP-style status code the transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            FinHealthError::AuthenticationMissing => 401,
            FinHealthError::InvalidWindow(_) => 400,
            FinHealthError::Storage { .. } => 500,
        }
    }

    /// Message that is safe to hand to an end user. Storage causes stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            FinHealthError::AuthenticationMissing => "authentication error".to_string(),
            FinHealthError::InvalidWindow(reason) => format!("invalid time window: {reason}"),
            FinHealthError::Storage { .. } => "internal server error".to_string(),
        }
    }
}

impl From<rusqlite::Error> for FinHealthError {
    fn from(err: rusqlite::Error) -> Self {
        FinHealthError::storage("query failed", err)
    }
}
