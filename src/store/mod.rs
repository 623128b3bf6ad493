//! Read-only repositories for financial records and user lookups.

pub mod memory;
pub mod sqlite;

use crate::core::profile::{Category, CategoryGroup, ConnectedAccount, Subscription};
use crate::core::records::{FinancialRecord, RecordKind};
use crate::core::window::Page;
use anyhow::Result;
use chrono::NaiveDate;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A user scoped, date ranged query over one record collection.
///
/// Results are ordered by date, newest first. Without a `start` every record
/// up to `end` is returned; without a `page` the result is unbounded.
#[derive(Debug, Clone)]
pub struct RecordQuery<'a> {
    pub user_id: &'a str,
    pub kind: RecordKind,
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
    pub page: Option<Page>,
}

impl<'a> RecordQuery<'a> {
    pub fn new(user_id: &'a str, kind: RecordKind, end: NaiveDate) -> Self {
        RecordQuery {
            user_id,
            kind,
            start: None,
            end,
            page: None,
        }
    }

    pub fn since(mut self, start: NaiveDate) -> Self {
        self.start = Some(start);
        self
    }

    pub fn paged(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    pub fn matches(&self, record: &FinancialRecord) -> bool {
        record.user_id == self.user_id
            && record.kind == self.kind
            && self.start.is_none_or(|start| record.date >= start)
            && record.date <= self.end
    }
}

pub trait RecordStore: Send + Sync {
    fn fetch_records(&self, query: &RecordQuery<'_>) -> Result<Vec<FinancialRecord>>;

    fn fetch_subscription(&self, user_id: &str) -> Result<Option<Subscription>>;

    fn fetch_connected_accounts(&self, user_id: &str) -> Result<Vec<ConnectedAccount>>;

    fn fetch_categories(&self, user_id: &str, group: CategoryGroup) -> Result<Vec<Category>>;
}
