use super::{RecordQuery, RecordStore};
use crate::core::profile::{Category, CategoryGroup, ConnectedAccount, Subscription};
use crate::core::records::{FinancialRecord, RecordKind};
use anyhow::{Result, anyhow};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
    records: Vec<FinancialRecord>,
    subscriptions: HashMap<String, Subscription>,
    accounts: Vec<ConnectedAccount>,
    categories: Vec<(CategoryGroup, Category)>,
    failing: HashSet<RecordKind>,
    failing_lookups: bool,
}

/// In-memory record store with the same query semantics as the SQLite one.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, mut record: FinancialRecord) -> i64 {
        let mut tables = self.inner.write().unwrap();
        record.id = tables.records.len() as i64 + 1;
        let id = record.id;
        tables.records.push(record);
        id
    }

    pub fn insert_subscription(&self, subscription: Subscription) {
        let mut tables = self.inner.write().unwrap();
        tables
            .subscriptions
            .insert(subscription.user_id.clone(), subscription);
    }

    pub fn insert_connected_account(&self, account: ConnectedAccount) {
        self.inner.write().unwrap().accounts.push(account);
    }

    pub fn insert_category(&self, group: CategoryGroup, category: Category) {
        self.inner.write().unwrap().categories.push((group, category));
    }

    /// Makes every query against `kind` fail, as a broken table would.
    pub fn fail_on(&self, kind: RecordKind) {
        self.inner.write().unwrap().failing.insert(kind);
    }

    /// Makes every lookup (subscription, accounts, categories) fail.
    pub fn fail_lookups(&self) {
        self.inner.write().unwrap().failing_lookups = true;
    }
}

impl RecordStore for MemoryStore {
    fn fetch_records(&self, query: &RecordQuery<'_>) -> Result<Vec<FinancialRecord>> {
        let tables = self.inner.read().unwrap();
        if tables.failing.contains(&query.kind) {
            return Err(anyhow!("{} table unavailable", query.kind));
        }

        let mut records: Vec<FinancialRecord> = tables
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));

        if let Some(page) = query.page {
            records = records
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .collect();
        }
        debug!(kind = %query.kind, count = records.len(), "Memory store query");
        Ok(records)
    }

    fn fetch_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
        let tables = self.inner.read().unwrap();
        if tables.failing_lookups {
            return Err(anyhow!("subscriptions table unavailable"));
        }
        Ok(tables.subscriptions.get(user_id).cloned())
    }

    fn fetch_connected_accounts(&self, user_id: &str) -> Result<Vec<ConnectedAccount>> {
        let tables = self.inner.read().unwrap();
        if tables.failing_lookups {
            return Err(anyhow!("connected_accounts table unavailable"));
        }
        Ok(tables
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn fetch_categories(&self, user_id: &str, group: CategoryGroup) -> Result<Vec<Category>> {
        let tables = self.inner.read().unwrap();
        if tables.failing_lookups {
            return Err(anyhow!("category tables unavailable"));
        }
        Ok(tables
            .categories
            .iter()
            .filter(|(g, c)| *g == group && c.user_id == user_id)
            .map(|(_, c)| c.clone())
            .collect())
    }
}
