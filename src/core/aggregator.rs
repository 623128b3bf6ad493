//! Fetches a user's records and normalizes them into one reporting currency.
use crate::core::currency::{CurrencyConverter, RateTable};
use crate::core::error::{FinHealthError, Result};
use crate::core::records::{FinancialRecord, MonetaryAmount, RecordKind};
use crate::core::window::{Page, TimeWindow};
use crate::store::{RecordQuery, RecordStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Income, expense and wealth fund records of one page and window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Analytics {
    pub income: Vec<FinancialRecord>,
    pub expense: Vec<FinancialRecord>,
    pub wealth_fund: Vec<FinancialRecord>,
}

/// Every record the metrics need for one user.
///
/// Incomes and expenses cover the window only. Wealth fund entries, loans and
/// investments cover everything up to `window.end` so balances can be summed.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSet {
    pub window: TimeWindow,
    pub currency: String,
    pub income: Vec<FinancialRecord>,
    pub expense: Vec<FinancialRecord>,
    pub wealth_fund: Vec<FinancialRecord>,
    pub loans: Vec<FinancialRecord>,
    pub investments: Vec<FinancialRecord>,
}

impl RecordSet {
    pub fn empty(window: TimeWindow, currency: &str) -> Self {
        RecordSet {
            window,
            currency: currency.to_string(),
            income: Vec::new(),
            expense: Vec::new(),
            wealth_fund: Vec::new(),
            loans: Vec::new(),
            investments: Vec::new(),
        }
    }

    pub fn records(&self, kind: RecordKind) -> &[FinancialRecord] {
        match kind {
            RecordKind::Income => &self.income,
            RecordKind::Expense => &self.expense,
            RecordKind::WealthFund => &self.wealth_fund,
            RecordKind::Loan => &self.loans,
            RecordKind::Investment => &self.investments,
        }
    }

    fn records_mut(&mut self, kind: RecordKind) -> &mut Vec<FinancialRecord> {
        match kind {
            RecordKind::Income => &mut self.income,
            RecordKind::Expense => &mut self.expense,
            RecordKind::WealthFund => &mut self.wealth_fund,
            RecordKind::Loan => &mut self.loans,
            RecordKind::Investment => &mut self.investments,
        }
    }
}

/// Converts a record's amounts into `currency` in place.
///
/// Records already in `currency`, or any record when `currency` is empty, are
/// left untouched. So is a record whose currency has no rate.
pub fn normalize(record: &mut FinancialRecord, converter: &CurrencyConverter, currency: &str) {
    if currency.is_empty() || record.amount.currency == currency {
        return;
    }
    let from = record.amount.currency.clone();
    if let Some(value) = converter.try_convert(record.amount.value, &from, currency) {
        record.amount = MonetaryAmount::new(value, currency);
        record.payment = record
            .payment
            .map(|payment| converter.convert(payment, &from, currency));
    }
}

pub struct RecordAggregator<S: RecordStore + ?Sized> {
    store: Arc<S>,
    rates: Arc<RateTable>,
}

impl<S: RecordStore + ?Sized> RecordAggregator<S> {
    pub fn new(store: Arc<S>, rates: Arc<RateTable>) -> Self {
        RecordAggregator { store, rates }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn fetch_kind(
        &self,
        query: &RecordQuery<'_>,
        converter: &CurrencyConverter,
        currency: &str,
    ) -> Result<Vec<FinancialRecord>> {
        let mut records = self
            .store
            .fetch_records(query)
            .map_err(|e| FinHealthError::storage(format!("error getting {}", query.kind), e))?;
        for record in &mut records {
            normalize(record, converter, currency);
        }
        Ok(records)
    }

    /// One page of income, expense and wealth fund records inside `window`,
    /// newest first, with amounts in `currency`.
    #[instrument(skip(self))]
    pub async fn fetch_analytics(
        &self,
        user_id: &str,
        currency: &str,
        page: Page,
        window: TimeWindow,
    ) -> Result<Analytics> {
        let converter = self.rates.converter().await;
        let query = |kind| {
            RecordQuery::new(user_id, kind, window.end)
                .since(window.start)
                .paged(page)
        };

        let analytics = Analytics {
            income: self.fetch_kind(&query(RecordKind::Income), &converter, currency)?,
            expense: self.fetch_kind(&query(RecordKind::Expense), &converter, currency)?,
            wealth_fund: self.fetch_kind(&query(RecordKind::WealthFund), &converter, currency)?,
        };
        debug!(
            income = analytics.income.len(),
            expense = analytics.expense.len(),
            wealth_fund = analytics.wealth_fund.len(),
            "Fetched analytics"
        );
        Ok(analytics)
    }

    /// All five record kinds needed by the metrics, with amounts in `currency`.
    #[instrument(skip(self))]
    pub async fn fetch_records(
        &self,
        user_id: &str,
        currency: &str,
        window: TimeWindow,
    ) -> Result<RecordSet> {
        let converter = self.rates.converter().await;
        let mut set = RecordSet::empty(window, currency);

        for kind in RecordKind::ALL {
            let mut query = RecordQuery::new(user_id, kind, window.end);
            if !kind.is_stock() {
                query = query.since(window.start);
            }
            *set.records_mut(kind) = self.fetch_kind(&query, &converter, currency)?;
        }
        Ok(set)
    }
}
