//! Lookup data shown next to the analytics: subscription, connected accounts
//! and category settings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub id: i64,
    pub user_id: String,
    pub bank_id: String,
    pub account_number: String,
    pub account_type: String,
    pub name: String,
    pub currency: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub is_fixed: bool,
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryGroup {
    Income,
    Expense,
    Investment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySettings {
    pub income_categories: Vec<Category>,
    pub expense_categories: Vec<Category>,
    pub investment_categories: Vec<Category>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
    /// Accounts keyed by bank id.
    pub connected_accounts: BTreeMap<String, Vec<ConnectedAccount>>,
    pub category_settings: CategorySettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub subscription: Subscription,
}

/// Everything besides the records that a user's dashboard shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct More {
    pub app: App,
    pub settings: Settings,
}

pub fn group_by_bank(accounts: Vec<ConnectedAccount>) -> BTreeMap<String, Vec<ConnectedAccount>> {
    let mut grouped: BTreeMap<String, Vec<ConnectedAccount>> = BTreeMap::new();
    for account in accounts {
        grouped.entry(account.bank_id.clone()).or_default().push(account);
    }
    grouped
}
