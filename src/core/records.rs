//! Financial records as read from storage.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetaryAmount {
    pub value: f64,
    pub currency: String,
}

impl MonetaryAmount {
    pub fn new(value: f64, currency: &str) -> Self {
        MonetaryAmount {
            value,
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Income,
    Expense,
    WealthFund,
    Loan,
    Investment,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Income,
        RecordKind::Expense,
        RecordKind::WealthFund,
        RecordKind::Loan,
        RecordKind::Investment,
    ];

    /// Balance-like kinds are summed over their whole history up to the window end.
    pub fn is_stock(&self) -> bool {
        matches!(
            self,
            RecordKind::WealthFund | RecordKind::Loan | RecordKind::Investment
        )
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RecordKind::Income => "income",
                RecordKind::Expense => "expense",
                RecordKind::WealthFund => "wealth fund",
                RecordKind::Loan => "loan",
                RecordKind::Investment => "investment",
            }
        )
    }
}

/// Which part of the wealth fund an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liquidity {
    Liquid,
    Illiquid,
}

impl FromStr for Liquidity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "liquid" => Ok(Liquidity::Liquid),
            "illiquid" => Ok(Liquidity::Illiquid),
            _ => Err(anyhow::anyhow!("Invalid liquidity: {}", s)),
        }
    }
}

impl Display for Liquidity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Liquidity::Liquid => write!(f, "liquid"),
            Liquidity::Illiquid => write!(f, "illiquid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub id: i64,
    pub user_id: String,
    pub kind: RecordKind,
    pub amount: MonetaryAmount,
    pub date: NaiveDate,
    pub category: Option<i64>,
    pub planned: bool,
    /// Sender of an income, recipient of an expense, lender or broker.
    pub counterparty: Option<String>,
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<Liquidity>,
    /// Periodic servicing payment of a loan, in the loan's currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<f64>,
}

impl FinancialRecord {
    pub fn new(kind: RecordKind, user_id: &str, amount: MonetaryAmount, date: NaiveDate) -> Self {
        FinancialRecord {
            id: 0,
            user_id: user_id.to_string(),
            kind,
            amount,
            date,
            category: None,
            planned: false,
            counterparty: None,
            account: None,
            liquidity: None,
            payment: None,
        }
    }

    pub fn planned(mut self, planned: bool) -> Self {
        self.planned = planned;
        self
    }

    pub fn with_liquidity(mut self, liquidity: Liquidity) -> Self {
        self.liquidity = Some(liquidity);
        self
    }

    pub fn with_payment(mut self, payment: f64) -> Self {
        self.payment = Some(payment);
        self
    }
}
