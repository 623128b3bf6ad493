//! Financial health indicators over a normalized record set.
//!
//! Every indicator is a plain function of a [`RecordSet`]. Expense and loan
//! payment magnitudes are taken as absolute values, planned records only feed
//! the deltas, and a zero denominator yields `0.0`.

use crate::core::aggregator::RecordSet;
use crate::core::records::{FinancialRecord, Liquidity};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    ExpenditureDelta,
    ExpensePropensity,
    LiquidFundRatio,
    IlliquidFundRatio,
    SavingsToIncomeRatio,
    SavingsDelta,
    InvestmentsToSavingsRatio,
    InvestmentsToFundRatio,
    LoansToAssetsRatio,
    LoansPropensity,
}

impl MetricKind {
    pub const ALL: [MetricKind; 10] = [
        MetricKind::ExpenditureDelta,
        MetricKind::ExpensePropensity,
        MetricKind::LiquidFundRatio,
        MetricKind::IlliquidFundRatio,
        MetricKind::SavingsToIncomeRatio,
        MetricKind::SavingsDelta,
        MetricKind::InvestmentsToSavingsRatio,
        MetricKind::InvestmentsToFundRatio,
        MetricKind::LoansToAssetsRatio,
        MetricKind::LoansPropensity,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            MetricKind::ExpenditureDelta => "expenditure-delta",
            MetricKind::ExpensePropensity => "expense-propensity",
            MetricKind::LiquidFundRatio => "liquid-fund-ratio",
            MetricKind::IlliquidFundRatio => "illiquid-fund-ratio",
            MetricKind::SavingsToIncomeRatio => "savings-to-income",
            MetricKind::SavingsDelta => "savings-delta",
            MetricKind::InvestmentsToSavingsRatio => "investments-to-savings",
            MetricKind::InvestmentsToFundRatio => "investments-to-fund",
            MetricKind::LoansToAssetsRatio => "loans-to-assets",
            MetricKind::LoansPropensity => "loans-propensity",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::ExpenditureDelta => "Expenditure delta",
            MetricKind::ExpensePropensity => "Expense propensity",
            MetricKind::LiquidFundRatio => "Liquid fund ratio",
            MetricKind::IlliquidFundRatio => "Illiquid fund ratio",
            MetricKind::SavingsToIncomeRatio => "Savings to income ratio",
            MetricKind::SavingsDelta => "Savings delta",
            MetricKind::InvestmentsToSavingsRatio => "Investments to savings ratio",
            MetricKind::InvestmentsToFundRatio => "Investments to fund ratio",
            MetricKind::LoansToAssetsRatio => "Loans to assets ratio",
            MetricKind::LoansPropensity => "Loans propensity",
        }
    }
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for MetricKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.to_lowercase().replace('_', "-");
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == needle)
            .ok_or_else(|| anyhow::anyhow!("Unknown metric: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum MetricResult {
    Delta(f64),
    Ratio(f64),
    Propensity(f64),
}

impl MetricResult {
    pub fn value(&self) -> f64 {
        match self {
            MetricResult::Delta(v) | MetricResult::Ratio(v) | MetricResult::Propensity(v) => *v,
        }
    }
}

/// `numerator / denominator`, or `0.0` when the denominator is zero or the
/// quotient is not finite.
pub fn guarded_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() { ratio } else { 0.0 }
}

fn sum<'a>(records: impl Iterator<Item = &'a FinancialRecord>) -> f64 {
    records.map(|r| r.amount.value).sum()
}

fn in_window<'a>(
    set: &'a RecordSet,
    records: &'a [FinancialRecord],
    planned: bool,
) -> impl Iterator<Item = &'a FinancialRecord> {
    records
        .iter()
        .filter(move |r| r.planned == planned && set.window.contains(r.date))
}

fn actual(records: &[FinancialRecord]) -> impl Iterator<Item = &FinancialRecord> {
    records.iter().filter(|r| !r.planned)
}

fn income_total(set: &RecordSet) -> f64 {
    sum(in_window(set, &set.income, false))
}

fn expense_total(set: &RecordSet, planned: bool) -> f64 {
    in_window(set, &set.expense, planned)
        .map(|r| r.amount.value.abs())
        .sum()
}

fn contributions(set: &RecordSet, planned: bool) -> f64 {
    sum(in_window(set, &set.wealth_fund, planned))
}

fn fund_balance(set: &RecordSet, liquidity: Option<Liquidity>) -> f64 {
    sum(actual(&set.wealth_fund).filter(|r| liquidity.is_none() || r.liquidity == liquidity))
}

fn investments_in_window(set: &RecordSet) -> f64 {
    sum(in_window(set, &set.investments, false))
}

pub fn expenditure_delta(set: &RecordSet) -> f64 {
    expense_total(set, true) - expense_total(set, false)
}

pub fn expense_propensity(set: &RecordSet) -> f64 {
    guarded_ratio(expense_total(set, false), income_total(set))
}

pub fn liquid_fund_ratio(set: &RecordSet) -> f64 {
    guarded_ratio(fund_balance(set, Some(Liquidity::Liquid)), fund_balance(set, None))
}

pub fn illiquid_fund_ratio(set: &RecordSet) -> f64 {
    guarded_ratio(fund_balance(set, Some(Liquidity::Illiquid)), fund_balance(set, None))
}

pub fn savings_to_income_ratio(set: &RecordSet) -> f64 {
    guarded_ratio(contributions(set, false), income_total(set))
}

pub fn savings_delta(set: &RecordSet) -> f64 {
    contributions(set, true) - contributions(set, false)
}

pub fn investments_to_savings_ratio(set: &RecordSet) -> f64 {
    guarded_ratio(investments_in_window(set), contributions(set, false))
}

pub fn investments_to_fund_ratio(set: &RecordSet) -> f64 {
    guarded_ratio(investments_in_window(set), fund_balance(set, None))
}

pub fn loans_to_assets_ratio(set: &RecordSet) -> f64 {
    let outstanding = sum(actual(&set.loans));
    let assets = fund_balance(set, None) + sum(actual(&set.investments));
    guarded_ratio(outstanding, assets)
}

pub fn loans_propensity(set: &RecordSet) -> f64 {
    let servicing: f64 = actual(&set.loans)
        .filter_map(|r| r.payment)
        .map(f64::abs)
        .sum();
    guarded_ratio(servicing, income_total(set))
}

pub fn compute(kind: MetricKind, set: &RecordSet) -> MetricResult {
    match kind {
        MetricKind::ExpenditureDelta => MetricResult::Delta(expenditure_delta(set)),
        MetricKind::ExpensePropensity => MetricResult::Propensity(expense_propensity(set)),
        MetricKind::LiquidFundRatio => MetricResult::Ratio(liquid_fund_ratio(set)),
        MetricKind::IlliquidFundRatio => MetricResult::Ratio(illiquid_fund_ratio(set)),
        MetricKind::SavingsToIncomeRatio => MetricResult::Ratio(savings_to_income_ratio(set)),
        MetricKind::SavingsDelta => MetricResult::Delta(savings_delta(set)),
        MetricKind::InvestmentsToSavingsRatio => {
            MetricResult::Ratio(investments_to_savings_ratio(set))
        }
        MetricKind::InvestmentsToFundRatio => MetricResult::Ratio(investments_to_fund_ratio(set)),
        MetricKind::LoansToAssetsRatio => MetricResult::Ratio(loans_to_assets_ratio(set)),
        MetricKind::LoansPropensity => MetricResult::Propensity(loans_propensity(set)),
    }
}
