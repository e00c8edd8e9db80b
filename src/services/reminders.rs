//! Read-only views derived from the ledger: due-date reminders, profit
//! aggregation and name lookups.

use bigdecimal::BigDecimal;
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{LoanId, LoanRecord};

/// Horizon of the reminder shown to customers.
pub const CUSTOMER_REMINDER_DAYS: i64 = 5;
/// Horizon of the dashboard's upcoming list.
pub const DASHBOARD_HORIZON_DAYS: i64 = 7;
/// Loans due within this many days are critical.
pub const CRITICAL_DAYS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Critical,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitSummary {
    pub week: BigDecimal,
    pub month: BigDecimal,
    pub year: BigDecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyProfit {
    pub month: YearMonth,
    pub profit: BigDecimal,
}

/// A loan paired with its position in the table.
pub type IndexedLoan<'a> = (LoanId, &'a LoanRecord);

fn indexed(table: &[LoanRecord]) -> impl Iterator<Item = IndexedLoan<'_>> {
    table.iter().enumerate().map(|(i, loan)| (LoanId(i), loan))
}

pub fn days_left(loan: &LoanRecord, as_of: NaiveDate) -> i64 {
    (loan.due_date - as_of).num_days()
}

/// Active loans due between `as_of` and `as_of + horizon_days`, inclusive,
/// in table order.
pub fn due_within(table: &[LoanRecord], horizon_days: i64, as_of: NaiveDate) -> Vec<IndexedLoan<'_>> {
    let horizon = as_of + Duration::days(horizon_days);
    indexed(table)
        .filter(|(_, loan)| loan.is_active() && loan.due_date >= as_of && loan.due_date <= horizon)
        .collect()
}

/// Active loans whose due date has passed.
pub fn overdue(table: &[LoanRecord], as_of: NaiveDate) -> Vec<IndexedLoan<'_>> {
    indexed(table)
        .filter(|(_, loan)| loan.is_active() && loan.due_date < as_of)
        .collect()
}

pub fn urgency_of(loan: &LoanRecord, as_of: NaiveDate) -> Urgency {
    if days_left(loan, as_of) <= CRITICAL_DAYS {
        Urgency::Critical
    } else {
        Urgency::Warning
    }
}

fn cleared_profit(table: &[LoanRecord]) -> impl Iterator<Item = (NaiveDate, &BigDecimal)> {
    table.iter().filter(|loan| loan.is_cleared()).filter_map(|loan| {
        loan.cleared_date.map(|cleared| (cleared, &loan.profit))
    })
}

fn sum_since(table: &[LoanRecord], since: NaiveDate) -> BigDecimal {
    cleared_profit(table)
        .filter(|(cleared, _)| *cleared >= since)
        .fold(BigDecimal::from(0), |acc, (_, profit)| acc + profit.clone())
}

/// Profit of loans cleared within the last week, month and year of `as_of`.
/// Cleared loans without a cleared date are left out.
pub fn profit_summary(table: &[LoanRecord], as_of: NaiveDate) -> ProfitSummary {
    let week_start = as_of - Duration::weeks(1);
    let month_start = as_of
        .checked_sub_months(Months::new(1))
        .unwrap_or(NaiveDate::MIN);
    let year_start = as_of
        .checked_sub_months(Months::new(12))
        .unwrap_or(NaiveDate::MIN);

    ProfitSummary {
        week: sum_since(table, week_start),
        month: sum_since(table, month_start),
        year: sum_since(table, year_start),
    }
}

/// Cleared profit per calendar month, oldest first.
pub fn monthly_profit_trend(table: &[LoanRecord]) -> Vec<MonthlyProfit> {
    let mut months: BTreeMap<YearMonth, BigDecimal> = BTreeMap::new();
    for (cleared, profit) in cleared_profit(table) {
        let key = YearMonth {
            year: cleared.year(),
            month: cleared.month(),
        };
        let total = months.entry(key).or_insert_with(|| BigDecimal::from(0));
        *total = total.clone() + profit.clone();
    }

    months
        .into_iter()
        .map(|(month, profit)| MonthlyProfit { month, profit })
        .collect()
}

/// Case-insensitive substring match on the customer name. An empty query
/// matches everything.
pub fn search_by_name<'a>(table: &'a [LoanRecord], query: &str) -> Vec<IndexedLoan<'a>> {
    let needle = query.to_lowercase();
    indexed(table)
        .filter(|(_, loan)| needle.is_empty() || loan.customer_name.to_lowercase().contains(&needle))
        .collect()
}

/// Every loan taken under exactly this name.
pub fn customer_history<'a>(table: &'a [LoanRecord], customer_name: &str) -> Vec<IndexedLoan<'a>> {
    indexed(table)
        .filter(|(_, loan)| loan.customer_name == customer_name)
        .collect()
}

/// Loans visible to a customer account.
pub fn loans_for_customer<'a>(table: &'a [LoanRecord], username: &str) -> Vec<IndexedLoan<'a>> {
    indexed(table).filter(|(_, loan)| loan.belongs_to(username)).collect()
}

/// Names with at least one active loan, in first-seen order.
pub fn active_customers(table: &[LoanRecord]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for loan in table.iter().filter(|loan| loan.is_active()) {
        if !names.contains(&loan.customer_name) {
            names.push(loan.customer_name.clone());
        }
    }
    names
}
