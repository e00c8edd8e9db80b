//! Loan domain entity.
//! Framework-agnostic representation of one row of the ledger.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of a loan in the ledger. Rows are never deleted, so the
/// position is stable for the lifetime of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(pub usize);

impl LoanId {
    /// Parses a caller-supplied id. Anything that is not a plain
    /// non-negative integer yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<usize>().ok().map(LoanId)
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Active,
    Cleared,
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanStatus::Active => write!(f, "Active"),
            LoanStatus::Cleared => write!(f, "Cleared"),
        }
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(LoanStatus::Active),
            "cleared" => Ok(LoanStatus::Cleared),
            other => Err(format!("unknown loan status '{}'", other)),
        }
    }
}

/// Caller-supplied fields for creating or editing a loan.
#[derive(Debug, Clone, Deserialize)]
pub struct LoanDraft {
    pub customer_name: String,
    #[serde(default)]
    pub phone: String,
    pub loan_amount: BigDecimal,
    pub interest_rate: BigDecimal,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanRecord {
    pub customer_name: String,
    pub phone: String,
    pub loan_amount: BigDecimal,
    pub interest_rate: BigDecimal,
    pub total_due: BigDecimal,
    pub paid_amount: BigDecimal,
    pub remaining_due: BigDecimal,
    pub due_date: NaiveDate,
    pub status: LoanStatus,
    pub profit: BigDecimal,
    pub cleared_date: Option<NaiveDate>,
}

impl LoanRecord {
    /// Flat one-time interest: `amount + amount * rate / 100`.
    pub fn total_due_for(loan_amount: &BigDecimal, interest_rate: &BigDecimal) -> BigDecimal {
        let interest = (loan_amount.clone() * interest_rate.clone()) / BigDecimal::from(100);
        loan_amount.clone() + interest
    }

    pub fn profit_of(&self) -> BigDecimal {
        self.total_due.clone() - self.loan_amount.clone()
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    pub fn is_cleared(&self) -> bool {
        self.status == LoanStatus::Cleared
    }

    /// Case-insensitive equality on the customer name, used to match a
    /// customer account to its loans.
    pub fn belongs_to(&self, username: &str) -> bool {
        self.customer_name.to_lowercase() == username.to_lowercase()
    }
}
