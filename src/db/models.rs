use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::db::StorageError;
use crate::domain::{LoanRecord, LoanStatus, Role, UserAccount};

/// Column order of the loan table, matching the spreadsheet the operator
/// has always kept.
pub const LOAN_HEADERS: [&str; 11] = [
    "Customer Name",
    "Phone",
    "Loan Amount",
    "Interest Rate",
    "Total Due",
    "Paid Amount",
    "Remaining Due",
    "Due Date",
    "Status",
    "Profit",
    "Cleared Date",
];

pub const USER_HEADERS: [&str; 3] = ["username", "password_hash", "role"];

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// CSV row representation - uses String for amounts to avoid Serialize issues with BigDecimal
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanCsvRow {
    #[serde(rename = "Customer Name")]
    pub customer_name: String,
    #[serde(rename = "Phone", default)]
    pub phone: String,
    #[serde(rename = "Loan Amount")]
    pub loan_amount: String,
    #[serde(rename = "Interest Rate")]
    pub interest_rate: String,
    #[serde(rename = "Total Due", default)]
    pub total_due: String,
    #[serde(rename = "Paid Amount", default)]
    pub paid_amount: String,
    #[serde(rename = "Remaining Due", default)]
    pub remaining_due: String,
    #[serde(rename = "Due Date")]
    pub due_date: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Profit", default)]
    pub profit: String,
    #[serde(rename = "Cleared Date", default)]
    pub cleared_date: String,
}

impl From<&LoanRecord> for LoanCsvRow {
    fn from(loan: &LoanRecord) -> Self {
        LoanCsvRow {
            customer_name: loan.customer_name.clone(),
            phone: loan.phone.clone(),
            loan_amount: loan.loan_amount.to_string(),
            interest_rate: loan.interest_rate.to_string(),
            total_due: loan.total_due.to_string(),
            paid_amount: loan.paid_amount.to_string(),
            remaining_due: loan.remaining_due.to_string(),
            due_date: loan.due_date.format(DATE_FORMAT).to_string(),
            status: loan.status.to_string(),
            profit: loan.profit.to_string(),
            cleared_date: loan
                .cleared_date
                .map(|date| date.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
        }
    }
}

impl LoanCsvRow {
    /// Converts a stored row into a record. `row` is the 1-based data row
    /// number used in error messages.
    ///
    /// Blank `Paid Amount` and `Profit` cells read as zero, and blank
    /// `Total Due`/`Remaining Due` cells are derived from the other columns.
    /// A `Cleared Date` that does not parse is dropped with a warning.
    pub fn into_record(self, row: usize) -> Result<LoanRecord, StorageError> {
        let loan_amount = required_decimal(row, "Loan Amount", &self.loan_amount)?;
        let interest_rate = required_decimal(row, "Interest Rate", &self.interest_rate)?;
        let paid_amount = optional_decimal(row, "Paid Amount", &self.paid_amount)?
            .unwrap_or_else(|| BigDecimal::from(0));
        let total_due = optional_decimal(row, "Total Due", &self.total_due)?
            .unwrap_or_else(|| LoanRecord::total_due_for(&loan_amount, &interest_rate));
        let remaining_due = optional_decimal(row, "Remaining Due", &self.remaining_due)?
            .unwrap_or_else(|| total_due.clone() - paid_amount.clone());
        let profit = optional_decimal(row, "Profit", &self.profit)?
            .unwrap_or_else(|| BigDecimal::from(0));

        let due_date = parse_date(&self.due_date).ok_or_else(|| StorageError::Malformed {
            row,
            message: format!("Due Date '{}' is not a date", self.due_date),
        })?;

        let status = self
            .status
            .parse::<LoanStatus>()
            .map_err(|message| StorageError::Malformed { row, message })?;

        let cleared_date = if is_blank(&self.cleared_date) {
            None
        } else {
            let parsed = parse_date(&self.cleared_date);
            if parsed.is_none() {
                tracing::warn!(row, value = %self.cleared_date, "Ignoring unparseable Cleared Date");
            }
            parsed
        };

        Ok(LoanRecord {
            customer_name: self.customer_name,
            phone: self.phone,
            loan_amount,
            interest_rate,
            total_due,
            paid_amount,
            remaining_due,
            due_date,
            status,
            profit,
            cleared_date,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserCsvRow {
    pub username: String,
    #[serde(alias = "password")]
    pub password_hash: String,
    pub role: String,
}

impl From<&UserAccount> for UserCsvRow {
    fn from(account: &UserAccount) -> Self {
        UserCsvRow {
            username: account.username.clone(),
            password_hash: account.password_hash.clone(),
            role: account.role.to_string(),
        }
    }
}

impl UserCsvRow {
    pub fn into_account(self, row: usize) -> Result<UserAccount, StorageError> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|message| StorageError::Malformed { row, message })?;

        Ok(UserAccount {
            username: self.username,
            password_hash: self.password_hash,
            role,
        })
    }
}

// Spreadsheet exports write missing values as blanks or "nan".
fn is_blank(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("nat")
}

fn optional_decimal(
    row: usize,
    column: &str,
    raw: &str,
) -> Result<Option<BigDecimal>, StorageError> {
    if is_blank(raw) {
        return Ok(None);
    }

    BigDecimal::from_str(raw.trim())
        .map(Some)
        .map_err(|_| StorageError::Malformed {
            row,
            message: format!("{} '{}' is not a number", column, raw),
        })
}

fn required_decimal(row: usize, column: &str, raw: &str) -> Result<BigDecimal, StorageError> {
    optional_decimal(row, column, raw)?.ok_or_else(|| StorageError::Malformed {
        row,
        message: format!("{} is empty", column),
    })
}

/// Accepts plain dates and the midnight timestamps spreadsheet tools write.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some(date);
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|datetime| datetime.date())
}
