//! Rules for how a loan evolves from creation through payments to
//! settlement. Everything here is a pure function of the in-memory table and
//! the caller-supplied date; persistence happens in [`crate::services::LoanService`].

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use crate::domain::{LoanDraft, LoanId, LoanRecord, LoanStatus};
use crate::error::AppError;
use crate::validation::{
    validate_customer_name, validate_non_negative, validate_phone, ValidationError,
};

/// What `edit_loan` does with a loan that has already been cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditClearedLoanPolicy {
    /// Cleared loans are read-only.
    #[default]
    Forbid,
    /// Fields and derived amounts are rewritten, but the loan stays cleared
    /// and keeps its cleared date even if money is owed again.
    AllowNoStatusChange,
}

impl fmt::Display for EditClearedLoanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditClearedLoanPolicy::Forbid => write!(f, "forbid"),
            EditClearedLoanPolicy::AllowNoStatusChange => write!(f, "allow-no-status-change"),
        }
    }
}

impl FromStr for EditClearedLoanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forbid" => Ok(EditClearedLoanPolicy::Forbid),
            "allow-no-status-change" | "allow" => Ok(EditClearedLoanPolicy::AllowNoStatusChange),
            other => Err(format!(
                "EDIT_CLEARED_POLICY must be 'forbid' or 'allow-no-status-change', got '{}'",
                other
            )),
        }
    }
}

fn validate_draft(draft: LoanDraft) -> Result<LoanDraft, ValidationError> {
    validate_non_negative("loan_amount", &draft.loan_amount)?;
    validate_non_negative("interest_rate", &draft.interest_rate)?;

    Ok(LoanDraft {
        customer_name: validate_customer_name(&draft.customer_name)?,
        phone: validate_phone(&draft.phone)?,
        ..draft
    })
}

/// Builds a fresh, active loan from validated input.
pub fn new_loan(draft: LoanDraft) -> Result<LoanRecord, ValidationError> {
    let draft = validate_draft(draft)?;
    let total_due = LoanRecord::total_due_for(&draft.loan_amount, &draft.interest_rate);

    let mut loan = LoanRecord {
        customer_name: draft.customer_name,
        phone: draft.phone,
        loan_amount: draft.loan_amount,
        interest_rate: draft.interest_rate,
        remaining_due: total_due.clone(),
        total_due,
        paid_amount: BigDecimal::from(0),
        due_date: draft.due_date,
        status: LoanStatus::Active,
        profit: BigDecimal::from(0),
        cleared_date: None,
    };
    loan.profit = loan.profit_of();
    Ok(loan)
}

/// Appends a new loan and returns its id.
pub fn add_loan(table: &mut Vec<LoanRecord>, draft: LoanDraft) -> Result<LoanId, AppError> {
    let loan = new_loan(draft)?;
    table.push(loan);
    Ok(LoanId(table.len() - 1))
}

pub fn find_loan(table: &[LoanRecord], id: LoanId) -> Result<&LoanRecord, AppError> {
    table.get(id.0).ok_or_else(|| AppError::loan_not_found(id))
}

fn find_loan_mut(table: &mut [LoanRecord], id: LoanId) -> Result<&mut LoanRecord, AppError> {
    table.get_mut(id.0).ok_or_else(|| AppError::loan_not_found(id))
}

/// Active -> Cleared once nothing is owed. Returns true on the transition.
fn settle_if_paid(loan: &mut LoanRecord, today: NaiveDate) -> bool {
    if loan.is_active() && loan.remaining_due <= BigDecimal::from(0) {
        loan.status = LoanStatus::Cleared;
        loan.cleared_date = Some(today);
        return true;
    }
    false
}

/// Adds `payment` to the loan. Overpayment is accepted and leaves a
/// negative remaining balance.
pub fn record_payment<'a>(
    table: &'a mut [LoanRecord],
    id: LoanId,
    payment: &BigDecimal,
    today: NaiveDate,
) -> Result<&'a LoanRecord, AppError> {
    validate_non_negative("payment_amount", payment)?;

    let loan = find_loan_mut(table, id)?;
    if loan.is_cleared() {
        return Err(AppError::AlreadyCleared(id));
    }

    loan.paid_amount = loan.paid_amount.clone() + payment.clone();
    loan.remaining_due = loan.total_due.clone() - loan.paid_amount.clone();

    if settle_if_paid(loan, today) {
        tracing::info!(loan_id = %id, customer = %loan.customer_name, "Loan settled");
    }

    Ok(&*loan)
}

/// Overwrites the editable fields and re-derives the amounts from the
/// existing paid total. Never moves a loan back to Active.
pub fn edit_loan<'a>(
    table: &'a mut [LoanRecord],
    id: LoanId,
    draft: LoanDraft,
    policy: EditClearedLoanPolicy,
    today: NaiveDate,
) -> Result<&'a LoanRecord, AppError> {
    let draft = validate_draft(draft)?;

    let loan = find_loan_mut(table, id)?;
    if loan.is_cleared() && policy == EditClearedLoanPolicy::Forbid {
        return Err(AppError::AlreadyCleared(id));
    }

    loan.total_due = LoanRecord::total_due_for(&draft.loan_amount, &draft.interest_rate);
    loan.remaining_due = loan.total_due.clone() - loan.paid_amount.clone();
    loan.customer_name = draft.customer_name;
    loan.phone = draft.phone;
    loan.loan_amount = draft.loan_amount;
    loan.interest_rate = draft.interest_rate;
    loan.due_date = draft.due_date;
    loan.profit = loan.profit_of();

    if settle_if_paid(loan, today) {
        tracing::info!(loan_id = %id, customer = %loan.customer_name, "Loan settled by edit");
    }

    Ok(&*loan)
}

/// profit = total_due - loan_amount for every row.
pub fn recompute_profit(table: &mut [LoanRecord]) {
    for loan in table.iter_mut() {
        loan.profit = loan.profit_of();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(raw: &str) -> BigDecimal {
        raw.parse().unwrap()
    }

    fn draft(amount: &str, rate: &str) -> LoanDraft {
        LoanDraft {
            customer_name: "Asha".to_string(),
            phone: "555-0100".to_string(),
            loan_amount: dec(amount),
            interest_rate: dec(rate),
            due_date: date(2025, 1, 10),
        }
    }

    fn today() -> NaiveDate {
        date(2025, 1, 5)
    }

    #[test]
    fn new_loan_scenario() {
        let mut table = Vec::new();
        let id = add_loan(&mut table, draft("1000", "10")).unwrap();
        let loan = find_loan(&table, id).unwrap();

        assert_eq!(id, LoanId(0));
        assert_eq!(loan.total_due, dec("1100.00"));
        assert_eq!(loan.remaining_due, dec("1100.00"));
        assert_eq!(loan.paid_amount, dec("0"));
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.cleared_date, None);
    }

    #[test]
    fn total_due_is_exact_for_fractional_rates() {
        for (amount, rate, expected) in [
            ("0", "10", "0"),
            ("1000", "0", "1000"),
            ("333.33", "7.5", "358.329750"),
            ("0.10", "12.5", "0.1125"),
        ] {
            let loan = new_loan(draft(amount, rate)).unwrap();
            assert_eq!(loan.total_due, dec(expected), "{} @ {}%", amount, rate);
            assert_eq!(loan.remaining_due, loan.total_due);
        }
    }

    #[test]
    fn rejects_negative_amount_or_rate() {
        let mut table = Vec::new();
        assert!(matches!(
            add_loan(&mut table, draft("-1", "10")),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            add_loan(&mut table, draft("100", "-0.5")),
            Err(AppError::InvalidInput(_))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn payments_accumulate() {
        let mut table = vec![new_loan(draft("1000", "10")).unwrap()];
        let mut total_paid = dec("0");

        for payment in ["100", "250.50", "0", "49.50"] {
            total_paid = total_paid + dec(payment);
            let loan = record_payment(&mut table, LoanId(0), &dec(payment), today()).unwrap();
            assert_eq!(loan.paid_amount, total_paid);
            assert_eq!(loan.remaining_due, loan.total_due.clone() - loan.paid_amount.clone());
            assert_eq!(loan.status, LoanStatus::Active);
        }
    }

    #[test]
    fn full_payment_settles_loan() {
        let mut table = vec![new_loan(draft("1000", "10")).unwrap()];

        let loan = record_payment(&mut table, LoanId(0), &dec("1100.00"), today()).unwrap();

        assert_eq!(loan.remaining_due, dec("0.00"));
        assert_eq!(loan.status, LoanStatus::Cleared);
        assert_eq!(loan.cleared_date, Some(today()));
    }

    #[test]
    fn overpayment_is_accepted() {
        let mut table = vec![new_loan(draft("1000", "10")).unwrap()];

        let loan = record_payment(&mut table, LoanId(0), &dec("1200"), today()).unwrap();

        assert_eq!(loan.remaining_due, dec("-100"));
        assert_eq!(loan.status, LoanStatus::Cleared);
    }

    #[test]
    fn cleared_loan_rejects_further_payments() {
        let mut table = vec![new_loan(draft("1000", "10")).unwrap()];
        record_payment(&mut table, LoanId(0), &dec("1100"), today()).unwrap();

        for payment in ["0", "5", "1000"] {
            let later = date(2025, 2, 1);
            assert!(matches!(
                record_payment(&mut table, LoanId(0), &dec(payment), later),
                Err(AppError::AlreadyCleared(LoanId(0)))
            ));
        }

        let loan = &table[0];
        assert_eq!(loan.status, LoanStatus::Cleared);
        assert_eq!(loan.cleared_date, Some(today()));
        assert_eq!(loan.paid_amount, dec("1100"));
    }

    #[test]
    fn negative_payment_is_invalid() {
        let mut table = vec![new_loan(draft("1000", "10")).unwrap()];
        assert!(matches!(
            record_payment(&mut table, LoanId(0), &dec("-5"), today()),
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(table[0].paid_amount, dec("0"));
    }

    #[test]
    fn unknown_loan_is_not_found() {
        let mut table = vec![new_loan(draft("1000", "10")).unwrap()];
        assert!(matches!(
            record_payment(&mut table, LoanId(5), &dec("5"), today()),
            Err(AppError::LoanNotFound(_))
        ));
    }

    #[test]
    fn edit_recomputes_from_existing_payments() {
        let mut table = vec![new_loan(draft("1000", "10")).unwrap()];
        record_payment(&mut table, LoanId(0), &dec("300"), today()).unwrap();

        let mut changes = draft("2000", "5");
        changes.customer_name = "Asha K".to_string();
        changes.due_date = date(2025, 3, 1);
        let loan = edit_loan(
            &mut table,
            LoanId(0),
            changes,
            EditClearedLoanPolicy::Forbid,
            today(),
        )
        .unwrap();

        assert_eq!(loan.customer_name, "Asha K");
        assert_eq!(loan.total_due, dec("2100"));
        assert_eq!(loan.paid_amount, dec("300"));
        assert_eq!(loan.remaining_due, dec("1800"));
        assert_eq!(loan.profit, dec("100"));
        assert_eq!(loan.due_date, date(2025, 3, 1));
        assert_eq!(loan.status, LoanStatus::Active);
    }

    #[test]
    fn edit_below_paid_amount_settles() {
        let mut table = vec![new_loan(draft("1000", "10")).unwrap()];
        record_payment(&mut table, LoanId(0), &dec("600"), today()).unwrap();

        let loan = edit_loan(
            &mut table,
            LoanId(0),
            draft("500", "0"),
            EditClearedLoanPolicy::Forbid,
            today(),
        )
        .unwrap();

        assert_eq!(loan.remaining_due, dec("-100"));
        assert_eq!(loan.status, LoanStatus::Cleared);
        assert_eq!(loan.cleared_date, Some(today()));
    }

    #[test]
    fn forbid_policy_rejects_editing_cleared_loans() {
        let mut table = vec![new_loan(draft("1000", "10")).unwrap()];
        record_payment(&mut table, LoanId(0), &dec("1100"), today()).unwrap();

        let result = edit_loan(
            &mut table,
            LoanId(0),
            draft("5000", "10"),
            EditClearedLoanPolicy::Forbid,
            today(),
        );

        assert!(matches!(result, Err(AppError::AlreadyCleared(_))));
        assert_eq!(table[0].loan_amount, dec("1000"));
    }

    #[test]
    fn allow_policy_edits_without_reopening() {
        let mut table = vec![new_loan(draft("1000", "10")).unwrap()];
        record_payment(&mut table, LoanId(0), &dec("1100"), today()).unwrap();

        let loan = edit_loan(
            &mut table,
            LoanId(0),
            draft("5000", "10"),
            EditClearedLoanPolicy::AllowNoStatusChange,
            date(2025, 6, 1),
        )
        .unwrap();

        assert_eq!(loan.remaining_due, dec("4400"));
        assert_eq!(loan.status, LoanStatus::Cleared);
        assert_eq!(loan.cleared_date, Some(today()));
    }

    #[test]
    fn recompute_profit_is_idempotent() {
        let mut table = vec![
            new_loan(draft("1000", "10")).unwrap(),
            new_loan(draft("250", "4")).unwrap(),
        ];
        table[0].profit = dec("999");
        table[1].profit = dec("0");

        recompute_profit(&mut table);
        let once = table.clone();
        recompute_profit(&mut table);

        assert_eq!(table, once);
        assert_eq!(table[0].profit, dec("100"));
        assert_eq!(table[1].profit, dec("10"));
    }

    #[test]
    fn policy_parses_from_config_text() {
        assert_eq!(
            "forbid".parse::<EditClearedLoanPolicy>().unwrap(),
            EditClearedLoanPolicy::Forbid
        );
        assert_eq!(
            "Allow-No-Status-Change".parse::<EditClearedLoanPolicy>().unwrap(),
            EditClearedLoanPolicy::AllowNoStatusChange
        );
        assert!("sometimes".parse::<EditClearedLoanPolicy>().is_err());
    }
}
