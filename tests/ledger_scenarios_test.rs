use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;

use loan_ledger::db::{LoanStore, UserStore};
use loan_ledger::domain::{LoanDraft, LoanId, LoanStatus, Role, Session};
use loan_ledger::drive::NoSync;
use loan_ledger::error::AppError;
use loan_ledger::services::ledger::recompute_profit;
use loan_ledger::services::{AccessGate, Dashboard, EditClearedLoanPolicy, LoanService};

fn payment_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()
}

fn service(dir: &TempDir, policy: EditClearedLoanPolicy) -> LoanService {
    LoanService::new(
        LoanStore::new(dir.path().join("customer_loans.csv")),
        Arc::new(NoSync),
        policy,
    )
    .with_clock(payment_day)
}

fn admin() -> Session {
    Session::new("admin", Role::Admin)
}

fn dec(raw: &str) -> BigDecimal {
    raw.parse().unwrap()
}

fn draft(amount: &str, rate: &str) -> LoanDraft {
    LoanDraft {
        customer_name: "Asha".to_string(),
        phone: "98450 00000".to_string(),
        loan_amount: dec(amount),
        interest_rate: dec(rate),
        due_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
    }
}

#[tokio::test]
async fn test_new_loan_derives_total_due() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, EditClearedLoanPolicy::Forbid);

    let entry = service.add_loan(&admin(), draft("1000", "10")).await.unwrap();

    assert_eq!(entry.loan.total_due, dec("1100.00"));
    assert_eq!(entry.loan.remaining_due, dec("1100.00"));
    assert_eq!(entry.loan.paid_amount, dec("0"));
    assert_eq!(entry.loan.profit, dec("100"));
    assert_eq!(entry.loan.status, LoanStatus::Active);
    assert_eq!(entry.loan.cleared_date, None);
}

#[tokio::test]
async fn test_fractional_rates_are_exact() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, EditClearedLoanPolicy::Forbid);

    let entry = service
        .add_loan(&admin(), draft("333.33", "7.5"))
        .await
        .unwrap();

    // 333.33 * 1.075
    assert_eq!(entry.loan.total_due, dec("358.32975"));

    let reloaded = service.get_loan(&admin(), "0").await.unwrap();
    assert_eq!(reloaded.loan.total_due, dec("358.32975"));
}

#[tokio::test]
async fn test_full_payment_clears_loan() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, EditClearedLoanPolicy::Forbid);
    service.add_loan(&admin(), draft("1000", "10")).await.unwrap();

    let entry = service
        .record_payment(&admin(), "0", &dec("1100.00"))
        .await
        .unwrap();

    assert_eq!(entry.loan.remaining_due, dec("0"));
    assert_eq!(entry.loan.status, LoanStatus::Cleared);
    assert_eq!(entry.loan.cleared_date, Some(payment_day()));
}

#[tokio::test]
async fn test_partial_payments_accumulate() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, EditClearedLoanPolicy::Forbid);
    service.add_loan(&admin(), draft("1000", "10")).await.unwrap();

    let mut paid = dec("0");
    for payment in ["100", "250.25", "0", "49.75"] {
        let entry = service
            .record_payment(&admin(), "0", &dec(payment))
            .await
            .unwrap();
        paid = paid + dec(payment);

        assert_eq!(entry.loan.paid_amount, paid);
        assert_eq!(entry.loan.remaining_due, entry.loan.total_due.clone() - paid.clone());
        assert_eq!(entry.loan.status, LoanStatus::Active);
    }
}

#[tokio::test]
async fn test_cleared_loans_stay_cleared() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, EditClearedLoanPolicy::Forbid);
    service.add_loan(&admin(), draft("1000", "10")).await.unwrap();

    // Overpayment is accepted and leaves a negative balance.
    let entry = service
        .record_payment(&admin(), "0", &dec("1200"))
        .await
        .unwrap();
    assert_eq!(entry.loan.remaining_due, dec("-100"));

    for payment in ["0", "1", "-5"] {
        let result = service.record_payment(&admin(), "0", &dec(payment)).await;
        assert!(result.is_err());
    }
    assert!(matches!(
        service.record_payment(&admin(), "0", &dec("1")).await,
        Err(AppError::AlreadyCleared(LoanId(0)))
    ));

    let reloaded = service.get_loan(&admin(), "0").await.unwrap();
    assert_eq!(reloaded.loan.status, LoanStatus::Cleared);
    assert_eq!(reloaded.loan.paid_amount, dec("1200"));
}

#[tokio::test]
async fn test_edit_policy_for_cleared_loans() {
    let dir = TempDir::new().unwrap();
    let forbid = service(&dir, EditClearedLoanPolicy::Forbid);
    forbid.add_loan(&admin(), draft("1000", "10")).await.unwrap();
    forbid
        .record_payment(&admin(), "0", &dec("1100"))
        .await
        .unwrap();

    assert!(matches!(
        forbid.edit_loan(&admin(), "0", draft("2000", "10")).await,
        Err(AppError::AlreadyCleared(_))
    ));

    let allow = service(&dir, EditClearedLoanPolicy::AllowNoStatusChange);
    let entry = allow
        .edit_loan(&admin(), "0", draft("2000", "10"))
        .await
        .unwrap();

    assert_eq!(entry.loan.total_due, dec("2200"));
    assert_eq!(entry.loan.remaining_due, dec("1100"));
    assert_eq!(entry.loan.status, LoanStatus::Cleared);
}

#[tokio::test]
async fn test_edit_can_settle_an_active_loan() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, EditClearedLoanPolicy::Forbid);
    service.add_loan(&admin(), draft("1000", "10")).await.unwrap();
    service
        .record_payment(&admin(), "0", &dec("550"))
        .await
        .unwrap();

    let entry = service
        .edit_loan(&admin(), "0", draft("500", "10"))
        .await
        .unwrap();

    assert_eq!(entry.loan.total_due, dec("550"));
    assert_eq!(entry.loan.remaining_due, dec("0"));
    assert_eq!(entry.loan.status, LoanStatus::Cleared);
    assert_eq!(entry.loan.cleared_date, Some(payment_day()));
}

#[tokio::test]
async fn test_invalid_drafts_are_rejected() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, EditClearedLoanPolicy::Forbid);

    let mut blank_name = draft("1000", "10");
    blank_name.customer_name = "   ".to_string();
    assert!(matches!(
        service.add_loan(&admin(), blank_name).await,
        Err(AppError::InvalidInput(_))
    ));
    assert!(matches!(
        service.add_loan(&admin(), draft("-1", "10")).await,
        Err(AppError::InvalidInput(_))
    ));
    assert!(matches!(
        service.add_loan(&admin(), draft("1000", "-10")).await,
        Err(AppError::InvalidInput(_))
    ));

    assert!(service.list_loans(&admin(), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recompute_profit_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, EditClearedLoanPolicy::Forbid);
    service.add_loan(&admin(), draft("1000", "10")).await.unwrap();
    service.add_loan(&admin(), draft("250", "4")).await.unwrap();

    let mut table = LoanStore::new(dir.path().join("customer_loans.csv"))
        .load()
        .await
        .unwrap()
        .records;
    table[1].profit = dec("999");

    recompute_profit(&mut table);
    let once = table.clone();
    recompute_profit(&mut table);

    assert_eq!(table, once);
    assert_eq!(table[1].profit, dec("10"));
}

#[tokio::test]
async fn test_admin_dashboard_lists_due_and_overdue() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, EditClearedLoanPolicy::Forbid);

    let mut overdue = draft("100", "10");
    overdue.due_date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
    let mut far = draft("100", "10");
    far.due_date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

    service.add_loan(&admin(), draft("1000", "10")).await.unwrap();
    service.add_loan(&admin(), overdue).await.unwrap();
    service.add_loan(&admin(), far).await.unwrap();

    match service.dashboard(&admin()).await.unwrap() {
        Dashboard::Admin {
            due_soon,
            overdue,
            active_customers,
            ..
        } => {
            assert_eq!(due_soon.iter().map(|e| e.id).collect::<Vec<_>>(), vec![LoanId(0)]);
            assert_eq!(overdue.iter().map(|e| e.id).collect::<Vec<_>>(), vec![LoanId(1)]);
            assert_eq!(active_customers, vec!["Asha".to_string()]);
        }
        other => panic!("expected admin dashboard, got {:?}", other),
    }
}

#[tokio::test]
async fn test_profit_report_counts_cleared_loans() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, EditClearedLoanPolicy::Forbid);
    service.add_loan(&admin(), draft("1000", "10")).await.unwrap();
    service.add_loan(&admin(), draft("500", "20")).await.unwrap();
    service
        .record_payment(&admin(), "0", &dec("1100"))
        .await
        .unwrap();

    let report = service.profit_report(&admin()).await.unwrap();

    assert_eq!(report.summary.week, dec("100"));
    assert_eq!(report.summary.month, dec("100"));
    assert_eq!(report.summary.year, dec("100"));
    assert_eq!(report.monthly.len(), 1);
    assert_eq!(report.monthly[0].month.to_string(), "2025-01");
}

#[tokio::test]
async fn test_duplicate_registration_leaves_table_unchanged() {
    let dir = TempDir::new().unwrap();
    let users = dir.path().join("users.csv");
    let gate = AccessGate::new(UserStore::new(&users), 4);
    gate.bootstrap("admin123").await.unwrap();

    gate.register("bob", "first").await.unwrap();
    let before = UserStore::new(&users).load().await.unwrap();

    assert!(matches!(
        gate.register("bob", "second").await,
        Err(AppError::UsernameTaken(_))
    ));

    let after = UserStore::new(&users).load().await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after.len(), 2);
}

#[tokio::test]
async fn test_bootstrap_admin_default_password() {
    let dir = TempDir::new().unwrap();
    let gate = AccessGate::new(UserStore::new(dir.path().join("users.csv")), 4);
    gate.bootstrap("admin123").await.unwrap();

    let account = gate.authenticate("admin", "admin123").await.unwrap();
    assert_eq!(account.role, Role::Admin);
    assert_eq!(account.role.to_string(), "admin");
}
