use bigdecimal::BigDecimal;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::{LoanStore, LoanTable, StorageError};
use crate::domain::{LoanDraft, LoanId, LoanRecord, Session};
use crate::drive::SyncCollaborator;
use crate::error::AppError;
use crate::services::ledger::{self, EditClearedLoanPolicy};
use crate::services::reminders::{
    self, IndexedLoan, MonthlyProfit, ProfitSummary, Urgency, CUSTOMER_REMINDER_DAYS,
    DASHBOARD_HORIZON_DAYS,
};

/// A loan together with the id callers use to address it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanEntry {
    pub id: LoanId,
    #[serde(flatten)]
    pub loan: LoanRecord,
}

impl From<IndexedLoan<'_>> for LoanEntry {
    fn from((id, loan): IndexedLoan<'_>) -> Self {
        LoanEntry {
            id,
            loan: loan.clone(),
        }
    }
}

fn entries(loans: Vec<IndexedLoan<'_>>) -> Vec<LoanEntry> {
    loans.into_iter().map(LoanEntry::from).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Reminder {
    #[serde(flatten)]
    pub entry: LoanEntry,
    pub days_left: i64,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Admin {
        as_of: NaiveDate,
        due_soon: Vec<LoanEntry>,
        overdue: Vec<LoanEntry>,
        active_customers: Vec<String>,
        profit: ProfitSummary,
    },
    Customer {
        as_of: NaiveDate,
        loans: Vec<LoanEntry>,
        due_soon: Vec<Reminder>,
        overdue: Vec<Reminder>,
        /// Something is overdue or due within the reminder horizon.
        reminder: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfitReport {
    pub as_of: NaiveDate,
    pub summary: ProfitSummary,
    pub monthly: Vec<MonthlyProfit>,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

fn reminder_for((id, loan): IndexedLoan<'_>, as_of: NaiveDate) -> Reminder {
    Reminder {
        days_left: reminders::days_left(loan, as_of),
        urgency: reminders::urgency_of(loan, as_of),
        entry: LoanEntry::from((id, loan)),
    }
}

/// Runs one ledger intent per call: load the table, apply the operation,
/// and write the table back if it changed.
///
/// Intents are serialized so a load and its save never interleave with
/// another intent's. While `<table>.pending-upload` exists the local table
/// holds writes the remote copy has not seen; downloads are skipped and the
/// upload is retried instead.
pub struct LoanService {
    store: LoanStore,
    sync: Arc<dyn SyncCollaborator>,
    policy: EditClearedLoanPolicy,
    clock: fn() -> NaiveDate,
    lock: Mutex<()>,
}

impl LoanService {
    pub fn new(
        store: LoanStore,
        sync: Arc<dyn SyncCollaborator>,
        policy: EditClearedLoanPolicy,
    ) -> Self {
        Self {
            store,
            sync,
            policy,
            clock: local_today,
            lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    pub fn policy(&self) -> EditClearedLoanPolicy {
        self.policy
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    fn pending_marker(&self) -> PathBuf {
        let mut name = self.store.path().as_os_str().to_owned();
        name.push(".pending-upload");
        PathBuf::from(name)
    }

    async fn upload_pending(&self) -> bool {
        tokio::fs::metadata(self.pending_marker()).await.is_ok()
    }

    async fn mark_pending(&self) -> Result<(), StorageError> {
        let marker = self.pending_marker();
        tokio::fs::write(&marker, b"")
            .await
            .map_err(|source| StorageError::Io { path: marker, source })
    }

    async fn clear_pending(&self) -> Result<(), StorageError> {
        let marker = self.pending_marker();
        match tokio::fs::remove_file(&marker).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path: marker, source }),
        }
    }

    async fn load(&self) -> Result<LoanTable, AppError> {
        let path = self.store.path();

        if self.upload_pending().await {
            match self.sync.upload(path).await {
                Ok(()) => {
                    self.clear_pending().await?;
                    tracing::info!(path = %path.display(), "Uploaded pending local changes");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Upload still failing, using local copy");
                }
            }
        } else if let Err(e) = self.sync.download(path).await {
            // A failed download falls back to whatever is on disk.
            tracing::warn!(error = %e, "Cloud download failed, using local copy");
        }

        let mut table = self.store.load().await?;
        ledger::recompute_profit(&mut table.records);
        Ok(table)
    }

    async fn save(&self, table: &mut LoanTable) -> Result<(), AppError> {
        self.mark_pending().await?;
        self.store.save(table).await?;
        self.sync
            .upload(self.store.path())
            .await
            .map_err(StorageError::from)?;
        self.clear_pending().await?;
        Ok(())
    }

    fn parse_id(raw_id: &str) -> Result<LoanId, AppError> {
        LoanId::parse(raw_id).ok_or_else(|| AppError::loan_not_found(raw_id))
    }

    /// Admins see every loan, optionally filtered by name; customers see
    /// only their own.
    pub async fn list_loans(
        &self,
        session: &Session,
        search: Option<&str>,
    ) -> Result<Vec<LoanEntry>, AppError> {
        let _guard = self.lock.lock().await;
        let table = self.load().await?;

        let loans = if session.is_admin() {
            reminders::search_by_name(&table.records, search.unwrap_or(""))
        } else {
            reminders::loans_for_customer(&table.records, &session.username)
        };

        Ok(entries(loans))
    }

    pub async fn get_loan(&self, session: &Session, raw_id: &str) -> Result<LoanEntry, AppError> {
        let id = Self::parse_id(raw_id)?;
        let _guard = self.lock.lock().await;
        let table = self.load().await?;
        let loan = ledger::find_loan(&table.records, id)?;

        if !session.is_admin() && !loan.belongs_to(&session.username) {
            return Err(AppError::Forbidden(
                "customers may only view their own loans".to_string(),
            ));
        }

        Ok(LoanEntry::from((id, loan)))
    }

    pub async fn add_loan(&self, session: &Session, draft: LoanDraft) -> Result<LoanEntry, AppError> {
        session.require_admin("add loans")?;

        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let id = ledger::add_loan(&mut table.records, draft)?;
        self.save(&mut table).await?;

        let entry = LoanEntry::from((id, &table.records[id.0]));
        tracing::info!(
            loan_id = %id,
            customer = %entry.loan.customer_name,
            amount = %entry.loan.loan_amount,
            "Loan added"
        );
        Ok(entry)
    }

    pub async fn record_payment(
        &self,
        session: &Session,
        raw_id: &str,
        amount: &BigDecimal,
    ) -> Result<LoanEntry, AppError> {
        session.require_admin("record payments")?;
        let id = Self::parse_id(raw_id)?;
        let today = self.today();

        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let entry = LoanEntry::from((
            id,
            ledger::record_payment(&mut table.records, id, amount, today)?,
        ));
        self.save(&mut table).await?;

        tracing::info!(
            loan_id = %id,
            payment = %amount,
            remaining = %entry.loan.remaining_due,
            status = %entry.loan.status,
            "Payment recorded"
        );
        Ok(entry)
    }

    pub async fn edit_loan(
        &self,
        session: &Session,
        raw_id: &str,
        draft: LoanDraft,
    ) -> Result<LoanEntry, AppError> {
        session.require_admin("edit loans")?;
        let id = Self::parse_id(raw_id)?;
        let today = self.today();

        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let entry = LoanEntry::from((
            id,
            ledger::edit_loan(&mut table.records, id, draft, self.policy, today)?,
        ));
        self.save(&mut table).await?;

        tracing::info!(loan_id = %id, "Loan edited");
        Ok(entry)
    }

    /// Loan history of one customer. Customers may only ask for their own.
    pub async fn history(
        &self,
        session: &Session,
        customer_name: &str,
    ) -> Result<Vec<LoanEntry>, AppError> {
        if !session.is_admin() && customer_name.to_lowercase() != session.username.to_lowercase() {
            return Err(AppError::Forbidden(
                "customers may only view their own history".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;
        let table = self.load().await?;
        let loans = if session.is_admin() {
            reminders::customer_history(&table.records, customer_name)
        } else {
            reminders::loans_for_customer(&table.records, &session.username)
        };

        Ok(entries(loans))
    }

    /// Customers with at least one active loan, for payment and edit pickers.
    pub async fn active_customers(&self, session: &Session) -> Result<Vec<String>, AppError> {
        session.require_admin("list customers")?;
        let _guard = self.lock.lock().await;
        let table = self.load().await?;
        Ok(reminders::active_customers(&table.records))
    }

    pub async fn dashboard(&self, session: &Session) -> Result<Dashboard, AppError> {
        let as_of = self.today();
        let _guard = self.lock.lock().await;
        let table = self.load().await?;
        let records = &table.records;

        if session.is_admin() {
            return Ok(Dashboard::Admin {
                as_of,
                due_soon: entries(reminders::due_within(records, DASHBOARD_HORIZON_DAYS, as_of)),
                overdue: entries(reminders::overdue(records, as_of)),
                active_customers: reminders::active_customers(records),
                profit: reminders::profit_summary(records, as_of),
            });
        }

        let username = session.username.as_str();
        let own = |loans: Vec<IndexedLoan<'_>>| -> Vec<Reminder> {
            loans
                .into_iter()
                .filter(|(_, loan)| loan.belongs_to(username))
                .map(|indexed| reminder_for(indexed, as_of))
                .collect()
        };

        let due_soon = own(reminders::due_within(records, DASHBOARD_HORIZON_DAYS, as_of));
        let overdue = own(reminders::overdue(records, as_of));
        let reminder = !overdue.is_empty()
            || !own(reminders::due_within(records, CUSTOMER_REMINDER_DAYS, as_of)).is_empty();

        Ok(Dashboard::Customer {
            as_of,
            loans: entries(reminders::loans_for_customer(records, username)),
            due_soon,
            overdue,
            reminder,
        })
    }

    pub async fn profit_report(&self, session: &Session) -> Result<ProfitReport, AppError> {
        session.require_admin("view profit reports")?;
        let as_of = self.today();
        let _guard = self.lock.lock().await;
        let table = self.load().await?;

        Ok(ProfitReport {
            as_of,
            summary: reminders::profit_summary(&table.records, as_of),
            monthly: reminders::monthly_profit_trend(&table.records),
        })
    }
}
