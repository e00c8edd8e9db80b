pub mod access;
pub mod ledger;
pub mod loan_service;
pub mod reminders;

pub use access::AccessGate;
pub use ledger::EditClearedLoanPolicy;
pub use loan_service::{Dashboard, LoanEntry, LoanService, ProfitReport};
