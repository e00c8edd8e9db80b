pub mod loan;
pub mod user;

pub use loan::{LoanDraft, LoanId, LoanRecord, LoanStatus};
pub use user::{Role, Session, UserAccount};
