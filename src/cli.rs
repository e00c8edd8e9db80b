use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::domain::{LoanDraft, Session};
use crate::services::LoanEntry;
use crate::AppState;

#[derive(Parser)]
#[command(name = "loan-ledger")]
#[command(about = "Loan ledger with due-date reminders and profit reports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Create a customer account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Loan management commands
    #[command(subcommand)]
    Loans(LoanCommands),

    /// Show the dashboard for the signed-in account
    Dashboard(Credentials),

    /// Profit summary and monthly trend
    Report(Credentials),

    /// Configuration validation
    Config,
}

#[derive(Args, Clone)]
pub struct Credentials {
    #[arg(long, short = 'u')]
    pub username: String,
    #[arg(long, short = 'p')]
    pub password: String,
}

#[derive(Args)]
pub struct LoanFields {
    #[arg(long)]
    pub customer_name: String,
    #[arg(long, default_value = "")]
    pub phone: String,
    /// Principal amount
    #[arg(long)]
    pub amount: BigDecimal,
    /// Interest rate in percent
    #[arg(long)]
    pub rate: BigDecimal,
    /// Due date as YYYY-MM-DD
    #[arg(long)]
    pub due_date: NaiveDate,
}

impl From<LoanFields> for LoanDraft {
    fn from(fields: LoanFields) -> Self {
        LoanDraft {
            customer_name: fields.customer_name,
            phone: fields.phone,
            loan_amount: fields.amount,
            interest_rate: fields.rate,
            due_date: fields.due_date,
        }
    }
}

#[derive(Subcommand)]
pub enum LoanCommands {
    /// List loans, optionally filtered by customer name
    List {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        search: Option<String>,
    },

    /// Add a new loan
    Add {
        #[command(flatten)]
        credentials: Credentials,
        #[command(flatten)]
        fields: LoanFields,
    },

    /// Record a payment against a loan
    Pay {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(value_name = "LOAN_ID")]
        id: String,
        #[arg(long)]
        amount: BigDecimal,
    },

    /// Replace the editable fields of a loan
    Edit {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(value_name = "LOAN_ID")]
        id: String,
        #[command(flatten)]
        fields: LoanFields,
    },

    /// Every loan taken by one customer
    History {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(value_name = "CUSTOMER")]
        customer: String,
    },
}

async fn sign_in(state: &AppState, credentials: &Credentials) -> anyhow::Result<Session> {
    let account = state
        .access
        .authenticate(&credentials.username, &credentials.password)
        .await?;
    Ok(Session::from(&account))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_loans(loans: &[LoanEntry]) {
    if loans.is_empty() {
        println!("No loans found");
        return;
    }

    println!(
        "{:<5} {:<24} {:>12} {:>12} {:>12} {:<12} {:<8}",
        "ID", "Customer", "Amount", "Paid", "Remaining", "Due", "Status"
    );
    println!("{}", "-".repeat(91));

    for entry in loans {
        let loan = &entry.loan;
        println!(
            "{:<5} {:<24} {:>12} {:>12} {:>12} {:<12} {:<8}",
            entry.id.to_string(),
            loan.customer_name,
            loan.loan_amount.to_string(),
            loan.paid_amount.to_string(),
            loan.remaining_due.to_string(),
            loan.due_date.to_string(),
            loan.status.to_string()
        );
    }
}

pub async fn handle_register(state: &AppState, username: &str, password: &str) -> anyhow::Result<()> {
    let account = state.access.register(username, password).await?;
    println!("✓ Registered {} as {}", account.username, account.role);
    Ok(())
}

pub async fn handle_loans(state: &AppState, command: LoanCommands) -> anyhow::Result<()> {
    match command {
        LoanCommands::List {
            credentials,
            search,
        } => {
            let session = sign_in(state, &credentials).await?;
            let loans = state.loans.list_loans(&session, search.as_deref()).await?;
            print_loans(&loans);
        }
        LoanCommands::Add {
            credentials,
            fields,
        } => {
            let session = sign_in(state, &credentials).await?;
            let entry = state.loans.add_loan(&session, fields.into()).await?;
            println!(
                "✓ Loan {} added for {}, total due {}",
                entry.id, entry.loan.customer_name, entry.loan.total_due
            );
        }
        LoanCommands::Pay {
            credentials,
            id,
            amount,
        } => {
            let session = sign_in(state, &credentials).await?;
            let entry = state.loans.record_payment(&session, &id, &amount).await?;
            println!(
                "✓ Payment recorded for loan {}, remaining {} ({})",
                entry.id, entry.loan.remaining_due, entry.loan.status
            );
        }
        LoanCommands::Edit {
            credentials,
            id,
            fields,
        } => {
            let session = sign_in(state, &credentials).await?;
            let entry = state.loans.edit_loan(&session, &id, fields.into()).await?;
            println!("✓ Loan {} updated", entry.id);
        }
        LoanCommands::History {
            credentials,
            customer,
        } => {
            let session = sign_in(state, &credentials).await?;
            let loans = state.loans.history(&session, &customer).await?;
            print_loans(&loans);
        }
    }

    Ok(())
}

pub async fn handle_dashboard(state: &AppState, credentials: &Credentials) -> anyhow::Result<()> {
    let session = sign_in(state, credentials).await?;
    print_json(&state.loans.dashboard(&session).await?)
}

pub async fn handle_report(state: &AppState, credentials: &Credentials) -> anyhow::Result<()> {
    let session = sign_in(state, credentials).await?;
    print_json(&state.loans.profit_report(&session).await?)
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Loans File: {}", config.loans_path().display());
    println!("  Users File: {}", config.users_path().display());
    println!("  Edit Cleared Loans: {}", config.edit_cleared_policy);
    match &config.drive {
        Some(drive) => println!("  Drive Folder: {}", drive.folder_name),
        None => println!("  Drive Folder: (sync disabled)"),
    }

    let report = crate::startup::validate_environment(config).await;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration is invalid");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");
    Ok(())
}
