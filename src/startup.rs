use anyhow::{Context, Result};

use crate::config::Config;
use crate::db::{LoanStore, UserStore};
use crate::drive::DriveClient;

pub struct ValidationReport {
    pub data_dir: bool,
    pub ledger: bool,
    pub accounts: bool,
    /// `None` when sync is not configured.
    pub drive: Option<bool>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.data_dir && self.ledger && self.accounts && self.drive.unwrap_or(true)
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Data directory:  {}", status(self.data_dir));
        println!("Loan ledger:     {}", status(self.ledger));
        println!("User accounts:   {}", status(self.accounts));
        match self.drive {
            Some(ok) => println!("Drive sync:      {}", status(ok)),
            None => println!("Drive sync:      disabled"),
        }

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  - {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "PASS" } else { "FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "FAIL"
    }
}

pub async fn validate_environment(config: &Config) -> ValidationReport {
    let mut report = ValidationReport {
        data_dir: true,
        ledger: true,
        accounts: true,
        drive: None,
        errors: Vec::new(),
    };

    if let Err(e) = validate_data_dir(config).await {
        report.data_dir = false;
        report.errors.push(format!("Data directory: {:#}", e));
    }

    if let Err(e) = LoanStore::new(config.loans_path()).load().await {
        report.ledger = false;
        report.errors.push(format!("Loan ledger: {}", e));
    }

    if let Err(e) = UserStore::new(config.users_path()).load().await {
        report.accounts = false;
        report.errors.push(format!("User accounts: {}", e));
    }

    if let Some(drive) = &config.drive {
        let client = DriveClient::new(drive.clone());
        match client.folder_id().await {
            Ok(_) => report.drive = Some(true),
            Err(e) => {
                report.drive = Some(false);
                report.errors.push(format!("Drive sync: {}", e));
            }
        }
    }

    report
}

async fn validate_data_dir(config: &Config) -> Result<()> {
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("cannot create {}", config.data_dir.display()))?;

    let probe = config.data_dir.join(".write-probe");
    tokio::fs::write(&probe, b"ok")
        .await
        .with_context(|| format!("{} is not writable", config.data_dir.display()))?;
    tokio::fs::remove_file(&probe).await.ok();
    Ok(())
}
