//! Whole-file tabular storage for the ledger and the account table.
//!
//! Every interaction loads the full table, mutates it in memory and writes
//! it back whole. The loan table carries a revision (digest of the bytes it
//! was loaded from) so a save that would clobber someone else's write is
//! rejected instead of silently overwriting it.

use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::domain::{LoanRecord, UserAccount};
use crate::drive::SyncError;

pub mod models;

use models::{LoanCsvRow, UserCsvRow, LOAN_HEADERS, USER_HEADERS};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed row {row}: {message}")]
    Malformed { row: usize, message: String },

    #[error("{path} changed since it was loaded")]
    Conflict { path: PathBuf },

    #[error("Cloud sync failed: {0}")]
    Sync(#[from] SyncError),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// In-memory copy of the loan table plus the revision it was read at.
#[derive(Debug, Clone)]
pub struct LoanTable {
    pub records: Vec<LoanRecord>,
    revision: Option<String>,
}

impl LoanTable {
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct LoanStore {
    path: PathBuf,
}

impl LoanStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole table. A missing file is an empty ledger.
    pub async fn load(&self) -> Result<LoanTable, StorageError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            tracing::debug!(path = %self.path.display(), "Loan table not found, starting empty");
            return Ok(LoanTable {
                records: Vec::new(),
                revision: None,
            });
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(bytes.as_slice());

        let mut records = Vec::new();
        for (index, row) in reader.deserialize::<LoanCsvRow>().enumerate() {
            records.push(row?.into_record(index + 1)?);
        }

        tracing::debug!(path = %self.path.display(), rows = records.len(), "Loaded loan table");

        Ok(LoanTable {
            records,
            revision: Some(digest(&bytes)),
        })
    }

    /// Writes the whole table back, failing with `Conflict` if the file
    /// changed after `table` was loaded. On success `table` carries the new
    /// revision.
    pub async fn save(&self, table: &mut LoanTable) -> Result<(), StorageError> {
        let current = read_optional(&self.path).await?.map(|bytes| digest(&bytes));
        if current != table.revision {
            tracing::warn!(path = %self.path.display(), "Loan table was modified concurrently");
            return Err(StorageError::Conflict {
                path: self.path.clone(),
            });
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(vec![]);
        writer.write_record(LOAN_HEADERS)?;
        for record in &table.records {
            writer.serialize(LoanCsvRow::from(record))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| io_error(&self.path)(e.into_error()))?;

        write_atomic(&self.path, &bytes).await?;
        table.revision = Some(digest(&bytes));

        tracing::debug!(path = %self.path.display(), rows = table.records.len(), "Saved loan table");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    pub async fn load(&self) -> Result<Vec<UserAccount>, StorageError> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(Vec::new());
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes.as_slice());

        let mut accounts = Vec::new();
        for (index, row) in reader.deserialize::<UserCsvRow>().enumerate() {
            accounts.push(row?.into_account(index + 1)?);
        }

        Ok(accounts)
    }

    pub async fn save(&self, accounts: &[UserAccount]) -> Result<(), StorageError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(vec![]);
        writer.write_record(USER_HEADERS)?;
        for account in accounts {
            writer.serialize(UserCsvRow::from(account))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| io_error(&self.path)(e.into_error()))?;

        write_atomic(&self.path, &bytes).await
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path)(e)),
    }
}

/// Writes to a sibling temp file and renames it over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_error(parent))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, bytes).await.map_err(io_error(&temp_path))?;
    fs::rename(&temp_path, path).await.map_err(io_error(path))?;
    Ok(())
}
