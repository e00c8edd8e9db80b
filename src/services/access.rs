use sha2::{Digest, Sha256};

use crate::db::UserStore;
use crate::domain::{Role, UserAccount};
use crate::error::AppError;
use crate::validation::{validate_required, validate_username};

pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";

/// Username/password check in front of the ledger.
///
/// New passwords are stored as bcrypt hashes. Accounts written by older
/// releases carry an unsalted SHA-256 hex digest; those still
/// verify and are rehashed with bcrypt on the next successful login.
pub struct AccessGate {
    users: UserStore,
    bcrypt_cost: u32,
}

impl AccessGate {
    pub fn new(users: UserStore, bcrypt_cost: u32) -> Self {
        Self { users, bcrypt_cost }
    }

    /// Creates the account table with a single admin if none exists yet.
    /// Returns true when the table was created.
    pub async fn bootstrap(&self, admin_password: &str) -> Result<bool, AppError> {
        if self.users.exists().await {
            return Ok(false);
        }

        let admin = UserAccount {
            username: BOOTSTRAP_ADMIN_USERNAME.to_string(),
            password_hash: hash_password(admin_password, self.bcrypt_cost).await?,
            role: Role::Admin,
        };
        self.users.save(&[admin]).await?;

        tracing::warn!(
            path = %self.users.path().display(),
            "Created bootstrap admin account; rotate its password before real use"
        );
        Ok(true)
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<UserAccount, AppError> {
        validate_username(username)?;
        validate_required("password", password)?;

        let mut accounts = self.users.load().await?;
        if accounts.iter().any(|account| account.username == username) {
            tracing::info!(username, "Registration rejected, username taken");
            return Err(AppError::UsernameTaken(username.to_string()));
        }

        let account = UserAccount {
            username: username.to_string(),
            password_hash: hash_password(password, self.bcrypt_cost).await?,
            role: Role::Customer,
        };
        accounts.push(account.clone());
        self.users.save(&accounts).await?;

        tracing::info!(username, "Registered customer account");
        Ok(account)
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserAccount, AppError> {
        let mut accounts = self.users.load().await?;

        let Some(index) = accounts
            .iter()
            .position(|account| account.username == username)
        else {
            tracing::warn!(username, "Authentication failed, unknown user");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(password, &accounts[index].password_hash).await? {
            tracing::warn!(username, "Authentication failed");
            return Err(AppError::InvalidCredentials);
        }

        if is_legacy_hash(&accounts[index].password_hash) {
            accounts[index].password_hash = hash_password(password, self.bcrypt_cost).await?;
            self.users.save(&accounts).await?;
            tracing::info!(username, "Upgraded legacy password hash");
        }

        Ok(accounts.swap_remove(index))
    }
}

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError::Internal(format!("password task failed: {}", e))
}

/// bcrypt is CPU-bound, so hashing runs on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(join_error)?
        .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))
}

/// Unsalted SHA-256 hex digest, the format of older account tables.
pub fn legacy_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn is_legacy_hash(stored: &str) -> bool {
    stored.len() == 64 && stored.chars().all(|ch| ch.is_ascii_hexdigit())
}

pub async fn verify_password(password: &str, stored: &str) -> Result<bool, AppError> {
    if is_legacy_hash(stored) {
        return Ok(legacy_digest(password).eq_ignore_ascii_case(stored));
    }

    let password = password.to_string();
    let stored = stored.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored).unwrap_or(false))
        .await
        .map_err(join_error)
}
