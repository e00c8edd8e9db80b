use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

use crate::services::ledger::EditClearedLoanPolicy;

pub const DEFAULT_FOLDER_NAME: &str = "AK-FINANCE-APP";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub loans_file: String,
    pub users_file: String,
    pub bootstrap_admin_password: String,
    pub edit_cleared_policy: EditClearedLoanPolicy,
    pub bcrypt_cost: u32,
    pub log_format: LogFormat,
    pub drive: Option<DriveConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Credentials and endpoints for the Drive sync collaborator.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub folder_name: String,
    pub api_url: String,
    pub upload_url: String,
    pub token_url: String,
}

impl DriveConfig {
    /// Points every endpoint at one base URL. Used against mock servers.
    pub fn for_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        DriveConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            refresh_token: "refresh-token".to_string(),
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            api_url: format!("{}/drive/v3", base),
            upload_url: format!("{}/upload/drive/v3", base),
            token_url: format!("{}/token", base),
        }
    }

    fn from_env() -> Option<Self> {
        let client_id = env::var("DRIVE_CLIENT_ID").ok()?;
        let client_secret = env::var("DRIVE_CLIENT_SECRET").ok()?;
        let refresh_token = env::var("DRIVE_REFRESH_TOKEN").ok()?;

        Some(DriveConfig {
            client_id,
            client_secret,
            refresh_token,
            folder_name: env::var("DRIVE_FOLDER_NAME")
                .unwrap_or_else(|_| DEFAULT_FOLDER_NAME.to_string()),
            api_url: env::var("DRIVE_API_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".to_string()),
            upload_url: env::var("DRIVE_UPLOAD_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/upload/drive/v3".to_string()),
            token_url: env::var("DRIVE_TOKEN_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string()),
        })
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
            loans_file: env::var("LOANS_FILE")
                .unwrap_or_else(|_| "customer_loans.csv".to_string()),
            users_file: env::var("USERS_FILE").unwrap_or_else(|_| "users.csv".to_string()),
            bootstrap_admin_password: env::var("BOOTSTRAP_ADMIN_PASSWORD")
                .unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string()),
            edit_cleared_policy: env::var("EDIT_CLEARED_POLICY")
                .unwrap_or_else(|_| "forbid".to_string())
                .parse::<EditClearedLoanPolicy>()
                .map_err(anyhow::Error::msg)?,
            bcrypt_cost: env::var("BCRYPT_COST")
                .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
                .parse()
                .context("BCRYPT_COST must be an integer")?,
            log_format: parse_log_format(&env::var("LOG_FORMAT").unwrap_or_default()),
            drive: DriveConfig::from_env(),
        })
    }

    /// Local-only configuration rooted at `data_dir`.
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            server_port: 3000,
            data_dir: data_dir.into(),
            loans_file: "customer_loans.csv".to_string(),
            users_file: "users.csv".to_string(),
            bootstrap_admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            edit_cleared_policy: EditClearedLoanPolicy::Forbid,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            log_format: LogFormat::Pretty,
            drive: None,
        }
    }

    pub fn loans_path(&self) -> PathBuf {
        self.data_dir.join(&self.loans_file)
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(&self.users_file)
    }
}

fn parse_log_format(raw: &str) -> LogFormat {
    if raw.trim().eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    }
}
