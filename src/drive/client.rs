use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::DriveConfig;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Local file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Drive authorization failed: {0}")]
    Unauthorized(String),
    #[error("Invalid response from Drive: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// File or folder entry returned by the Drive `files` endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// HTTP client for the Google Drive v3 REST API
#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    config: DriveConfig,
    access_token: Arc<Mutex<Option<String>>>,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        DriveClient {
            client,
            config,
            access_token: Arc::new(Mutex::new(None)),
        }
    }

    pub fn folder_name(&self) -> &str {
        &self.config.folder_name
    }

    /// Exchanges the configured refresh token for an access token. The
    /// token is cached until Drive rejects it.
    async fn token(&self) -> Result<String, SyncError> {
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Unauthorized(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token = response.json::<TokenResponse>().await?;
        tracing::debug!("Obtained Drive access token");
        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn check(&self, response: Response) -> Result<Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.access_token.lock().await.take();
            return Err(SyncError::Unauthorized("access token rejected".to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::InvalidResponse(format!("{}: {}", status, body)))
    }

    async fn list(&self, query: &str) -> Result<Vec<DriveFile>, SyncError> {
        let token = self.token().await?;
        let url = format!("{}/files", self.config.api_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("spaces", "drive"),
                ("fields", "files(id,name)"),
            ])
            .send()
            .await?;

        let list = self.check(response).await?.json::<FileList>().await?;
        Ok(list.files)
    }

    pub async fn find_folder(&self, name: &str) -> Result<Option<DriveFile>, SyncError> {
        let query = folder_query(name);
        Ok(self.list(&query).await?.into_iter().next())
    }

    pub async fn create_folder(&self, name: &str) -> Result<DriveFile, SyncError> {
        let token = self.token().await?;
        let url = format!("{}/files", self.config.api_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[("fields", "id,name")])
            .json(&json!({ "name": name, "mimeType": FOLDER_MIME_TYPE }))
            .send()
            .await?;

        let folder = self.check(response).await?.json::<DriveFile>().await?;
        tracing::info!(folder_id = %folder.id, "Created Drive folder {}", name);
        Ok(folder)
    }

    /// Id of the configured sync folder, created on first use.
    pub async fn folder_id(&self) -> Result<String, SyncError> {
        let name = self.config.folder_name.clone();
        match self.find_folder(&name).await? {
            Some(folder) => Ok(folder.id),
            None => Ok(self.create_folder(&name).await?.id),
        }
    }

    pub async fn find_file(
        &self,
        folder_id: &str,
        name: &str,
    ) -> Result<Option<DriveFile>, SyncError> {
        let query = file_query(folder_id, name);
        Ok(self.list(&query).await?.into_iter().next())
    }

    /// Creates the metadata entry inside the folder, then uploads content.
    pub async fn create_file(
        &self,
        folder_id: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<DriveFile, SyncError> {
        let token = self.token().await?;
        let url = format!("{}/files", self.config.api_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[("fields", "id,name")])
            .json(&json!({ "name": name, "parents": [folder_id] }))
            .send()
            .await?;

        let file = self.check(response).await?.json::<DriveFile>().await?;
        self.update_file(&file.id, content).await?;
        Ok(file)
    }

    pub async fn update_file(&self, file_id: &str, content: Vec<u8>) -> Result<(), SyncError> {
        let token = self.token().await?;
        let url = format!(
            "{}/files/{}",
            self.config.upload_url.trim_end_matches('/'),
            file_id
        );

        let response = self
            .client
            .patch(&url)
            .bearer_auth(token)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(content)
            .send()
            .await?;

        self.check(response).await?;
        Ok(())
    }

    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, SyncError> {
        let token = self.token().await?;
        let url = format!(
            "{}/files/{}",
            self.config.api_url.trim_end_matches('/'),
            file_id
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await?;

        let bytes = self.check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn folder_query(name: &str) -> String {
    format!(
        "mimeType='{}' and name='{}' and trashed=false",
        FOLDER_MIME_TYPE,
        escape_query_value(name)
    )
}

pub fn file_query(folder_id: &str, name: &str) -> String {
    format!(
        "name='{}' and '{}' in parents and trashed=false",
        escape_query_value(name),
        escape_query_value(folder_id)
    )
}
