//! Mirrors the local ledger file to a cloud storage folder.

pub mod client;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;

pub use client::{DriveClient, DriveFile, SyncError};

/// Idempotent mirror of one local file into one remote folder.
#[async_trait]
pub trait SyncCollaborator: Send + Sync {
    /// Creates or replaces the remote copy of `local_path`.
    async fn upload(&self, local_path: &Path) -> Result<(), SyncError>;

    /// Overwrites `local_path` with the remote copy, if there is one.
    async fn download(&self, local_path: &Path) -> Result<(), SyncError>;
}

/// Used when no cloud credentials are configured.
pub struct NoSync;

#[async_trait]
impl SyncCollaborator for NoSync {
    async fn upload(&self, _local_path: &Path) -> Result<(), SyncError> {
        Ok(())
    }

    async fn download(&self, _local_path: &Path) -> Result<(), SyncError> {
        Ok(())
    }
}

pub struct DriveSync {
    client: DriveClient,
}

impl DriveSync {
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }
}

fn remote_name(local_path: &Path) -> Result<String, SyncError> {
    local_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            SyncError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", local_path.display()),
            ))
        })
}

fn download_temp_path(local_path: &Path) -> PathBuf {
    let mut name = local_path.as_os_str().to_owned();
    name.push(".download");
    PathBuf::from(name)
}

#[async_trait]
impl SyncCollaborator for DriveSync {
    async fn upload(&self, local_path: &Path) -> Result<(), SyncError> {
        let name = remote_name(local_path)?;
        let content = tokio::fs::read(local_path).await?;
        let folder_id = self.client.folder_id().await?;

        match self.client.find_file(&folder_id, &name).await? {
            Some(file) => {
                self.client.update_file(&file.id, content).await?;
                tracing::info!(file_id = %file.id, "Updated {} in Drive", name);
            }
            None => {
                let file = self.client.create_file(&folder_id, &name, content).await?;
                tracing::info!(file_id = %file.id, "Uploaded {} to Drive", name);
            }
        }

        Ok(())
    }

    async fn download(&self, local_path: &Path) -> Result<(), SyncError> {
        let name = remote_name(local_path)?;
        let folder_id = self.client.folder_id().await?;

        let Some(file) = self.client.find_file(&folder_id, &name).await? else {
            tracing::debug!("{} not present in Drive folder {}", name, self.client.folder_name());
            return Ok(());
        };

        let content = self.client.download_file(&file.id).await?;

        // Stage next to the target so a failed transfer never truncates the
        // local copy.
        let temp_path = download_temp_path(local_path);
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, local_path).await?;

        tracing::info!(file_id = %file.id, bytes = content.len(), "Downloaded {} from Drive", name);
        Ok(())
    }
}

/// Picks the Drive collaborator when credentials are configured.
pub fn collaborator_from_config(config: &Config) -> Arc<dyn SyncCollaborator> {
    match &config.drive {
        Some(drive) => {
            tracing::info!("Drive sync enabled for folder {}", drive.folder_name);
            Arc::new(DriveSync::new(DriveClient::new(drive.clone())))
        }
        None => {
            tracing::info!("Drive sync disabled; using local files only");
            Arc::new(NoSync)
        }
    }
}
