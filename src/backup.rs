//! Backup orchestration
//!
//! One linear run: validate, scan, archive, ensure bucket, upload, clean up.
//! Any failing step ends the run; the temporary archive is removed exactly
//! once as soon as it has been created.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::archive::{self, Archive};
use crate::error::AppError;
use crate::metrics::{
    BACKUP_ARCHIVE_BYTES, BACKUP_DURATION_SECONDS, BACKUP_FILES_ARCHIVED,
    BACKUP_LAST_SUCCESS_TIMESTAMP, BACKUP_RUNS_TOTAL, BACKUP_SOURCE_BYTES,
};
use crate::storage::{ObjectStore, RemoteStorageClient};
use crate::vault::{self, BackupTarget};

/// Timestamp embedded in backup keys
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Timestamp stored in object metadata
pub const METADATA_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Every run archives the whole vault
pub const BACKUP_TYPE: &str = "full";

/// Object metadata attached to an uploaded archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupMetadata {
    pub backup_date: String,
    /// Vault directory name
    pub vault_name: String,
    pub file_count: usize,
    /// Uncompressed bytes
    pub total_size: u64,
}

impl BackupMetadata {
    pub fn new(vault: &BackupTarget, files: &[PathBuf], now: DateTime<Local>) -> Self {
        let total_size = vault::total_size(files);
        let metadata = Self {
            backup_date: now.format(METADATA_DATE_FORMAT).to_string(),
            vault_name: vault.name(),
            file_count: files.len(),
            total_size,
        };
        tracing::info!(
            file_count = metadata.file_count,
            total_size = metadata.total_size,
            "Generated backup metadata"
        );
        metadata
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            ("backup_date".to_string(), self.backup_date.clone()),
            ("vault_path".to_string(), self.vault_name.clone()),
            ("file_count".to_string(), self.file_count.to_string()),
            ("total_size".to_string(), self.total_size.to_string()),
            ("backup_type".to_string(), BACKUP_TYPE.to_string()),
        ])
    }
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct BackupReport {
    /// Object key of the uploaded archive
    pub key: String,
    pub file_count: usize,
    pub total_size: u64,
    pub archive_size: u64,
    /// Files that vanished or were unreadable while archiving
    pub skipped: Vec<PathBuf>,
}

/// Runs one backup of a vault into a bucket
pub struct BackupRunner<'a, S> {
    vault: BackupTarget,
    client: &'a RemoteStorageClient<S>,
    require_markdown: bool,
}

impl<'a, S: ObjectStore> BackupRunner<'a, S> {
    pub fn new(vault: BackupTarget, client: &'a RemoteStorageClient<S>) -> Self {
        Self {
            vault,
            client,
            require_markdown: true,
        }
    }

    /// Whether a vault without `.md` notes is rejected (default: yes)
    pub fn require_markdown(mut self, require: bool) -> Self {
        self.require_markdown = require;
        self
    }

    /// Execute the backup
    ///
    /// # Returns
    /// Report including the object key of the upload
    pub async fn execute(&self) -> Result<BackupReport, AppError> {
        tracing::info!(vault = %self.vault.root().display(), "Starting backup execution");

        let timer = BACKUP_DURATION_SECONDS.start_timer();
        let result = self.run().await;
        timer.observe_duration();

        match &result {
            Ok(report) => {
                BACKUP_RUNS_TOTAL.with_label_values(&["success"]).inc();
                BACKUP_LAST_SUCCESS_TIMESTAMP.set(Local::now().timestamp());
                tracing::info!(key = %report.key, "Backup completed successfully");
            }
            Err(error) => {
                BACKUP_RUNS_TOTAL
                    .with_label_values(&[failure_stage(error)])
                    .inc();
            }
        }
        result
    }

    async fn run(&self) -> Result<BackupReport, AppError> {
        let root = self.vault.root();

        if let Err(error) = vault::validate(root, self.require_markdown) {
            tracing::error!(%error, "Vault validation failed");
            return Err(error.into());
        }

        let files = vault::scan(root);
        if files.is_empty() {
            tracing::error!("No files found to backup");
            return Err(AppError::NoFiles);
        }

        let archive = match archive::build(&files, root) {
            Ok(archive) => archive,
            Err(error) => {
                tracing::error!(%error, "Failed to create backup archive");
                return Err(error.into());
            }
        };
        BACKUP_FILES_ARCHIVED.set(archive.entry_count() as i64);
        BACKUP_ARCHIVE_BYTES.set(archive.size() as i64);

        let outcome = self.store(&archive, &files).await;

        let archive_size = archive.size();
        let skipped = archive.skipped().to_vec();
        let location = archive.path().to_path_buf();
        match archive.remove() {
            Ok(()) => tracing::info!("Temporary archive file cleaned up"),
            Err(error) => tracing::warn!(
                %error,
                path = %location.display(),
                "Failed to remove temporary archive"
            ),
        }

        let (key, metadata) = outcome?;
        Ok(BackupReport {
            key,
            file_count: metadata.file_count,
            total_size: metadata.total_size,
            archive_size,
            skipped,
        })
    }

    async fn store(
        &self,
        archive: &Archive,
        files: &[PathBuf],
    ) -> Result<(String, BackupMetadata), AppError> {
        if let Err(error) = self.client.ensure_bucket_exists().await {
            tracing::error!("Failed to ensure S3 bucket exists");
            return Err(error);
        }

        let now = Local::now();
        let key = self
            .client
            .generate_backup_key(&now.format(KEY_TIMESTAMP_FORMAT).to_string())?;

        let metadata = BackupMetadata::new(&self.vault, files, now);
        BACKUP_SOURCE_BYTES.set(metadata.total_size as i64);

        if let Err(error) = self
            .client
            .upload_file(archive.path(), &key, Some(metadata.to_map()))
            .await
        {
            tracing::error!("Failed to upload backup to S3");
            return Err(error);
        }

        Ok((key, metadata))
    }
}

/// Metric label for the step that ended a failed run
fn failure_stage(error: &AppError) -> &'static str {
    match error {
        AppError::Vault(_) => "validation_failed",
        AppError::NoFiles => "scan_failed",
        AppError::Archive(_) => "archive_failed",
        AppError::Storage(_) => "storage_failed",
        _ => "failed",
    }
}
