//! Bucket lifecycle and archive upload on top of an [`ObjectStore`]

use std::collections::HashMap;
use std::path::Path;

use super::credentials::{default_sources, resolve_credentials};
use super::{ObjectStore, ObjectUpload, S3ObjectStore, build_http_client};
use crate::config::{CredentialsConfig, StorageConfig};
use crate::error::{AppError, CredentialFault, RemoteErrorKind};

/// Region where buckets are created without a location constraint
pub const DEFAULT_REGION: &str = "us-east-1";

/// Backup-oriented client for one bucket
///
/// Obtained through [`RemoteStorageClient::initialize`]; there is no
/// half-constructed state.
pub struct RemoteStorageClient<S = S3ObjectStore> {
    store: S,
    bucket: String,
    region: String,
    key_prefix: String,
    storage_class: String,
}

impl RemoteStorageClient<S3ObjectStore> {
    /// Resolve credentials and build the S3 client
    ///
    /// # Errors
    /// Returns error if the client cannot be constructed
    pub async fn initialize(
        storage: &StorageConfig,
        credentials: &CredentialsConfig,
    ) -> Result<Self, AppError> {
        let http_client = build_http_client();
        let sources = default_sources(credentials, &storage.region, http_client.clone());
        let resolved = resolve_credentials(&sources).await;

        let store = S3ObjectStore::connect(storage, resolved, http_client).await?;
        let client = Self::new(store, storage)?;
        tracing::info!(
            bucket = %client.bucket,
            region = %client.region,
            "S3 client initialized"
        );
        Ok(client)
    }
}

impl<S: ObjectStore> RemoteStorageClient<S> {
    /// Wrap an existing store
    ///
    /// # Errors
    /// Returns error if the bucket name or region is empty
    pub fn new(store: S, storage: &StorageConfig) -> Result<Self, AppError> {
        if storage.bucket.trim().is_empty() {
            return Err(AppError::Validation("bucket name must not be empty".to_string()));
        }
        if storage.region.trim().is_empty() {
            return Err(AppError::Validation("region must not be empty".to_string()));
        }

        Ok(Self {
            store,
            bucket: storage.bucket.trim().to_string(),
            region: storage.region.trim().to_string(),
            key_prefix: storage.key_prefix.clone(),
            storage_class: storage.storage_class.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cheap read-only call proving the credentials work
    pub async fn verify_credentials(&self) -> Result<(), AppError> {
        match self.store.list_buckets().await {
            Ok(buckets) => {
                tracing::info!(visible_buckets = buckets.len(), "AWS credentials verified");
                Ok(())
            }
            Err(error) => {
                match error.kind {
                    RemoteErrorKind::AccessDenied => {
                        tracing::error!(%error, "Access denied while verifying AWS credentials")
                    }
                    RemoteErrorKind::InvalidCredentials(CredentialFault::AccessKeyId) => {
                        tracing::error!(%error, "Invalid AWS access key ID")
                    }
                    RemoteErrorKind::InvalidCredentials(CredentialFault::Secret) => {
                        tracing::error!(%error, "Invalid AWS secret access key")
                    }
                    _ => tracing::error!(%error, "Failed to verify AWS credentials"),
                }
                Err(error.into())
            }
        }
    }

    /// Make sure the bucket exists, creating it with encryption if absent
    ///
    /// Never creates anything when the probe succeeds or access is denied.
    pub async fn ensure_bucket_exists(&self) -> Result<(), AppError> {
        let error = match self.store.head_bucket(&self.bucket).await {
            Ok(()) => {
                tracing::info!(bucket = %self.bucket, "S3 bucket exists");
                return Ok(());
            }
            Err(error) => error,
        };

        match error.kind {
            RemoteErrorKind::NotFound => {
                tracing::info!(bucket = %self.bucket, "S3 bucket not found, creating");
                self.create_bucket_with_encryption().await
            }
            RemoteErrorKind::AccessDenied => {
                tracing::error!(bucket = %self.bucket, %error, "Access denied to S3 bucket");
                Err(error.into())
            }
            _ => {
                tracing::error!(bucket = %self.bucket, %error, "Failed to check S3 bucket");
                Err(error.into())
            }
        }
    }

    async fn create_bucket_with_encryption(&self) -> Result<(), AppError> {
        let location = (self.region != DEFAULT_REGION).then(|| self.region.clone());

        match self.store.create_bucket(&self.bucket, location).await {
            Ok(()) => {
                tracing::info!(bucket = %self.bucket, region = %self.region, "S3 bucket created");
            }
            Err(error) if error.kind == RemoteErrorKind::AlreadyExistsOwned => {
                tracing::info!(bucket = %self.bucket, "S3 bucket already exists and is owned by you");
                return Ok(());
            }
            Err(error) if error.kind == RemoteErrorKind::AlreadyExistsForeign => {
                tracing::error!(
                    bucket = %self.bucket,
                    "S3 bucket already exists and is owned by someone else"
                );
                return Err(error.into());
            }
            Err(error) => {
                tracing::error!(bucket = %self.bucket, %error, "Failed to create S3 bucket");
                return Err(error.into());
            }
        }

        if let Err(error) = self.store.put_bucket_encryption(&self.bucket).await {
            tracing::error!(bucket = %self.bucket, %error, "Failed to enable bucket encryption");
            return Err(error.into());
        }

        tracing::info!(bucket = %self.bucket, "Encryption enabled for bucket with SSE-S3");
        Ok(())
    }

    /// Upload `local_path` as `key` to the cold storage class, encrypted
    ///
    /// # Errors
    /// `Validation` if the file does not exist, `Storage` on provider errors
    pub async fn upload_file(
        &self,
        local_path: &Path,
        key: &str,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<(), AppError> {
        if !local_path.exists() {
            tracing::error!(path = %local_path.display(), "Local file not found for upload");
            return Err(AppError::Validation(format!(
                "local file does not exist: {}",
                local_path.display()
            )));
        }

        let upload = ObjectUpload {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            path: local_path.to_path_buf(),
            storage_class: self.storage_class.clone(),
            encrypted: true,
            metadata: metadata.unwrap_or_default(),
        };

        tracing::info!(bucket = %self.bucket, key, "Uploading backup");
        if let Err(error) = self.store.put_object(upload).await {
            tracing::error!(key, %error, "Failed to upload backup");
            return Err(error.into());
        }

        tracing::info!(
            bucket = %self.bucket,
            key,
            storage_class = %self.storage_class,
            "Upload completed"
        );
        Ok(())
    }

    /// `<prefix>-<timestamp>.zip`
    pub fn generate_backup_key(&self, timestamp: &str) -> Result<String, AppError> {
        if timestamp.trim().is_empty() {
            return Err(AppError::Validation("timestamp must not be empty".to_string()));
        }
        Ok(format!("{}-{}.zip", self.key_prefix, timestamp))
    }
}

/// Upload progress in percent, capped at 100
pub fn upload_progress(uploaded: i64, total: i64) -> Result<f64, AppError> {
    if uploaded < 0 {
        return Err(AppError::Validation(
            "uploaded bytes cannot be negative".to_string(),
        ));
    }
    if total < 0 {
        return Err(AppError::Validation("total bytes cannot be negative".to_string()));
    }
    if total == 0 {
        return Ok(0.0);
    }

    let progress = uploaded as f64 / total as f64 * 100.0;
    Ok(progress.min(100.0))
}
