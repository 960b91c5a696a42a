//! Remote object storage
//!
//! Handles:
//! - Credential resolution and S3 client construction
//! - Bucket lifecycle (existence probe, creation with encryption at rest)
//! - Archive upload
//!
//! Provider calls go through [`ObjectStore`] so the bucket protocol and the
//! backup pipeline never see SDK types.

mod client;
pub mod credentials;
mod s3;

pub use client::{DEFAULT_REGION, RemoteStorageClient, upload_progress};
pub use s3::{S3ObjectStore, classify};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::RemoteError;

/// Single-object upload request
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectUpload {
    pub bucket: String,
    pub key: String,
    /// Local file streamed as the object body
    pub path: PathBuf,
    /// Provider storage class, e.g. "DEEP_ARCHIVE"
    pub storage_class: String,
    /// Request server-side encryption (AES-256)
    pub encrypted: bool,
    /// Object-level user metadata
    pub metadata: HashMap<String, String>,
}

/// Provider adapter for the handful of bucket/object calls a backup needs
///
/// Implementations translate provider failures into [`RemoteError`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of the buckets visible to the caller
    async fn list_buckets(&self) -> Result<Vec<String>, RemoteError>;

    async fn head_bucket(&self, bucket: &str) -> Result<(), RemoteError>;

    /// Create `bucket`, pinned to `location_constraint` when given
    async fn create_bucket(
        &self,
        bucket: &str,
        location_constraint: Option<String>,
    ) -> Result<(), RemoteError>;

    /// Apply default AES-256 encryption with bucket keys enabled
    async fn put_bucket_encryption(&self, bucket: &str) -> Result<(), RemoteError>;

    async fn put_object(&self, upload: ObjectUpload) -> Result<(), RemoteError>;
}

pub(crate) fn build_http_client() -> aws_sdk_s3::config::SharedHttpClient {
    use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;

    // Plain http is allowed for self-hosted S3-compatible endpoints.
    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    HyperClientBuilder::new().build(https_connector)
}
