//! Error types for vault-backup
//!
//! Every public operation returns `Result<_, AppError>`. The binary turns
//! any error into a log line and exit code 1.

use std::path::PathBuf;
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input to an operation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Vault failed validation
    #[error("Vault validation failed: {0}")]
    Vault(#[from] VaultError),

    /// Scan produced no eligible files
    #[error("No files found to backup")]
    NoFiles,

    /// Archive could not be built
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Remote object storage error
    #[error("Storage error: {0}")]
    Storage(#[from] RemoteError),

    /// Filesystem error outside the scan/archive stages
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Reasons a vault is rejected before any archive is built
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("vault path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// No eligible file at all
    #[error("vault appears to be empty or contains no valid files")]
    Empty,

    /// Eligible files exist but none is a markdown note
    #[error("no markdown files found in vault")]
    NoMarkdown,

    #[error("failed to traverse vault: {0}")]
    Scan(String),
}

/// Archive builder failures
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no files to archive")]
    NoFilesToArchive,

    /// Every listed file vanished or was unreadable
    #[error("no files were successfully archived")]
    EmptyArchive,

    #[error("failed to write archive: {0}")]
    Write(String),
}

/// Provider-agnostic classification of remote storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    NotFound,
    AccessDenied,
    /// Bucket already exists and belongs to the caller
    AlreadyExistsOwned,
    /// Bucket name is taken by another account
    AlreadyExistsForeign,
    InvalidCredentials(CredentialFault),
    Other,
}

/// Which half of a credential pair the service rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFault {
    AccessKeyId,
    Secret,
}

/// Error returned by an `ObjectStore` operation
#[derive(Debug, Clone, Error)]
#[error("{operation} failed ({}): {message}", .code.as_deref().unwrap_or("no error code"))]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    /// Operation name, e.g. "HeadBucket"
    pub operation: &'static str,
    /// Provider error code, when the response carried one
    pub code: Option<String>,
    pub message: String,
}

impl RemoteError {
    pub fn new(
        kind: RemoteErrorKind,
        operation: &'static str,
        code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation,
            code,
            message: message.into(),
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
