//! vault-backup - back up a notes vault to encrypted object storage
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Orchestrator (backup)                      │
//! │  validate → scan → archive → ensure bucket → upload         │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//! ┌────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//! │     vault      │  │     archive      │  │     storage      │
//! │  filter, scan  │  │  zip (deflate)   │  │  bucket, upload  │
//! └────────────────┘  └──────────────────┘  └──────────────────┘
//!                                                     │
//!                                           ┌──────────────────┐
//!                                           │   ObjectStore    │
//!                                           │   (AWS S3 SDK)   │
//!                                           └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - `vault`: eligibility rules and directory traversal
//! - `archive`: temporary zip construction
//! - `storage`: credentials, bucket lifecycle, uploads
//! - `backup`: the end-to-end run
//! - `metrics`: run metrics for the Prometheus textfile collector
//! - `config`: Configuration management
//! - `error`: Error types

pub mod archive;
pub mod backup;
pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod vault;

pub use backup::{BackupMetadata, BackupReport, BackupRunner};
pub use error::{AppError, Result};
pub use storage::RemoteStorageClient;
pub use vault::BackupTarget;
