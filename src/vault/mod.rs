//! Notes vault: eligibility rules and traversal

pub mod filter;
pub mod scanner;

pub use filter::{RESERVED_CONFIG_DIR, is_backup_target, is_markdown};
pub use scanner::{FileRecord, scan, total_size, validate};

use std::path::{Path, PathBuf};

use crate::error::VaultError;

/// An existing vault directory, checked once at construction
#[derive(Debug, Clone)]
pub struct BackupTarget {
    root: PathBuf,
}

impl BackupTarget {
    /// Resolve `path` into a backup target
    ///
    /// # Errors
    /// `VaultError::NotFound` / `VaultError::NotADirectory`
    pub fn new(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let trimmed = path.as_ref().to_string_lossy().trim().to_string();
        let root = PathBuf::from(trimmed);

        if !root.exists() {
            return Err(VaultError::NotFound(root));
        }
        if !root.is_dir() {
            return Err(VaultError::NotADirectory(root));
        }

        let root = root.canonicalize().unwrap_or(root);
        tracing::info!(vault = %root.display(), "Backup target resolved");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name of the vault, used in upload metadata
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
