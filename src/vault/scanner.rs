//! Vault traversal
//!
//! Walks the vault with `walkdir`, sorted by file name so a given tree
//! always yields the same order.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::filter::{is_backup_target, is_markdown};
use crate::error::VaultError;

/// Stat snapshot of one file, taken on demand
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Local>,
}

impl FileRecord {
    /// Stat `path`; `None` if it is missing or unreadable
    pub fn from_path(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        let modified = metadata.modified().ok()?;
        Some(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: DateTime::<Local>::from(modified),
        })
    }
}

/// Eligible files under `root`, judged by their path relative to `root`
fn walk_eligible(root: &Path) -> impl Iterator<Item = walkdir::Result<PathBuf>> + '_ {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let path = entry.into_path();
                let relative = path.strip_prefix(root).unwrap_or(&path);
                is_backup_target(relative).then_some(Ok(path))
            }
            Ok(_) => None,
            Err(error) => Some(Err(error)),
        })
}

/// Collect every eligible file under `root`
///
/// Fails closed: any traversal error yields an empty list.
pub fn scan(root: &Path) -> Vec<PathBuf> {
    match walk_eligible(root).collect::<walkdir::Result<Vec<_>>>() {
        Ok(files) => {
            tracing::info!(count = files.len(), "Scanned files for backup");
            files
        }
        Err(error) => {
            tracing::error!(%error, root = %root.display(), "Error during file scanning");
            Vec::new()
        }
    }
}

/// Check that `root` holds something worth backing up
///
/// With `require_markdown`, at least one eligible file must be a `.md` note.
pub fn validate(root: &Path, require_markdown: bool) -> Result<(), VaultError> {
    let mut has_any_files = false;

    for entry in walk_eligible(root) {
        let path = entry.map_err(|e| VaultError::Scan(e.to_string()))?;
        has_any_files = true;
        if !require_markdown || is_markdown(&path) {
            tracing::info!("Vault validation successful");
            return Ok(());
        }
    }

    if !has_any_files {
        tracing::warn!("Vault appears to be empty or contains no valid files");
        return Err(VaultError::Empty);
    }

    tracing::warn!("No markdown files found in vault");
    Err(VaultError::NoMarkdown)
}

/// Total size in bytes of the files that still exist
pub fn total_size(files: &[PathBuf]) -> u64 {
    files
        .iter()
        .filter_map(|path| std::fs::metadata(path).ok())
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn scan_skips_settings_and_hidden_files() {
        let vault = TempDir::new().unwrap();
        let note = write(vault.path(), "note.md", "# hello");
        let image = write(vault.path(), "img.png", "png");
        write(vault.path(), ".obsidian/config.json", "{}");
        write(vault.path(), ".DS_Store", "");
        write(vault.path(), "draft.md.swp", "");

        let mut files = scan(vault.path());
        files.sort();
        let mut expected = vec![note, image];
        expected.sort();
        assert_eq!(files, expected);
    }

    #[test]
    fn scan_descends_into_subdirectories_in_stable_order() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "b.md", "b");
        write(vault.path(), "a/z.md", "z");
        write(vault.path(), "a/y.md", "y");

        let first = scan(vault.path());
        let second = scan(vault.path());
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(first[0], vault.path().join("a/y.md"));
    }

    #[test]
    fn root_path_segments_do_not_affect_eligibility() {
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("work.obsidian-sync");
        let note = write(&root, "note.md", "# note");
        let tagged = write(&root, "notes.obsidian.md", "# tagged");
        write(&root, ".obsidian/app.json", "{}");

        let mut files = scan(&root);
        files.sort();
        let mut expected = vec![note, tagged];
        expected.sort();
        assert_eq!(files, expected);
        assert!(validate(&root, true).is_ok());
    }

    #[test]
    fn vault_nested_in_settings_named_directory_is_scanned() {
        let parent = TempDir::new().unwrap();
        let root = parent.path().join(".obsidian").join("Vault");
        let note = write(&root, "note.md", "# note");

        assert_eq!(scan(&root), vec![note]);
    }

    #[test]
    fn scan_of_missing_root_is_empty() {
        let vault = TempDir::new().unwrap();
        assert!(scan(&vault.path().join("gone")).is_empty());
    }

    #[test]
    fn validate_accepts_vault_with_notes() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "img.png", "png");
        write(vault.path(), "notes/note.md", "# note");
        assert!(validate(vault.path(), true).is_ok());
    }

    #[test]
    fn validate_reports_empty_vault() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), ".obsidian/app.json", "{}");
        assert!(matches!(validate(vault.path(), true), Err(VaultError::Empty)));
    }

    #[test]
    fn validate_reports_missing_markdown() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "img.png", "png");
        assert!(matches!(
            validate(vault.path(), true),
            Err(VaultError::NoMarkdown)
        ));
        assert!(validate(vault.path(), false).is_ok());
    }

    #[test]
    fn total_size_skips_vanished_files() {
        let vault = TempDir::new().unwrap();
        let a = write(vault.path(), "a.md", "12345");
        let b = write(vault.path(), "b.md", "123");
        let gone = vault.path().join("gone.md");

        assert_eq!(total_size(&[a, b, gone]), 8);
        assert_eq!(total_size(&[]), 0);
    }

    #[test]
    fn file_record_reports_size() {
        let vault = TempDir::new().unwrap();
        let a = write(vault.path(), "a.md", "hello");

        let record = FileRecord::from_path(&a).unwrap();
        assert_eq!(record.size, 5);
        assert_eq!(record.path, a);
        assert!(FileRecord::from_path(&vault.path().join("missing.md")).is_none());
    }
}
