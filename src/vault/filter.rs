//! Backup eligibility rules
//!
//! Pure path inspection; never touches the filesystem.

use std::ffi::OsStr;
use std::path::{Component, Path};

/// Settings directory of the notes application, never backed up
pub const RESERVED_CONFIG_DIR: &str = ".obsidian";

/// OS and editor artifacts
const EXCLUDED_FILE_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", ".gitignore"];

/// Temporary and backup-file suffixes
const EXCLUDED_EXTENSIONS: &[&str] = &[".tmp", ".temp", ".bak", ".swp"];

/// Decide whether `path` belongs in a backup
///
/// `path` is expected relative to the vault root; every segment of it is
/// checked against the reserved settings directory.
///
/// Rules, first match wins:
/// 1. a path segment is the reserved settings directory
/// 2. file name is a known OS/editor artifact
/// 3. file name ends with a temporary-file extension
/// 4. file name is hidden (leading `.`)
///
/// Anything else is included.
pub fn is_backup_target(path: &Path) -> bool {
    let reserved = Component::Normal(OsStr::new(RESERVED_CONFIG_DIR));
    if path.components().any(|component| component == reserved) {
        return false;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();

    if EXCLUDED_FILE_NAMES.contains(&file_name.as_ref()) {
        return false;
    }

    if EXCLUDED_EXTENSIONS
        .iter()
        .any(|ext| file_name.ends_with(ext))
    {
        return false;
    }

    !file_name.starts_with('.')
}

/// Whether `path` is a markdown note
pub fn is_markdown(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(".md"))
        .unwrap_or(false)
}
