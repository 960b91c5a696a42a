//! Zip archive construction
//!
//! Builds one deflate-compressed zip in the system temp directory.
//! Entries are named by their vault-relative path with `/` separators.

use chrono::{Datelike, Timelike};
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::TempPath;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;
use crate::vault::FileRecord;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// A finished archive on local disk
///
/// The file is deleted by [`Archive::remove`], or when the value is dropped.
#[derive(Debug)]
pub struct Archive {
    path: TempPath,
    entries: usize,
    skipped: Vec<PathBuf>,
    size: u64,
}

impl Archive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of files stored
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Listed files that were missing or unreadable
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    /// Compressed size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the archive file
    pub fn remove(self) -> io::Result<()> {
        self.path.close()
    }
}

/// Build a zip from `files`, naming entries relative to `base_dir`
///
/// Missing or unreadable files are skipped with a warning, including files
/// that fail partway through being read.
///
/// # Errors
/// - `NoFilesToArchive` if `files` is empty
/// - `EmptyArchive` if none of the files could be stored
/// - `Write` on any archive-level I/O failure (the partial file is removed)
pub fn build(files: &[PathBuf], base_dir: &Path) -> Result<Archive, ArchiveError> {
    if files.is_empty() {
        tracing::error!("No files to archive");
        return Err(ArchiveError::NoFilesToArchive);
    }

    let (file, temp_path) = tempfile::Builder::new()
        .prefix("vault-backup-")
        .suffix(".zip")
        .tempfile()
        .map_err(write_error)?
        .into_parts();

    assemble(file, temp_path, files, base_dir)
}

/// Write the zip into `sink`, the open handle of `temp_path`
fn assemble<W: Write + Seek>(
    sink: W,
    temp_path: TempPath,
    files: &[PathBuf],
    base_dir: &Path,
) -> Result<Archive, ArchiveError> {
    let (entries, skipped) = match write_entries(sink, files, base_dir) {
        Ok(result) => result,
        Err(error) => {
            tracing::error!(%error, "Error creating backup archive");
            discard(temp_path);
            return Err(error);
        }
    };

    if entries == 0 {
        tracing::error!("No files were successfully archived");
        discard(temp_path);
        return Err(ArchiveError::EmptyArchive);
    }

    let size = std::fs::metadata(&temp_path).map(|m| m.len()).unwrap_or(0);
    tracing::info!(
        entries,
        skipped = skipped.len(),
        size,
        path = %temp_path.display(),
        "Created backup archive"
    );

    Ok(Archive {
        path: temp_path,
        entries,
        skipped,
        size,
    })
}

/// Returns the stored entry count and the skipped paths; `sink` is closed
fn write_entries<W: Write + Seek>(
    sink: W,
    files: &[PathBuf],
    base_dir: &Path,
) -> Result<(usize, Vec<PathBuf>), ArchiveError> {
    let mut writer = ZipWriter::new(sink);
    let mut entries = 0;
    let mut skipped = Vec::new();

    for path in files {
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "File not found, skipping");
            skipped.push(path.clone());
            continue;
        }

        let mut source = match File::open(path) {
            Ok(source) => source,
            Err(error) => {
                tracing::warn!(%error, path = %path.display(), "Failed to add file to archive");
                skipped.push(path.clone());
                continue;
            }
        };

        let mut options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        if let Some(record) = FileRecord::from_path(path) {
            options = options.large_file(record.size >= u64::from(u32::MAX));
            if let Some(modified) = zip_timestamp(&record) {
                options = options.last_modified_time(modified);
            }
        }

        if append_entry(&mut writer, entry_name(path, base_dir), options, &mut source, path)? {
            entries += 1;
        } else {
            skipped.push(path.clone());
        }
    }

    let mut sink = writer.finish().map_err(write_error)?;
    sink.flush().map_err(write_error)?;
    Ok((entries, skipped))
}

/// Stream `source` into a new entry named `name`
///
/// A failing read drops the partial entry and returns `Ok(false)`; only
/// failures on the archive side are errors.
fn append_entry<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    name: String,
    options: SimpleFileOptions,
    source: &mut impl Read,
    path: &Path,
) -> Result<bool, ArchiveError> {
    writer.start_file(name, options).map_err(write_error)?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let read = match source.read(&mut buffer) {
            Ok(0) => return Ok(true),
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => {
                tracing::warn!(%error, path = %path.display(), "Failed to read file, skipping");
                writer.abort_file().map_err(write_error)?;
                return Ok(false);
            }
        };
        writer.write_all(&buffer[..read]).map_err(write_error)?;
    }
}

/// Vault-relative entry name with forward slashes
fn entry_name(path: &Path, base_dir: &Path) -> String {
    match path.strip_prefix(base_dir) {
        Ok(relative) => relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned()),
    }
}

/// Zip timestamps cover 1980..=2107; anything else keeps the default
fn zip_timestamp(record: &FileRecord) -> Option<zip::DateTime> {
    let modified = record.modified;
    let year = u16::try_from(modified.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        modified.month() as u8,
        modified.day() as u8,
        modified.hour() as u8,
        modified.minute() as u8,
        modified.second() as u8,
    )
    .ok()
}

fn discard(temp_path: TempPath) {
    let location = temp_path.to_path_buf();
    if let Err(error) = temp_path.close() {
        tracing::warn!(%error, path = %location.display(), "Failed to remove partial archive");
    }
}

fn write_error(error: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Write(error.to_string())
}
