//! Prometheus metrics registry and instruments.
//!
//! A backup is a one-shot process, so metrics are exported by writing the
//! registry to a file for the node-exporter textfile collector.

use anyhow::Context;
use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};
use std::path::Path;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref BACKUP_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("vault_backup_runs_total", "Backup runs by outcome"),
        &["result"]
    ).expect("metric can be created");
    pub static ref BACKUP_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "vault_backup_duration_seconds",
            "Wall time of a backup run in seconds"
        ).buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0])
    ).expect("metric can be created");
    pub static ref BACKUP_FILES_ARCHIVED: IntGauge = IntGauge::new(
        "vault_backup_files_archived",
        "Files stored in the last archive"
    ).expect("metric can be created");
    pub static ref BACKUP_SOURCE_BYTES: IntGauge = IntGauge::new(
        "vault_backup_source_bytes",
        "Uncompressed size of the files in the last backup"
    ).expect("metric can be created");
    pub static ref BACKUP_ARCHIVE_BYTES: IntGauge = IntGauge::new(
        "vault_backup_archive_bytes",
        "Compressed size of the last archive"
    ).expect("metric can be created");
    pub static ref BACKUP_LAST_SUCCESS_TIMESTAMP: IntGauge = IntGauge::new(
        "vault_backup_last_success_timestamp_seconds",
        "Unix time of the last successful backup"
    ).expect("metric can be created");
}

/// Register every instrument with [`REGISTRY`]
///
/// Call once at startup.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(BACKUP_RUNS_TOTAL.clone()))
        .expect("BACKUP_RUNS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(BACKUP_DURATION_SECONDS.clone()))
        .expect("BACKUP_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(BACKUP_FILES_ARCHIVED.clone()))
        .expect("BACKUP_FILES_ARCHIVED can be registered");
    REGISTRY
        .register(Box::new(BACKUP_SOURCE_BYTES.clone()))
        .expect("BACKUP_SOURCE_BYTES can be registered");
    REGISTRY
        .register(Box::new(BACKUP_ARCHIVE_BYTES.clone()))
        .expect("BACKUP_ARCHIVE_BYTES can be registered");
    REGISTRY
        .register(Box::new(BACKUP_LAST_SUCCESS_TIMESTAMP.clone()))
        .expect("BACKUP_LAST_SUCCESS_TIMESTAMP can be registered");
}

/// Render the registry in Prometheus text format
pub fn render() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("failed to encode metrics")?;
    String::from_utf8(buffer).context("metrics output is not UTF-8")
}

/// Write metrics to `path`, atomically replacing any previous file
pub fn write_textfile(path: &Path) -> anyhow::Result<()> {
    let body = render()?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    std::io::Write::write_all(&mut temp, body.as_bytes()).context("failed to write metrics")?;
    temp.persist(path)
        .with_context(|| format!("failed to move metrics into {}", path.display()))?;
    Ok(())
}
