//! vault-backup binary entry point

use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vault_backup::config::{AppConfig, LoggingConfig};
use vault_backup::metrics::{self, BACKUP_RUNS_TOTAL};
use vault_backup::{AppError, BackupReport, BackupRunner, BackupTarget, RemoteStorageClient};

/// Application entry point
///
/// # Steps
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize the S3 client and verify credentials
/// 4. Run the backup (interruptible with Ctrl-C)
/// 5. Write run metrics if configured
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // 1. Load configuration
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    // 2. Initialize tracing/logging
    init_tracing(&config.logging);
    metrics::init_metrics();

    tracing::info!("=== Vault backup started ===");
    tracing::info!(
        vault = %config.vault.path.display(),
        bucket = %config.storage.bucket,
        region = %config.storage.region,
        "Configuration loaded"
    );

    // 3-4. Client setup and backup; dropping the run future on Ctrl-C
    // drops the archive, which deletes the temporary file.
    let exit_code = tokio::select! {
        result = run(&config) => match result {
            Ok(report) => {
                tracing::info!(
                    key = %report.key,
                    files = report.file_count,
                    bytes = report.total_size,
                    archive_bytes = report.archive_size,
                    skipped = report.skipped.len(),
                    "=== Backup completed successfully ==="
                );
                ExitCode::SUCCESS
            }
            Err(error) => {
                tracing::error!(%error, "=== Backup failed ===");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            BACKUP_RUNS_TOTAL.with_label_values(&["interrupted"]).inc();
            tracing::info!("Backup interrupted by user");
            ExitCode::FAILURE
        }
    };

    // 5. Export metrics
    if let Some(path) = config.metrics.textfile_path.as_deref() {
        match metrics::write_textfile(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Metrics written"),
            Err(error) => tracing::warn!(error = %format!("{error:#}"), "Failed to write metrics"),
        }
    }

    exit_code
}

async fn run(config: &AppConfig) -> Result<BackupReport, AppError> {
    tracing::info!("Initializing S3 client...");
    let client = RemoteStorageClient::initialize(&config.storage, &config.credentials)
        .await
        .inspect_err(|error| tracing::error!(%error, "Failed to initialize S3 client"))?;
    tracing::info!(
        bucket = client.bucket(),
        region = client.region(),
        "S3 client initialized"
    );

    client
        .verify_credentials()
        .await
        .inspect_err(|_| tracing::error!("Failed to verify AWS credentials"))?;

    let target = BackupTarget::new(&config.vault.path)?;

    tracing::info!("Starting backup process...");
    BackupRunner::new(target, &client)
        .require_markdown(config.vault.require_markdown)
        .execute()
        .await
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("vault_backup={}", logging.level).into());

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!(level = %logging.level, "Logging initialized");
}
