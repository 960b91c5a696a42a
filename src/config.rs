//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (VAULT_BACKUP__*, then the flat legacy names)

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::AppError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub vault: VaultConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Vault (source directory) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Root directory of the notes vault
    pub path: PathBuf,
    /// Reject vaults that contain no `.md` note
    #[serde(default = "default_require_markdown")]
    pub require_markdown: bool,
}

fn default_require_markdown() -> bool {
    true
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Target bucket name
    pub bucket: String,
    /// Bucket region (e.g., "ap-northeast-1")
    pub region: String,
    /// Prefix of uploaded object keys
    pub key_prefix: String,
    /// Storage class of uploaded archives (default: DEEP_ARCHIVE)
    pub storage_class: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint_url: Option<String>,
}

/// Explicit credentials from the configuration file
///
/// Highest priority source; leave empty to fall through to the
/// environment, shared profile and instance role.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl CredentialsConfig {
    /// Access key id, unless unset or blank
    pub fn key_id(&self) -> Option<&str> {
        non_blank(self.access_key_id.as_deref())
    }

    /// Secret access key, unless unset or blank
    pub fn secret(&self) -> Option<&str> {
        non_blank(self.secret_access_key.as_deref())
    }

    pub fn token(&self) -> Option<&str> {
        non_blank(self.session_token.as_deref())
    }
}

/// Trimmed value, with blank strings treated as unset
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

/// Run metrics configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsConfig {
    /// Write Prometheus text-format metrics here after each run
    pub textfile_path: Option<PathBuf>,
}

/// Flat environment variables accepted for compatibility with
/// existing deployments, mapped onto their config keys
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("OBSIDIAN_VAULT_PATH", "vault.path"),
    ("AWS_S3_BUCKET_NAME", "storage.bucket"),
    ("AWS_REGION", "storage.region"),
    ("LOG_LEVEL", "logging.level"),
    ("BACKUP_PREFIX", "storage.key_prefix"),
];

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (VAULT_BACKUP__*)
    /// 5. Flat environment variables (OBSIDIAN_VAULT_PATH, AWS_S3_BUCKET_NAME, ...)
    ///
    /// # Errors
    /// Returns error if configuration is missing or invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            .set_default("storage.region", "ap-northeast-1")?
            .set_default("storage.key_prefix", "obsidian-backup")?
            .set_default("storage.storage_class", "DEEP_ARCHIVE")?
            .set_default("vault.require_markdown", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("VAULT_BACKUP")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_ENV_KEYS {
            let value = std::env::var(var)
                .ok()
                .filter(|value| !value.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let mut app_config: Self = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.normalize();
        app_config.validate()?;
        Ok(app_config)
    }

    fn normalize(&mut self) {
        let vault_path = self.vault.path.to_string_lossy().trim().to_string();
        self.vault.path = PathBuf::from(vault_path);
        self.storage.bucket = self.storage.bucket.trim().to_string();
        self.storage.region = self.storage.region.trim().to_string();
        self.storage.key_prefix = self.storage.key_prefix.trim().to_string();
        self.storage.storage_class = self.storage.storage_class.trim().to_ascii_uppercase();
        self.logging.level = self.logging.level.trim().to_ascii_lowercase();
        self.logging.format = self.logging.format.trim().to_ascii_lowercase();
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let vault_path = &self.vault.path;
        if vault_path.as_os_str().is_empty() {
            return Err(AppError::Config("vault.path is empty".to_string()));
        }
        if !vault_path.exists() {
            return Err(AppError::Config(format!(
                "vault path does not exist: {}",
                vault_path.display()
            )));
        }
        if !vault_path.is_dir() {
            return Err(AppError::Config(format!(
                "vault path is not a directory: {}",
                vault_path.display()
            )));
        }

        if !is_valid_bucket_name(&self.storage.bucket) {
            return Err(AppError::Config(format!(
                "invalid bucket name: {:?}",
                self.storage.bucket
            )));
        }

        if self.storage.region.is_empty() {
            return Err(AppError::Config("storage.region is empty".to_string()));
        }

        if self.storage.key_prefix.is_empty() {
            return Err(AppError::Config("storage.key_prefix is empty".to_string()));
        }

        let has_key_id = self.credentials.key_id().is_some();
        let has_secret = self.credentials.secret().is_some();
        if has_key_id != has_secret {
            return Err(AppError::Config(
                "credentials.access_key_id and credentials.secret_access_key must be set together"
                    .to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        tracing::debug!("Configuration validation successful");
        Ok(())
    }
}

/// Basic bucket-name check: non-empty, ASCII alphanumerics plus `-` and `.`
fn is_valid_bucket_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config(vault: &TempDir) -> AppConfig {
        AppConfig {
            vault: VaultConfig {
                path: vault.path().to_path_buf(),
                require_markdown: true,
            },
            storage: StorageConfig {
                bucket: "my-vault-backup".to_string(),
                region: "ap-northeast-1".to_string(),
                key_prefix: "obsidian-backup".to_string(),
                storage_class: "DEEP_ARCHIVE".to_string(),
                endpoint_url: None,
            },
            credentials: CredentialsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            metrics: MetricsConfig::default(),
        }
    }

    #[test]
    fn validate_accepts_existing_vault_and_plain_bucket() {
        let vault = TempDir::new().unwrap();
        assert!(valid_config(&vault).validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_vault() {
        let vault = TempDir::new().unwrap();
        let mut config = valid_config(&vault);
        config.vault.path = vault.path().join("does-not-exist");

        let error = config.validate().expect_err("missing vault must fail");
        assert!(matches!(
            error,
            AppError::Config(message) if message.contains("does not exist")
        ));
    }

    #[test]
    fn validate_rejects_file_as_vault() {
        let vault = TempDir::new().unwrap();
        let file = vault.path().join("note.md");
        std::fs::write(&file, "# note").unwrap();
        let mut config = valid_config(&vault);
        config.vault.path = file;

        let error = config.validate().expect_err("a file is not a vault");
        assert!(matches!(
            error,
            AppError::Config(message) if message.contains("not a directory")
        ));
    }

    #[test]
    fn validate_rejects_bad_bucket_names() {
        let vault = TempDir::new().unwrap();
        for bucket in ["", "my_bucket", "bucket/name", "bücket"] {
            let mut config = valid_config(&vault);
            config.storage.bucket = bucket.to_string();
            assert!(config.validate().is_err(), "bucket {bucket:?} must be rejected");
        }
    }

    #[test]
    fn validate_rejects_half_configured_credentials() {
        let vault = TempDir::new().unwrap();
        let mut config = valid_config(&vault);
        config.credentials.access_key_id = Some("AKIAEXAMPLE".to_string());

        let error = config.validate().expect_err("key id without secret must fail");
        assert!(matches!(
            error,
            AppError::Config(message) if message.contains("set together")
        ));
    }

    #[test]
    fn blank_credentials_count_as_unset() {
        let vault = TempDir::new().unwrap();
        let mut config = valid_config(&vault);
        config.credentials.access_key_id = Some(String::new());
        assert!(config.validate().is_ok());

        config.credentials.access_key_id = Some("AKIAEXAMPLE".to_string());
        config.credentials.secret_access_key = Some("   ".to_string());
        assert!(config.validate().is_err());

        config.credentials.secret_access_key = Some(" secret ".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.credentials.secret(), Some("secret"));
        assert_eq!(config.credentials.token(), None);
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let vault = TempDir::new().unwrap();
        let mut config = valid_config(&vault);
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn normalize_trims_and_cases_values() {
        let vault = TempDir::new().unwrap();
        let mut config = valid_config(&vault);
        config.vault.path = PathBuf::from(format!("  {}  ", vault.path().display()));
        config.storage.bucket = " my-vault-backup ".to_string();
        config.storage.storage_class = "glacier".to_string();
        config.logging.level = "DEBUG".to_string();

        config.normalize();

        assert_eq!(config.vault.path, vault.path());
        assert_eq!(config.storage.bucket, "my-vault-backup");
        assert_eq!(config.storage.storage_class, "GLACIER");
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }
}
