//! Layered credential lookup
//!
//! Sources are tried in order and the first one that yields a key pair
//! wins: configuration file, environment, shared profile, instance role.
//! The actual profile and role lookups are delegated to `aws-config`.

use async_trait::async_trait;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::provider_config::ProviderConfig;
use aws_credential_types::Credentials;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_s3::config::{Region, SharedHttpClient};

use crate::config::{CredentialsConfig, non_blank};

/// One place credentials may come from
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &'static str;

    async fn resolve(&self) -> Option<Credentials>;
}

/// `[credentials]` section of the configuration file
pub struct ConfigFileSource {
    config: CredentialsConfig,
}

impl ConfigFileSource {
    pub fn new(config: CredentialsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialSource for ConfigFileSource {
    fn name(&self) -> &'static str {
        "config-file"
    }

    async fn resolve(&self) -> Option<Credentials> {
        key_pair(
            self.config.key_id(),
            self.config.secret(),
            self.config.token(),
            "vault-backup-config",
        )
    }
}

/// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
pub struct EnvironmentSource;

#[async_trait]
impl CredentialSource for EnvironmentSource {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn resolve(&self) -> Option<Credentials> {
        let access_key = std::env::var("AWS_ACCESS_KEY_ID").ok();
        let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();
        key_pair(
            access_key.as_deref(),
            secret_key.as_deref(),
            session_token.as_deref(),
            "vault-backup-env",
        )
    }
}

/// Shared `~/.aws/credentials` and `~/.aws/config` profiles
pub struct ProfileSource {
    provider: ProfileFileCredentialsProvider,
}

impl ProfileSource {
    pub fn new(provider_config: &ProviderConfig) -> Self {
        Self {
            provider: ProfileFileCredentialsProvider::builder()
                .configure(provider_config)
                .build(),
        }
    }
}

#[async_trait]
impl CredentialSource for ProfileSource {
    fn name(&self) -> &'static str {
        "profile"
    }

    async fn resolve(&self) -> Option<Credentials> {
        match self.provider.provide_credentials().await {
            Ok(credentials) => Some(credentials),
            Err(error) => {
                tracing::debug!(%error, "No usable AWS profile credentials");
                None
            }
        }
    }
}

/// EC2 instance role via the instance metadata service
pub struct InstanceRoleSource {
    provider: ImdsCredentialsProvider,
}

impl InstanceRoleSource {
    pub fn new(provider_config: &ProviderConfig) -> Self {
        Self {
            provider: ImdsCredentialsProvider::builder()
                .configure(provider_config)
                .build(),
        }
    }
}

#[async_trait]
impl CredentialSource for InstanceRoleSource {
    fn name(&self) -> &'static str {
        "instance-role"
    }

    async fn resolve(&self) -> Option<Credentials> {
        match self.provider.provide_credentials().await {
            Ok(credentials) => Some(credentials),
            Err(error) => {
                tracing::debug!(%error, "No instance role credentials");
                None
            }
        }
    }
}

/// Both halves present and non-blank, or nothing
fn key_pair(
    access_key: Option<&str>,
    secret_key: Option<&str>,
    session_token: Option<&str>,
    provider_name: &'static str,
) -> Option<Credentials> {
    let access_key = non_blank(access_key)?;
    let secret_key = non_blank(secret_key)?;
    let session_token = non_blank(session_token).map(str::to_string);

    Some(Credentials::new(
        access_key,
        secret_key,
        session_token,
        None,
        provider_name,
    ))
}

/// The standard lookup order
pub fn default_sources(
    config: &CredentialsConfig,
    region: &str,
    http_client: SharedHttpClient,
) -> Vec<Box<dyn CredentialSource>> {
    let provider_config = ProviderConfig::default()
        .with_region(Some(Region::new(region.to_string())))
        .with_http_client(http_client);

    vec![
        Box::new(ConfigFileSource::new(config.clone())),
        Box::new(EnvironmentSource),
        Box::new(ProfileSource::new(&provider_config)),
        Box::new(InstanceRoleSource::new(&provider_config)),
    ]
}

/// Try each source in order; `None` means fall back to the SDK default chain
pub async fn resolve_credentials(sources: &[Box<dyn CredentialSource>]) -> Option<Credentials> {
    for source in sources {
        if let Some(credentials) = source.resolve().await {
            tracing::info!(source = source.name(), "AWS credentials found");
            return Some(credentials);
        }
        tracing::debug!(source = source.name(), "No AWS credentials from source");
    }

    tracing::warn!("No explicit AWS credentials found; using the SDK default provider chain");
    None
}
