//! AWS S3 implementation of [`ObjectStore`]

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region, SharedHttpClient};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, ServerSideEncryption,
    ServerSideEncryptionByDefault, ServerSideEncryptionConfiguration, ServerSideEncryptionRule,
    StorageClass,
};

use super::{ObjectStore, ObjectUpload};
use crate::config::StorageConfig;
use crate::error::{AppError, CredentialFault, RemoteError, RemoteErrorKind};

/// Map a provider error code and HTTP status onto [`RemoteErrorKind`]
///
/// The code wins when it is recognised; HEAD responses carry no body,
/// so the status is the fallback.
pub fn classify(code: Option<&str>, status: Option<u16>) -> RemoteErrorKind {
    match code {
        Some("NoSuchBucket" | "NotFound" | "404") => RemoteErrorKind::NotFound,
        Some("AccessDenied" | "Forbidden" | "403") => RemoteErrorKind::AccessDenied,
        Some("BucketAlreadyOwnedByYou") => RemoteErrorKind::AlreadyExistsOwned,
        Some("BucketAlreadyExists") => RemoteErrorKind::AlreadyExistsForeign,
        Some("InvalidAccessKeyId") => {
            RemoteErrorKind::InvalidCredentials(CredentialFault::AccessKeyId)
        }
        Some("SignatureDoesNotMatch") => {
            RemoteErrorKind::InvalidCredentials(CredentialFault::Secret)
        }
        _ => match status {
            Some(404) => RemoteErrorKind::NotFound,
            Some(403) => RemoteErrorKind::AccessDenied,
            _ => RemoteErrorKind::Other,
        },
    }
}

fn remote_error<E>(operation: &'static str, error: SdkError<E, HttpResponse>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = error
        .raw_response()
        .map(|response| response.status().as_u16());
    let code = error.code().map(str::to_string);
    let message = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&error).to_string());

    RemoteError::new(classify(code.as_deref(), status), operation, code, message)
}

fn request_error(operation: &'static str, error: impl std::fmt::Display) -> RemoteError {
    RemoteError::new(RemoteErrorKind::Other, operation, None, error.to_string())
}

/// S3 client bound to one region
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Build an S3 client for `storage.region`
    ///
    /// With `credentials` the client is pinned to them; without, the SDK's
    /// default provider chain is used.
    pub async fn connect(
        storage: &StorageConfig,
        credentials: Option<Credentials>,
        http_client: SharedHttpClient,
    ) -> Result<Self, AppError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(storage.region.clone()))
            .http_client(http_client);
        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(credentials);
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = storage.endpoint_url.as_deref() {
            url_like(endpoint)?;
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self::new(S3Client::from_conf(builder.build())))
    }
}

fn url_like(endpoint: &str) -> Result<(), AppError> {
    if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "storage.endpoint_url must start with http:// or https://, got {endpoint:?}"
        )))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_buckets(&self) -> Result<Vec<String>, RemoteError> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| remote_error("ListBuckets", e))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(str::to_string))
            .collect())
    }

    async fn head_bucket(&self, bucket: &str) -> Result<(), RemoteError> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| remote_error("HeadBucket", e))?;
        Ok(())
    }

    async fn create_bucket(
        &self,
        bucket: &str,
        location_constraint: Option<String>,
    ) -> Result<(), RemoteError> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(region) = location_constraint {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| remote_error("CreateBucket", e))?;
        Ok(())
    }

    async fn put_bucket_encryption(&self, bucket: &str) -> Result<(), RemoteError> {
        const OPERATION: &str = "PutBucketEncryption";

        let by_default = ServerSideEncryptionByDefault::builder()
            .sse_algorithm(ServerSideEncryption::Aes256)
            .build()
            .map_err(|e| request_error(OPERATION, e))?;
        let rule = ServerSideEncryptionRule::builder()
            .apply_server_side_encryption_by_default(by_default)
            .bucket_key_enabled(true)
            .build();
        let configuration = ServerSideEncryptionConfiguration::builder()
            .rules(rule)
            .build()
            .map_err(|e| request_error(OPERATION, e))?;

        self.client
            .put_bucket_encryption()
            .bucket(bucket)
            .server_side_encryption_configuration(configuration)
            .send()
            .await
            .map_err(|e| remote_error(OPERATION, e))?;
        Ok(())
    }

    async fn put_object(&self, upload: ObjectUpload) -> Result<(), RemoteError> {
        const OPERATION: &str = "PutObject";

        let body = ByteStream::from_path(&upload.path)
            .await
            .map_err(|e| request_error(OPERATION, e))?;

        let mut request = self
            .client
            .put_object()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .body(body)
            .content_type("application/zip")
            .storage_class(StorageClass::from(upload.storage_class.as_str()))
            .set_metadata(Some(upload.metadata));
        if upload.encrypted {
            request = request.server_side_encryption(ServerSideEncryption::Aes256);
        }

        request
            .send()
            .await
            .map_err(|e| remote_error(OPERATION, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognises_bucket_codes() {
        assert_eq!(classify(Some("NoSuchBucket"), Some(404)), RemoteErrorKind::NotFound);
        assert_eq!(classify(Some("NotFound"), None), RemoteErrorKind::NotFound);
        assert_eq!(classify(Some("AccessDenied"), Some(403)), RemoteErrorKind::AccessDenied);
        assert_eq!(
            classify(Some("BucketAlreadyOwnedByYou"), Some(409)),
            RemoteErrorKind::AlreadyExistsOwned
        );
        assert_eq!(
            classify(Some("BucketAlreadyExists"), Some(409)),
            RemoteErrorKind::AlreadyExistsForeign
        );
    }

    #[test]
    fn classify_separates_credential_faults() {
        assert_eq!(
            classify(Some("InvalidAccessKeyId"), Some(403)),
            RemoteErrorKind::InvalidCredentials(CredentialFault::AccessKeyId)
        );
        assert_eq!(
            classify(Some("SignatureDoesNotMatch"), Some(403)),
            RemoteErrorKind::InvalidCredentials(CredentialFault::Secret)
        );
    }

    #[test]
    fn classify_falls_back_to_status_for_bodiless_responses() {
        assert_eq!(classify(None, Some(404)), RemoteErrorKind::NotFound);
        assert_eq!(classify(None, Some(403)), RemoteErrorKind::AccessDenied);
        assert_eq!(classify(None, Some(500)), RemoteErrorKind::Other);
        assert_eq!(classify(None, None), RemoteErrorKind::Other);
        assert_eq!(classify(Some("SlowDown"), Some(503)), RemoteErrorKind::Other);
    }

    #[test]
    fn endpoint_must_be_a_url() {
        assert!(url_like("https://s3.example.com").is_ok());
        assert!(url_like("http://127.0.0.1:9000").is_ok());
        assert!(matches!(url_like("s3.example.com"), Err(AppError::Config(_))));
    }
}
