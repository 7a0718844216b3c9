//! AWS S3 implementation of [`ObjectStoreClient`].

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::ProvideErrorMetadata;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::probes::object_store::ObjectStoreClient;

/// Connection settings for an S3-compatible store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Settings {
    /// Custom endpoint, e.g. a MinIO URL. `None` uses AWS.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Region. Defaults to `us-east-1`.
    #[serde(default)]
    pub region: Option<String>,

    /// Static access key. `None` uses the default credential chain.
    #[serde(default)]
    pub access_key: Option<String>,

    /// Static secret key.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Use path-style addressing, as MinIO requires.
    #[serde(default)]
    pub force_path_style: bool,
}

/// S3 client for the object store probe.
#[derive(Debug, Clone)]
pub struct S3ObjectStoreClient {
    client: Client,
    endpoint: Option<String>,
}

impl S3ObjectStoreClient {
    /// Builds a client from settings.
    pub async fn from_settings(settings: &S3Settings) -> Self {
        let region = settings
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "opsconsole-health",
            ));
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.force_path_style)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            endpoint: settings.endpoint.clone(),
        }
    }
}

#[async_trait]
impl ObjectStoreClient for S3ObjectStoreClient {
    async fn head_bucket(&self, bucket: &str) -> Result<(), ClientError> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }

    fn endpoint(&self) -> Option<String> {
        self.endpoint.clone()
    }
}

fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>) -> ClientError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    let fallback = format!("{err:?}");

    match err {
        aws_sdk_s3::error::SdkError::ServiceError(service_err) => {
            let code = service_err.err().code().unwrap_or("Unknown").to_string();
            let message = service_err
                .err()
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| code.clone());
            match code.as_str() {
                "NoSuchBucket" | "NotFound" => ClientError::NotFound(message),
                _ => ClientError::Command(message),
            }
        }
        aws_sdk_s3::error::SdkError::TimeoutError(_)
        | aws_sdk_s3::error::SdkError::DispatchFailure(_) => ClientError::Unavailable(fallback),
        _ => ClientError::Command(fallback),
    }
}
