//! Object store reachability probe.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{ClientError, ProbeError};
use crate::probe::{DEFAULT_PROBE_TIMEOUT, Probe};
use crate::status::ProbeResult;

/// Operations the object store probe needs.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync + Debug {
    /// Succeeds when the bucket exists and is accessible.
    async fn head_bucket(&self, bucket: &str) -> Result<(), ClientError>;

    /// Endpoint the client talks to, for diagnostics.
    fn endpoint(&self) -> Option<String> {
        None
    }
}

/// Checks that the configured bucket exists.
///
/// Details, success or not: `bucket`, `endpoint`.
#[derive(Debug, Clone)]
pub struct ObjectStoreProbe {
    name: String,
    client: Arc<dyn ObjectStoreClient>,
    bucket: String,
    timeout: Duration,
}

impl ObjectStoreProbe {
    /// Creates a probe reported as `s3`.
    pub fn new(client: Arc<dyn ObjectStoreClient>, bucket: impl Into<String>) -> Self {
        Self {
            name: "s3".to_string(),
            client,
            bucket: bucket.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Sets the report name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Probe for ObjectStoreProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let start = Instant::now();
        let endpoint = self.client.endpoint().unwrap_or_default();

        if let Err(err) = self.client.head_bucket(&self.bucket).await {
            return Err(ProbeError::from(err)
                .with_detail("bucket", self.bucket.clone())
                .with_detail("endpoint", endpoint));
        }

        Ok(ProbeResult::healthy()
            .with_response_time_ms(start.elapsed().as_millis() as u64)
            .with_detail("bucket", self.bucket.clone())
            .with_detail("endpoint", endpoint))
    }
}
