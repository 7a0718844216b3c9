//! Cache reachability probe.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{ClientError, ProbeError};
use crate::probe::{DEFAULT_PROBE_TIMEOUT, Probe};
use crate::status::ProbeResult;

/// Expiry of the roundtrip key, so a failed DEL cannot leak it.
pub const ROUNDTRIP_TTL: Duration = Duration::from_secs(10);

const ROUNDTRIP_VALUE: &str = "test-value";

/// Commands the cache and job-queue probes need.
#[async_trait]
pub trait CacheClient: Send + Sync + Debug {
    /// `PING`, returning the reply.
    async fn ping(&self) -> Result<String, ClientError>;

    /// `SET key value EX ttl`.
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), ClientError>;

    /// `GET key`.
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError>;

    /// `DEL key`.
    async fn delete(&self, key: &str) -> Result<(), ClientError>;

    /// `INFO`, returning the raw text.
    async fn info(&self) -> Result<String, ClientError>;

    /// All keys matching a glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, ClientError>;
}

/// Parses `key:value` lines of an `INFO` reply.
pub fn parse_info(info: &str) -> HashMap<String, String> {
    info.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Pings the cache and round-trips a unique key.
///
/// Healthy details: `version`, `usedMemory`, `connectedClients`.
#[derive(Debug, Clone)]
pub struct CacheProbe {
    name: String,
    client: Arc<dyn CacheClient>,
    timeout: Duration,
}

impl CacheProbe {
    /// Creates a probe reported as `redis`.
    pub fn new(client: Arc<dyn CacheClient>) -> Self {
        Self {
            name: "redis".to_string(),
            client,
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
impl Probe for CacheProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let start = Instant::now();

        self.client.ping().await?;

        let key = format!("health-check:{}", uuid::Uuid::new_v4().simple());
        self.client
            .set_with_expiry(&key, ROUNDTRIP_VALUE, ROUNDTRIP_TTL)
            .await?;
        let read_back = self.client.get(&key).await?;
        self.client.delete(&key).await?;

        if read_back.as_deref() != Some(ROUNDTRIP_VALUE) {
            return Err(ProbeError::new("cache set/get roundtrip returned a different value")
                .with_detail("key", key));
        }

        let info = parse_info(&self.client.info().await?);
        let detail = |name: &str| info.get(name).cloned().unwrap_or_default();

        Ok(ProbeResult::healthy()
            .with_response_time_ms(start.elapsed().as_millis() as u64)
            .with_detail("version", detail("redis_version"))
            .with_detail("usedMemory", detail("used_memory_human"))
            .with_detail("connectedClients", detail("connected_clients")))
    }
}
