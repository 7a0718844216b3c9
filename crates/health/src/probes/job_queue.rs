//! Job queue backlog probe.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::probe::{DEFAULT_PROBE_TIMEOUT, Probe};
use crate::probes::cache::CacheClient;
use crate::status::ProbeResult;

/// Counts queue keys under a prefix in the cache.
///
/// Healthy details: `activeQueues` (keys holding waiting or active jobs)
/// and `redisKeys` (all keys under the prefix).
#[derive(Debug, Clone)]
pub struct JobQueueProbe {
    client: Arc<dyn CacheClient>,
    prefix: String,
    timeout: Duration,
}

impl JobQueueProbe {
    /// Creates a probe scanning keys that start with `prefix`.
    pub fn new(client: Arc<dyn CacheClient>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn is_active_queue_key(key: &str) -> bool {
    key.contains(":waiting") || key.contains(":active")
}

#[async_trait]
impl Probe for JobQueueProbe {
    fn name(&self) -> &str {
        "jobQueues"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let start = Instant::now();
        let keys = self.client.keys(&format!("{}*", self.prefix)).await?;
        let active = keys.iter().filter(|k| is_active_queue_key(k)).count();

        Ok(ProbeResult::healthy()
            .with_response_time_ms(start.elapsed().as_millis() as u64)
            .with_detail("activeQueues", active)
            .with_detail("redisKeys", keys.len()))
    }
}
