//! Storage backend probe.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use opsconsole_health::{DEFAULT_PROBE_TIMEOUT, Probe, ProbeError, ProbeResult};
use opsconsole_persistence::Backend;

/// Checks the storage backend and reports its pool.
///
/// Degraded when callers are waiting for a connection. Details: `backend`,
/// `kind`, and `pool` when the backend pools connections.
#[derive(Debug, Clone)]
pub struct StorageProbe {
    backend: Arc<dyn Backend>,
    timeout: Duration,
}

impl StorageProbe {
    /// Creates a probe reported as `database`.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Probe for StorageProbe {
    fn name(&self) -> &str {
        "database"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let start = Instant::now();
        let backend = self.backend.name();
        let kind = self.backend.kind().to_string();

        if let Err(e) = self.backend.health_check().await {
            return Err(ProbeError::new(e.to_string())
                .with_detail("backend", backend)
                .with_detail("kind", kind));
        }

        let pool = self.backend.pool_stats().map(|stats| stats.snapshot());
        let result = match pool {
            Some(snapshot) if snapshot.pending > 0 => ProbeResult::degraded().with_error(format!(
                "{} callers waiting for a connection",
                snapshot.pending
            )),
            _ => ProbeResult::healthy(),
        };

        let result = result
            .with_response_time_ms(start.elapsed().as_millis() as u64)
            .with_detail("backend", backend)
            .with_detail("kind", kind);

        Ok(match pool.and_then(|snapshot| serde_json::to_value(snapshot).ok()) {
            Some(pool) => result.with_detail("pool", pool),
            None => result,
        })
    }
}
