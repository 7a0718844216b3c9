//! Application state shared by the request handlers.

use std::sync::Arc;

use opsconsole_health::{HealthAggregator, Probe};

use crate::config::ServerConfig;

/// Shared application state.
///
/// Holds the aggregator behind `/health` and `/health/detailed`, and the
/// probe behind `/health/ready`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use opsconsole_health::HealthAggregator;
/// use opsconsole_persistence::backends::memory::MemoryBackend;
/// use opsconsole_rest::probes::StorageProbe;
/// use opsconsole_rest::{AppState, ServerConfig};
///
/// let storage = StorageProbe::new(Arc::new(MemoryBackend::new()));
/// let aggregator = HealthAggregator::new().with_probe(storage.clone());
/// let state = AppState::new(aggregator, Arc::new(storage), ServerConfig::default());
/// assert_eq!(state.aggregator().probe_names(), vec!["database"]);
/// ```
#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<HealthAggregator>,
    readiness: Arc<dyn Probe>,
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Creates the state.
    ///
    /// # Arguments
    ///
    /// * `aggregator` - Probes behind the health endpoints
    /// * `readiness` - Probe that decides readiness, usually storage
    /// * `config` - Server configuration
    pub fn new(
        aggregator: HealthAggregator,
        readiness: Arc<dyn Probe>,
        config: ServerConfig,
    ) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            readiness,
            config: Arc::new(config),
        }
    }

    /// Returns the health aggregator.
    pub fn aggregator(&self) -> &HealthAggregator {
        &self.aggregator
    }

    /// Returns the readiness probe.
    pub fn readiness(&self) -> Arc<dyn Probe> {
        Arc::clone(&self.readiness)
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("aggregator", &self.aggregator)
            .field("readiness", &self.readiness.name())
            .finish_non_exhaustive()
    }
}
