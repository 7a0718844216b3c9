//! Operations Console API server.
//!
//! Wires configuration, the storage backend, health probes and the HTTP
//! server together.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use opsconsole_health::probes::{AlertingProbe, ScratchDirProbe, SelfCheckProbe};
use opsconsole_health::{HealthAggregator, HealthConfig, Probe, ProbeError, ProbeResult};
use opsconsole_persistence::Backend;
use opsconsole_persistence::backends::memory::MemoryBackend;
use opsconsole_rest::probes::StorageProbe;
use opsconsole_rest::{AppState, ServerConfig, create_app, init_logging, serve};
use tracing::{info, warn};

/// Stands in for a probe whose client could not be built at start-up.
///
/// Keeps the subsystem visible as unhealthy instead of dropping it.
#[derive(Debug)]
struct UnavailableProbe {
    name: &'static str,
    message: String,
}

#[async_trait]
impl Probe for UnavailableProbe {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        Err(ProbeError::new(self.message.clone()))
    }
}

/// Creates the storage backend from the server configuration.
async fn create_backend(config: &ServerConfig) -> anyhow::Result<Arc<dyn Backend>> {
    match config.database_url.as_deref() {
        Some(url) => create_postgres_backend(url).await,
        None => {
            warn!("No database URL configured; using in-memory storage");
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}

#[cfg(feature = "postgres")]
async fn create_postgres_backend(url: &str) -> anyhow::Result<Arc<dyn Backend>> {
    use opsconsole_persistence::backends::postgres::PostgresBackend;

    info!("Initializing PostgreSQL backend from connection string");
    let backend = PostgresBackend::from_connection_string(url).await?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "postgres"))]
async fn create_postgres_backend(_url: &str) -> anyhow::Result<Arc<dyn Backend>> {
    anyhow::bail!(
        "A database URL requires the 'postgres' feature. \
         Build with: cargo build -p opsconsole --features postgres"
    )
}

/// Adds the cache and job queue probes.
#[cfg(feature = "redis")]
async fn add_cache_probes(
    aggregator: &mut HealthAggregator,
    config: &ServerConfig,
    health: &HealthConfig,
) {
    use opsconsole_health::probes::{CacheProbe, JobQueueProbe, RedisCacheClient};

    let Some(url) = config.redis_url.as_deref() else {
        warn!("REDIS_URL not set; cache probes disabled");
        return;
    };

    match RedisCacheClient::connect(url).await {
        Ok(client) => {
            let client = Arc::new(client);
            aggregator.add_probe(Arc::new(
                CacheProbe::new(client.clone()).with_timeout(health.probe_timeout),
            ));
            aggregator.add_auxiliary_probe(Arc::new(
                JobQueueProbe::new(client, health.job_queue_prefix.clone())
                    .with_timeout(health.probe_timeout),
            ));
        }
        Err(e) => {
            tracing::error!(error = %e, "Redis client unavailable at start-up");
            aggregator.add_probe(Arc::new(UnavailableProbe {
                name: "redis",
                message: e.to_string(),
            }));
            aggregator.add_auxiliary_probe(Arc::new(UnavailableProbe {
                name: "jobQueues",
                message: e.to_string(),
            }));
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn add_cache_probes(
    _aggregator: &mut HealthAggregator,
    config: &ServerConfig,
    _health: &HealthConfig,
) {
    if config.redis_url.is_some() {
        warn!("REDIS_URL is set but the 'redis' feature is disabled; cache probes disabled");
    }
}

/// Adds the object store probe.
#[cfg(feature = "s3")]
async fn add_object_store_probe(
    aggregator: &mut HealthAggregator,
    config: &ServerConfig,
    health: &HealthConfig,
) {
    use opsconsole_health::probes::{ObjectStoreProbe, S3ObjectStoreClient, S3Settings};

    let Some(bucket) = config.s3_bucket.clone() else {
        warn!("S3_BUCKET not set; object store probe disabled");
        return;
    };

    let settings = S3Settings {
        endpoint: config.s3_endpoint.clone(),
        region: Some(config.s3_region.clone()),
        access_key: config.s3_access_key.clone(),
        secret_key: config.s3_secret_key.clone(),
        force_path_style: config.s3_endpoint.is_some(),
    };
    let client = S3ObjectStoreClient::from_settings(&settings).await;
    aggregator.add_probe(Arc::new(
        ObjectStoreProbe::new(Arc::new(client), bucket).with_timeout(health.probe_timeout),
    ));
}

#[cfg(not(feature = "s3"))]
async fn add_object_store_probe(
    _aggregator: &mut HealthAggregator,
    config: &ServerConfig,
    _health: &HealthConfig,
) {
    if config.s3_bucket.is_some() {
        warn!("S3_BUCKET is set but the 's3' feature is disabled; object store probe disabled");
    }
}

/// Self-check reporting this binary's version.
fn self_check_probe(health: &HealthConfig) -> SelfCheckProbe {
    SelfCheckProbe::new(health.required_env.clone()).with_version(env!("CARGO_PKG_VERSION"))
}

/// Builds the aggregator: storage, self-check, cache and object store as
/// primary probes; job queues, scratch directory and alerting as auxiliary.
async fn build_aggregator(config: &ServerConfig, storage: StorageProbe) -> HealthAggregator {
    let health = config.health_config();

    let mut aggregator = HealthAggregator::new()
        .with_probe(storage)
        .with_probe(self_check_probe(&health))
        .with_auxiliary_probe(
            ScratchDirProbe::new(health.scratch_dir.clone()).with_timeout(health.probe_timeout),
        )
        .with_auxiliary_probe(AlertingProbe::new(health.alerting_env.clone()));

    add_cache_probes(&mut aggregator, config, &health).await;
    add_object_store_probe(&mut aggregator, config, &health).await;

    aggregator
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(err) = config.validate() {
        eprintln!("{}", err);
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        storage = if config.database_url.is_some() { "postgres" } else { "memory" },
        probe_timeout_ms = config.probe_timeout.as_millis() as u64,
        "Starting operations console"
    );

    let backend = create_backend(&config).await?;
    let storage = StorageProbe::new(backend).with_timeout(config.probe_timeout);
    let aggregator = build_aggregator(&config, storage.clone()).await;

    let state = AppState::new(aggregator, Arc::new(storage), config.clone());
    serve(create_app(state), &config).await?;

    info!("Server stopped");
    Ok(())
}
