//! Operations Console Health
//!
//! Runs a set of health probes concurrently and reduces them to one status.
//! Each probe is isolated: its own task, its own timeout, and panics caught
//! at the task boundary. A failing probe yields an unhealthy entry, never an
//! aggregator error.
//!
//! # Client Features
//!
//! - `redis` - [`RedisCacheClient`](probes::RedisCacheClient) for the cache and job queue probes
//! - `s3` - [`S3ObjectStoreClient`](probes::S3ObjectStoreClient) for the object store probe
//!
//! # Architecture
//!
//! - [`aggregator`] - [`HealthAggregator`] and its reports
//! - [`probe`] - the [`Probe`] trait
//! - [`probes`] - built-in probes and the client traits they use
//! - [`status`] - [`HealthStatus`] and [`ProbeResult`]
//! - [`metrics`] - process uptime and memory sampling
//! - [`config`] - probe settings

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod aggregator;
pub mod config;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod probes;
pub mod status;

pub use aggregator::{DetailedHealthReport, HealthAggregator, HealthReport, run_isolated};
pub use config::HealthConfig;
pub use error::{ClientError, ProbeError};
pub use metrics::{MemoryMetrics, MetricsCollector, ProcessMetrics};
pub use probe::{DEFAULT_PROBE_TIMEOUT, Probe};
pub use status::{HealthStatus, ProbeResult};
