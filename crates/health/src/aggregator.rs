//! Concurrent probe execution and status reduction.
//!
//! Every probe runs in its own task under its own timeout. A probe that
//! errors, hangs or panics is reported as unhealthy and nothing else is
//! affected. The aggregator waits for the whole set, then reduces it:
//!
//! | Any unhealthy | Any degraded | Overall |
//! |---------------|--------------|---------|
//! | yes | - | `unhealthy` |
//! | no | yes | `degraded` |
//! | no | no | `healthy` |

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::metrics::{MetricsCollector, ProcessMetrics};
use crate::probe::Probe;
use crate::status::{HealthStatus, ProbeResult};

/// Reduction of the primary probes plus process metrics.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Overall status of `services`.
    pub status: HealthStatus,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
    /// Result of each primary probe, by name.
    pub services: BTreeMap<String, ProbeResult>,
    /// Process metrics sampled after the probes finished.
    pub metrics: ProcessMetrics,
}

/// A [`HealthReport`] plus the auxiliary probes, reduced on their own.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthReport {
    /// The primary report. Its `status` ignores the auxiliary probes.
    #[serde(flatten)]
    pub report: HealthReport,
    /// Overall status of `additional_checks`.
    pub additional_status: HealthStatus,
    /// Result of each auxiliary probe, by name.
    pub additional_checks: BTreeMap<String, ProbeResult>,
}

/// Runs a fixed set of probes and reduces their results.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use opsconsole_health::{HealthAggregator, HealthStatus, Probe, ProbeError, ProbeResult};
///
/// #[derive(Debug)]
/// struct Failing;
///
/// #[async_trait]
/// impl Probe for Failing {
///     fn name(&self) -> &str {
///         "cache"
///     }
///
///     async fn check(&self) -> Result<ProbeResult, ProbeError> {
///         Err(ProbeError::new("connection refused"))
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let aggregator = HealthAggregator::new().with_probe(Failing);
/// let report = aggregator.check_health().await;
/// assert_eq!(report.status, HealthStatus::Unhealthy);
/// assert_eq!(report.services["cache"].error(), Some("connection refused"));
/// # });
/// ```
pub struct HealthAggregator {
    primary: Vec<Arc<dyn Probe>>,
    auxiliary: Vec<Arc<dyn Probe>>,
    metrics: MetricsCollector,
}

impl fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("primary", &names(&self.primary))
            .field("auxiliary", &names(&self.auxiliary))
            .finish_non_exhaustive()
    }
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthAggregator {
    /// Creates an aggregator with no probes. Uptime is measured from here.
    pub fn new() -> Self {
        Self {
            primary: Vec::new(),
            auxiliary: Vec::new(),
            metrics: MetricsCollector::new(),
        }
    }

    /// Adds a primary probe.
    pub fn with_probe(mut self, probe: impl Probe + 'static) -> Self {
        self.add_probe(Arc::new(probe));
        self
    }

    /// Adds an auxiliary probe, reported only by the detailed check.
    pub fn with_auxiliary_probe(mut self, probe: impl Probe + 'static) -> Self {
        self.add_auxiliary_probe(Arc::new(probe));
        self
    }

    /// Adds a shared primary probe. A probe with the same name is replaced.
    pub fn add_probe(&mut self, probe: Arc<dyn Probe>) {
        insert_probe(&mut self.primary, probe);
    }

    /// Adds a shared auxiliary probe. A probe with the same name is replaced.
    pub fn add_auxiliary_probe(&mut self, probe: Arc<dyn Probe>) {
        insert_probe(&mut self.auxiliary, probe);
    }

    /// Names of the primary probes, in registration order.
    pub fn probe_names(&self) -> Vec<&str> {
        names(&self.primary)
    }

    /// Names of the auxiliary probes, in registration order.
    pub fn auxiliary_probe_names(&self) -> Vec<&str> {
        names(&self.auxiliary)
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Probes every primary subsystem and reduces the results.
    ///
    /// Never fails. Dropping the returned future aborts probes still running.
    pub async fn check_health(&self) -> HealthReport {
        let services = run_all(&self.primary).await;
        self.report(services)
    }

    /// Like [`check_health`](Self::check_health), plus the auxiliary probes.
    ///
    /// Both sets run at the same time and are reduced independently.
    pub async fn check_detailed_health(&self) -> DetailedHealthReport {
        let (services, additional_checks) =
            tokio::join!(run_all(&self.primary), run_all(&self.auxiliary));

        let additional_status = reduce(&additional_checks);
        DetailedHealthReport {
            report: self.report(services),
            additional_status,
            additional_checks,
        }
    }

    fn report(&self, services: BTreeMap<String, ProbeResult>) -> HealthReport {
        HealthReport {
            status: reduce(&services),
            timestamp: Utc::now(),
            services,
            metrics: self.metrics.sample(),
        }
    }
}

fn names(probes: &[Arc<dyn Probe>]) -> Vec<&str> {
    probes.iter().map(|p| p.name()).collect()
}

fn insert_probe(probes: &mut Vec<Arc<dyn Probe>>, probe: Arc<dyn Probe>) {
    if let Some(existing) = probes.iter_mut().find(|p| p.name() == probe.name()) {
        warn!(probe = probe.name(), "Replacing probe registered under the same name");
        *existing = probe;
    } else {
        probes.push(probe);
    }
}

fn reduce(results: &BTreeMap<String, ProbeResult>) -> HealthStatus {
    HealthStatus::reduce(results.values().map(ProbeResult::status))
}

/// Runs every probe in its own task and collects all results.
async fn run_all(probes: &[Arc<dyn Probe>]) -> BTreeMap<String, ProbeResult> {
    let mut tasks = JoinSet::new();
    for probe in probes {
        tasks.spawn(run_isolated(Arc::clone(probe)));
    }

    let mut results = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, result)) => {
                results.insert(name, result);
            }
            Err(e) => error!(error = %e, "Probe task failed to complete"),
        }
    }

    for probe in probes {
        results
            .entry(probe.name().to_string())
            .or_insert_with(|| ProbeResult::unhealthy("probe task failed to complete"));
    }
    results
}

/// Runs one probe under its timeout, turning every failure into a result.
///
/// Response time is filled in from the wall clock when the probe did not
/// report one.
pub async fn run_isolated(probe: Arc<dyn Probe>) -> (String, ProbeResult) {
    let name = probe.name().to_string();
    let timeout = probe.timeout();
    let start = Instant::now();

    let outcome = AssertUnwindSafe(tokio::time::timeout(timeout, probe.check()))
        .catch_unwind()
        .await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let result = match outcome {
        Ok(Ok(Ok(result))) => {
            let result = match result.response_time_ms() {
                Some(_) => result,
                None => result.with_response_time_ms(elapsed_ms),
            };
            if result.status().is_healthy() {
                debug!(probe = %name, response_time_ms = elapsed_ms, "Probe healthy");
            } else {
                warn!(
                    probe = %name,
                    status = %result.status(),
                    error = result.error().unwrap_or_default(),
                    "Probe reported non-healthy status"
                );
            }
            result
        }
        Ok(Ok(Err(err))) => {
            warn!(probe = %name, error = %err, "Probe failed");
            let (message, details) = err.into_parts();
            let result = ProbeResult::unhealthy(message).with_response_time_ms(elapsed_ms);
            match details {
                Some(details) => result.with_details(details),
                None => result,
            }
        }
        Ok(Err(_)) => {
            let message = format!("timed out after {}", humantime::format_duration(timeout));
            warn!(probe = %name, timeout_ms = timeout.as_millis() as u64, "Probe timed out");
            ProbeResult::unhealthy(message).with_response_time_ms(elapsed_ms)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(probe = %name, panic = %message, "Probe panicked");
            ProbeResult::unhealthy(format!("probe panicked: {}", message))
                .with_response_time_ms(elapsed_ms)
        }
    };

    (name, result)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
