//! Health statuses and per-probe results.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Health of one subsystem, or of a whole set of them.
///
/// Variants are ordered by severity, so the reduction of a set of statuses is
/// its maximum.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational.
    #[default]
    Healthy,
    /// Operational with reduced capability.
    Degraded,
    /// Not operational.
    Unhealthy,
}

impl HealthStatus {
    /// Combines two statuses: unhealthy over degraded over healthy.
    pub fn combine(self, other: HealthStatus) -> HealthStatus {
        self.max(other)
    }

    /// Reduces any number of statuses. An empty set is healthy.
    pub fn reduce<I>(statuses: I) -> HealthStatus
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses
            .into_iter()
            .fold(HealthStatus::Healthy, HealthStatus::combine)
    }

    /// Returns true for [`HealthStatus::Healthy`].
    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }

    /// Returns the lowercase name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking one subsystem.
///
/// Built by a probe or by the aggregator when a probe fails, then folded into
/// a report. There are no setters; the `with_*` builders consume the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    status: HealthStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    response_time_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Map<String, Value>>,
}

impl ProbeResult {
    /// Creates a result with the given status and nothing else.
    pub fn new(status: HealthStatus) -> Self {
        Self {
            status,
            response_time_ms: None,
            error: None,
            details: None,
        }
    }

    /// A healthy result.
    pub fn healthy() -> Self {
        Self::new(HealthStatus::Healthy)
    }

    /// A degraded result.
    pub fn degraded() -> Self {
        Self::new(HealthStatus::Degraded)
    }

    /// An unhealthy result carrying an error message.
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self::new(HealthStatus::Unhealthy).with_error(error)
    }

    /// Sets the measured response time.
    pub fn with_response_time_ms(mut self, ms: u64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    /// Sets the error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Adds one diagnostic detail.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replaces all diagnostic details.
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns the status.
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    /// Returns the measured response time, if any.
    pub fn response_time_ms(&self) -> Option<u64> {
        self.response_time_ms
    }

    /// Returns the error message, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the diagnostic details, if any.
    pub fn details(&self) -> Option<&Map<String, Value>> {
        self.details.as_ref()
    }

    /// Returns a single detail.
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.as_ref().and_then(|d| d.get(key))
    }
}
