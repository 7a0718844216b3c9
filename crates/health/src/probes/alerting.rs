//! External alerting integrations probe.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::probe::Probe;
use crate::probes::self_check::{EnvLookup, process_env};
use crate::status::ProbeResult;

/// Reports which alerting integrations are configured.
///
/// Degraded when none are. Details: `configuredServices`, `services`.
#[derive(Clone)]
pub struct AlertingProbe {
    variables: Vec<String>,
    lookup: EnvLookup,
}

impl fmt::Debug for AlertingProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertingProbe")
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

impl AlertingProbe {
    /// Creates a probe over the given integration variables.
    pub fn new(variables: Vec<String>) -> Self {
        Self {
            variables,
            lookup: process_env(),
        }
    }

    /// Replaces the variable lookup.
    pub fn with_lookup(mut self, lookup: EnvLookup) -> Self {
        self.lookup = lookup;
        self
    }
}

#[async_trait]
impl Probe for AlertingProbe {
    fn name(&self) -> &str {
        "externalServices"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let configured: Vec<&str> = self
            .variables
            .iter()
            .filter(|name| (self.lookup)(name).is_some())
            .map(String::as_str)
            .collect();

        let result = if configured.is_empty() {
            ProbeResult::degraded()
        } else {
            ProbeResult::healthy()
        };

        Ok(result
            .with_detail("configuredServices", configured.len())
            .with_detail("services", configured))
    }
}
