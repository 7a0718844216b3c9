//! Local self-check probe.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::probe::Probe;
use crate::status::ProbeResult;

/// Looks up a configuration variable by name.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads the process environment. Empty values count as missing.
pub fn process_env() -> EnvLookup {
    Arc::new(|name: &str| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

/// Checks that required configuration is present.
///
/// Healthy details: `version`, `platform`, `uptimeSeconds`.
#[derive(Clone)]
pub struct SelfCheckProbe {
    required: Vec<String>,
    lookup: EnvLookup,
    version: String,
    started: Instant,
}

impl fmt::Debug for SelfCheckProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfCheckProbe")
            .field("required", &self.required)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl SelfCheckProbe {
    /// Creates a probe that reads the process environment.
    pub fn new(required: Vec<String>) -> Self {
        Self {
            required,
            lookup: process_env(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started: Instant::now(),
        }
    }

    /// Replaces the variable lookup.
    pub fn with_lookup(mut self, lookup: EnvLookup) -> Self {
        self.lookup = lookup;
        self
    }

    /// Sets the version reported in details.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Names of required variables that are not set.
    pub fn missing(&self) -> Vec<&str> {
        self.required
            .iter()
            .filter(|name| (self.lookup)(name).is_none())
            .map(String::as_str)
            .collect()
    }
}

#[async_trait]
impl Probe for SelfCheckProbe {
    fn name(&self) -> &str {
        "api"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(ProbeError::new(format!(
                "missing environment variables: {}",
                missing.join(", ")
            ))
            .with_detail("missing", missing));
        }

        Ok(ProbeResult::healthy()
            .with_detail("version", self.version.clone())
            .with_detail("platform", std::env::consts::OS)
            .with_detail("uptimeSeconds", self.started.elapsed().as_secs()))
    }
}
