//! Configuration for the health probes.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::DEFAULT_PROBE_TIMEOUT;

/// Settings shared by the built-in probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Timeout for each probe.
    #[serde(with = "humantime_serde", default = "default_probe_timeout")]
    pub probe_timeout: Duration,

    /// Environment variables the self-check requires.
    #[serde(default = "default_required_env")]
    pub required_env: Vec<String>,

    /// Directory the scratch probe must be able to write to.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Key prefix of background job queues in the cache.
    #[serde(default = "default_job_queue_prefix")]
    pub job_queue_prefix: String,

    /// Environment variables naming external alerting integrations.
    #[serde(default = "default_alerting_env")]
    pub alerting_env: Vec<String>,
}

fn default_probe_timeout() -> Duration {
    DEFAULT_PROBE_TIMEOUT
}

fn default_required_env() -> Vec<String> {
    [
        "OPSCONSOLE_DATABASE_URL",
        "OPSCONSOLE_REDIS_URL",
        "OPSCONSOLE_JWT_SECRET",
        "OPSCONSOLE_S3_ENDPOINT",
        "OPSCONSOLE_S3_ACCESS_KEY",
        "OPSCONSOLE_S3_SECRET_KEY",
        "OPSCONSOLE_S3_BUCKET",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("opsconsole")
}

fn default_job_queue_prefix() -> String {
    "bull:".to_string()
}

fn default_alerting_env() -> Vec<String> {
    ["SENTRY_DSN", "LOGROCKET_APP_ID", "BUGSNAG_API_KEY"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout: default_probe_timeout(),
            required_env: default_required_env(),
            scratch_dir: default_scratch_dir(),
            job_queue_prefix: default_job_queue_prefix(),
            alerting_env: default_alerting_env(),
        }
    }
}

/// Serde module for Duration with humantime format.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
