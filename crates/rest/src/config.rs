//! Server configuration for the operations console.
//!
//! Built from command line arguments or environment variables with
//! [`ServerConfig::parse`], or programmatically.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OPSCONSOLE_PORT` | 3001 | Server port |
//! | `OPSCONSOLE_HOST` | 127.0.0.1 | Host to bind |
//! | `OPSCONSOLE_LOG_LEVEL` | info | Log level |
//! | `OPSCONSOLE_REQUEST_TIMEOUT` | 30s | Request timeout |
//! | `OPSCONSOLE_ENABLE_CORS` | true | Enable CORS |
//! | `OPSCONSOLE_CORS_ORIGINS` | * | Allowed origins |
//! | `OPSCONSOLE_ENABLE_REQUEST_ID` | true | Set and propagate `x-request-id` |
//! | `OPSCONSOLE_DATABASE_URL` | - | PostgreSQL URL; in-memory storage when unset |
//! | `OPSCONSOLE_PROBE_TIMEOUT` | 5s | Per-probe timeout |
//! | `OPSCONSOLE_SCRATCH_DIR` | `$TMPDIR/opsconsole` | Directory the file system probe writes to |
//! | `REDIS_URL` | - | Cache and job queue URL |
//! | `S3_ENDPOINT` | - | Object store endpoint |
//! | `S3_REGION` | us-east-1 | Object store region |
//! | `S3_ACCESS_KEY` / `S3_SECRET_KEY` | - | Object store credentials |
//! | `S3_BUCKET` | - | Bucket checked by the object store probe |

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use opsconsole_health::HealthConfig;

use crate::error::{RestError, RestResult};

/// Server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "opsconsole")]
#[command(about = "Operations console API server")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "OPSCONSOLE_PORT", default_value = "3001")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "OPSCONSOLE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "OPSCONSOLE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout, e.g. `30s`.
    #[arg(long, env = "OPSCONSOLE_REQUEST_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub request_timeout: Duration,

    /// Enable CORS.
    #[arg(long, env = "OPSCONSOLE_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "OPSCONSOLE_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(long, env = "OPSCONSOLE_CORS_METHODS", default_value = "GET,OPTIONS")]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "OPSCONSOLE_CORS_HEADERS",
        default_value = "Content-Type,Authorization,Accept,X-Request-Id"
    )]
    pub cors_headers: String,

    /// Set and propagate the `x-request-id` header.
    #[arg(long, env = "OPSCONSOLE_ENABLE_REQUEST_ID", default_value = "true")]
    pub enable_request_id: bool,

    /// PostgreSQL connection string. In-memory storage when unset.
    #[arg(long, env = "OPSCONSOLE_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Redis URL for the cache and job queue probes.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Object store endpoint, e.g. a MinIO URL.
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Object store region.
    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    /// Object store access key.
    #[arg(long, env = "S3_ACCESS_KEY")]
    pub s3_access_key: Option<String>,

    /// Object store secret key.
    #[arg(long, env = "S3_SECRET_KEY", hide_env_values = true)]
    pub s3_secret_key: Option<String>,

    /// Bucket checked by the object store probe.
    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Per-probe timeout, e.g. `5s`.
    #[arg(long, env = "OPSCONSOLE_PROBE_TIMEOUT", default_value = "5s", value_parser = humantime::parse_duration)]
    pub probe_timeout: Duration,

    /// Directory the file system probe writes to.
    #[arg(long, env = "OPSCONSOLE_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            request_timeout: Duration::from_secs(30),
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,OPTIONS".to_string(),
            cors_headers: "Content-Type,Authorization,Accept,X-Request-Id".to_string(),
            enable_request_id: true,
            database_url: None,
            redis_url: None,
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_access_key: None,
            s3_secret_key: None,
            s3_bucket: None,
            probe_timeout: Duration::from_secs(5),
            scratch_dir: None,
        }
    }
}

impl ServerConfig {
    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Probe settings derived from this configuration.
    pub fn health_config(&self) -> HealthConfig {
        let mut health = HealthConfig {
            probe_timeout: self.probe_timeout,
            ..Default::default()
        };
        if let Some(dir) = &self.scratch_dir {
            health.scratch_dir = dir.clone();
        }
        health
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> RestResult<()> {
        let mut errors = Vec::new();

        if self.request_timeout.is_zero() {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.probe_timeout.is_zero() {
            errors.push("Probe timeout cannot be 0".to_string());
        }

        if self.probe_timeout >= self.request_timeout {
            errors.push("Probe timeout must be shorter than the request timeout".to_string());
        }

        if self.s3_access_key.is_some() != self.s3_secret_key.is_some() {
            errors.push("S3 access key and secret key must be set together".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RestError::InvalidConfig { errors })
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// Uses ephemeral port 0 and disables CORS and request ids.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            log_level: "debug".to_string(),
            request_timeout: Duration::from_secs(5),
            enable_cors: false,
            enable_request_id: false,
            probe_timeout: Duration::from_secs(1),
            ..Default::default()
        }
    }
}
