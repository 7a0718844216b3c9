//! Error types for probes and the clients they drive.

use serde_json::{Map, Value};
use thiserror::Error;

/// Failure of a single probe.
///
/// Never escapes the aggregator: it is turned into an unhealthy
/// [`ProbeResult`](crate::ProbeResult) that keeps `details` for diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ProbeError {
    message: String,
    details: Option<Map<String, Value>>,
}

impl ProbeError {
    /// Creates an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// Attaches one partial detail gathered before the failure.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the partial details, if any.
    pub fn details(&self) -> Option<&Map<String, Value>> {
        self.details.as_ref()
    }

    pub(crate) fn into_parts(self) -> (String, Option<Map<String, Value>>) {
        (self.message, self.details)
    }
}

/// Errors from the clients probes talk to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The service could not be reached.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The target (bucket, key) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service rejected or failed a command.
    #[error("command failed: {0}")]
    Command(String),
}

impl From<ClientError> for ProbeError {
    fn from(err: ClientError) -> Self {
        ProbeError::new(err.to_string())
    }
}
