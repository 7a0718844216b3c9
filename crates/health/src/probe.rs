//! The probe contract.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::status::ProbeResult;

/// Timeout applied to probes that do not choose their own.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Checks one subsystem.
///
/// Implementations report what they find as a [`ProbeResult`] and return
/// [`ProbeError`] when the check itself fails. They do not need to enforce
/// their own timeout or catch panics; the aggregator does both.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use opsconsole_health::{Probe, ProbeError, ProbeResult};
///
/// #[derive(Debug)]
/// struct AlwaysUp;
///
/// #[async_trait]
/// impl Probe for AlwaysUp {
///     fn name(&self) -> &str {
///         "always_up"
///     }
///
///     async fn check(&self) -> Result<ProbeResult, ProbeError> {
///         Ok(ProbeResult::healthy())
///     }
/// }
/// ```
#[async_trait]
pub trait Probe: Send + Sync + Debug {
    /// Key under which the result is reported.
    fn name(&self) -> &str;

    /// Upper bound on one check.
    fn timeout(&self) -> Duration {
        DEFAULT_PROBE_TIMEOUT
    }

    /// Runs the check.
    async fn check(&self) -> Result<ProbeResult, ProbeError>;
}
