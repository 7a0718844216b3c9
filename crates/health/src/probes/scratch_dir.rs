//! Scratch directory writability probe.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::probe::{DEFAULT_PROBE_TIMEOUT, Probe};
use crate::status::ProbeResult;

/// Creates the scratch directory, then writes and removes a marker file.
///
/// Healthy details: `tempDirectory`, `writable`.
#[derive(Debug, Clone)]
pub struct ScratchDirProbe {
    dir: PathBuf,
    timeout: Duration,
}

impl ScratchDirProbe {
    /// Creates a probe over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn io_error(&self, step: &str, err: std::io::Error) -> ProbeError {
        ProbeError::new(format!("failed to {}: {}", step, err))
            .with_detail("tempDirectory", self.dir.display().to_string())
            .with_detail("writable", false)
    }
}

#[async_trait]
impl Probe for ScratchDirProbe {
    fn name(&self) -> &str {
        "fileSystem"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let start = Instant::now();

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.io_error("create scratch directory", e))?;

        let marker = self
            .dir
            .join(format!("health-check-{}.txt", uuid::Uuid::new_v4().simple()));
        // The blocking task finishes even if this check is cancelled.
        tokio::task::spawn_blocking(move || write_and_remove(&marker))
            .await
            .map_err(|e| {
                ProbeError::new(format!("marker file task failed: {}", e))
                    .with_detail("tempDirectory", self.dir.display().to_string())
                    .with_detail("writable", false)
            })?
            .map_err(|(step, e)| self.io_error(step, e))?;

        Ok(ProbeResult::healthy()
            .with_response_time_ms(start.elapsed().as_millis() as u64)
            .with_detail("tempDirectory", self.dir.display().to_string())
            .with_detail("writable", true))
    }
}

fn write_and_remove(path: &Path) -> Result<(), (&'static str, std::io::Error)> {
    let mut marker = MarkerGuard::new(path);
    std::fs::write(path, b"health check").map_err(|e| ("write marker file", e))?;
    std::fs::remove_file(path).map_err(|e| ("remove marker file", e))?;
    marker.disarm();
    Ok(())
}

/// Deletes the marker file on drop unless disarmed.
struct MarkerGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> MarkerGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for MarkerGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(self.path);
        }
    }
}
