//! Process-level metrics attached to every report.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};
use tracing::warn;

/// Memory usage of the process against the memory of the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    /// Resident memory of this process, in bytes.
    pub used: u64,
    /// Total memory of the host, in bytes.
    pub total: u64,
    /// `used` as a rounded percentage of `total`.
    pub percentage: u8,
}

impl MemoryMetrics {
    /// Builds metrics from raw byte counts.
    pub fn from_bytes(used: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((used as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        Self {
            used,
            total,
            percentage,
        }
    }
}

/// Snapshot of process metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    /// Milliseconds since the aggregator was created.
    pub uptime: u64,
    /// Memory usage.
    pub memory: MemoryMetrics,
}

/// Samples process metrics.
///
/// Holds one `sysinfo` handle and refreshes only memory and this process on
/// each sample.
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Creates a collector whose uptime starts now.
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(error = %e, "Failed to get current process id, memory metrics disabled");
                None
            }
        };
        Self {
            started: Instant::now(),
            pid,
            system: Mutex::new(System::new()),
        }
    }

    /// Time since the collector was created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Takes a snapshot. Memory figures are zero when they cannot be read.
    pub fn sample(&self) -> ProcessMetrics {
        let memory = {
            let mut system = self.system.lock();
            system.refresh_memory();
            let used = self
                .pid
                .and_then(|pid| {
                    system.refresh_process(pid);
                    system.process(pid).map(|p| p.memory())
                })
                .unwrap_or(0);
            MemoryMetrics::from_bytes(used, system.total_memory())
        };

        ProcessMetrics {
            uptime: self.uptime().as_millis() as u64,
            memory,
        }
    }
}
