//! Shared fixtures for health integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use opsconsole_health::probes::{CacheClient, ObjectStoreClient};
use opsconsole_health::{ClientError, HealthStatus, Probe, ProbeError, ProbeResult};
use parking_lot::Mutex;

/// Probe returning a fixed status after an optional delay.
#[derive(Debug)]
pub struct StaticProbe {
    pub name: String,
    pub status: HealthStatus,
    pub delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl StaticProbe {
    pub fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Probe for StaticProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.status {
            HealthStatus::Unhealthy => Err(ProbeError::new(format!("{} is down", self.name))),
            status => Ok(ProbeResult::new(status)),
        }
    }
}

/// Probe that never completes.
#[derive(Debug)]
pub struct HangingProbe {
    pub name: String,
    pub timeout: Duration,
    pub dropped: Arc<AtomicBool>,
}

impl HangingProbe {
    pub fn new(name: &str, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            timeout,
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Probe for HangingProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let _guard = SetOnDrop(Arc::clone(&self.dropped));
        std::future::pending::<Result<ProbeResult, ProbeError>>().await
    }
}

/// Probe that panics inside `check`.
#[derive(Debug)]
pub struct PanickingProbe(pub &'static str);

#[async_trait]
impl Probe for PanickingProbe {
    fn name(&self) -> &str {
        self.0
    }

    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        panic!("{} exploded", self.0);
    }
}

/// In-memory cache client.
#[derive(Debug, Default)]
pub struct FakeCache {
    pub entries: Mutex<HashMap<String, String>>,
    pub info: String,
    pub down: AtomicBool,
    pub corrupt_reads: AtomicBool,
    pub last_ttl: Mutex<Option<Duration>>,
}

impl FakeCache {
    pub fn new() -> Self {
        Self {
            info: "# Server\r\nredis_version:7.2.4\r\n# Memory\r\nused_memory_human:1.05M\r\n# Clients\r\nconnected_clients:4\r\n".to_string(),
            ..Default::default()
        }
    }

    pub fn with_keys(self, keys: &[&str]) -> Self {
        {
            let mut entries = self.entries.lock();
            for key in keys {
                entries.insert(key.to_string(), String::new());
            }
        }
        self
    }

    fn check_up(&self) -> Result<(), ClientError> {
        if self.down.load(Ordering::SeqCst) {
            Err(ClientError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

fn glob_prefix(pattern: &str) -> &str {
    pattern.strip_suffix('*').unwrap_or(pattern)
}

#[async_trait]
impl CacheClient for FakeCache {
    async fn ping(&self) -> Result<String, ClientError> {
        self.check_up()?;
        Ok("PONG".to_string())
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), ClientError> {
        self.check_up()?;
        *self.last_ttl.lock() = Some(ttl);
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        self.check_up()?;
        if self.corrupt_reads.load(Ordering::SeqCst) {
            return Ok(Some("garbage".to_string()));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), ClientError> {
        self.check_up()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn info(&self) -> Result<String, ClientError> {
        self.check_up()?;
        Ok(self.info.clone())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, ClientError> {
        self.check_up()?;
        let prefix = glob_prefix(pattern);
        Ok(self
            .entries
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Object store client with a fixed set of buckets.
#[derive(Debug)]
pub struct FakeObjectStore {
    pub buckets: Vec<String>,
    pub endpoint: Option<String>,
}

#[async_trait]
impl ObjectStoreClient for FakeObjectStore {
    async fn head_bucket(&self, bucket: &str) -> Result<(), ClientError> {
        if self.buckets.iter().any(|b| b == bucket) {
            Ok(())
        } else {
            Err(ClientError::NotFound(format!("bucket {}", bucket)))
        }
    }

    fn endpoint(&self) -> Option<String> {
        self.endpoint.clone()
    }
}
