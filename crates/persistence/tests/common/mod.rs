//! Test infrastructure for the gateway tests.
//!
//! Builds gateways over the in-process backend and seeds rows through the
//! gateway itself, so fixtures obey the same policy as the code under test.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use opsconsole_persistence::backends::memory::{MemoryBackend, MemoryConfig};
use opsconsole_persistence::gateway::{GatewayConfig, TenantIsolationGateway};
use opsconsole_persistence::tenant::{TenantId, UserId};

pub type MemoryGateway = TenantIsolationGateway<MemoryBackend>;

/// Creates a gateway over a fresh in-process backend.
pub fn memory_gateway() -> (Arc<MemoryBackend>, MemoryGateway) {
    memory_gateway_with(MemoryConfig::default(), GatewayConfig::default())
}

/// Creates a gateway with explicit backend and gateway configuration.
pub fn memory_gateway_with(
    backend_config: MemoryConfig,
    gateway_config: GatewayConfig,
) -> (Arc<MemoryBackend>, MemoryGateway) {
    let backend = Arc::new(MemoryBackend::with_config(backend_config));
    let gateway = TenantIsolationGateway::new(Arc::clone(&backend), gateway_config);
    (backend, gateway)
}

/// Returns a fresh random tenant identifier.
pub fn new_tenant() -> String {
    TenantId::generate().to_string()
}

/// Returns a fresh random user identifier.
pub fn new_user() -> String {
    UserId::generate().to_string()
}

/// Inserts one `orders` row per id for `tenant`.
pub async fn seed_orders(gateway: &MemoryGateway, tenant: &str, ids: &[&str]) {
    let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
    gateway
        .run_scoped(tenant, move |mut session| {
            Box::pin(async move {
                for id in ids {
                    session.insert("orders", &id, json!({ "id": id }))?;
                }
                anyhow::Ok(())
            })
        })
        .await
        .expect("seeding orders failed");
}

/// Counts visible `orders` rows for `tenant`.
pub async fn count_orders(gateway: &MemoryGateway, tenant: &str) -> usize {
    gateway
        .run_scoped(tenant, |session| {
            Box::pin(async move { anyhow::Ok(session.count("orders")) })
        })
        .await
        .expect("counting orders failed")
}

/// Counts how many times an operation was invoked.
#[derive(Clone, Default)]
pub struct InvocationCounter(Arc<AtomicUsize>);

impl InvocationCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
