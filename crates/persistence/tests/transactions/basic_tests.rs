//! Tests for per-call transactions and commit behaviour.

use std::time::Duration;

use serde_json::json;
use tokio::sync::oneshot;

use opsconsole_persistence::backends::memory::MemoryConfig;
use opsconsole_persistence::error::{BackendError, GatewayError};
use opsconsole_persistence::gateway::GatewayConfig;

use crate::common::*;

// ============================================================================
// Commit Tests
// ============================================================================

/// Test that committed writes are visible to later calls.
#[tokio::test]
async fn test_committed_writes_visible_to_next_call() {
    let (backend, gateway) = memory_gateway();
    let tenant = new_tenant();

    seed_orders(&gateway, &tenant, &["o-1", "o-2"]).await;

    assert_eq!(count_orders(&gateway, &tenant).await, 2);
    assert_eq!(backend.transactions_committed(), 2);
}

/// Test that uncommitted writes are visible inside the same call.
#[tokio::test]
async fn test_writes_visible_within_call() {
    let (_backend, gateway) = memory_gateway();

    let seen = gateway
        .run_scoped(&new_tenant(), |mut session| {
            Box::pin(async move {
                session.insert("orders", "o-1", json!({}))?;
                session.insert("orders", "o-2", json!({}))?;
                session.delete("orders", "o-1")?;
                anyhow::Ok(session.count("orders"))
            })
        })
        .await
        .unwrap();

    assert_eq!(seen, 1);
}

/// Test that every call opens exactly one transaction of its own.
#[tokio::test]
async fn test_one_transaction_per_call() {
    let (backend, gateway) = memory_gateway();
    let tenant = new_tenant();

    for _ in 0..5 {
        gateway
            .run_scoped(&tenant, |_session| Box::pin(async move { anyhow::Ok(()) }))
            .await
            .unwrap();
    }
    gateway
        .run_unscoped_as_user(&new_user(), |_session| Box::pin(async move { anyhow::Ok(()) }))
        .await
        .unwrap();

    assert_eq!(backend.transactions_begun(), 6);
    assert_eq!(backend.transactions_committed(), 6);
}

/// Test that the operation's value is returned unchanged.
#[tokio::test]
async fn test_returns_operation_value() {
    let (_backend, gateway) = memory_gateway();

    let value = gateway
        .run_scoped(&new_tenant(), |_session| {
            Box::pin(async move { anyhow::Ok(vec!["a".to_string(), "b".to_string()]) })
        })
        .await
        .unwrap();

    assert_eq!(value, vec!["a", "b"]);
}

// ============================================================================
// Variable Lifetime Tests
// ============================================================================

/// Test that the binding never lands on the pooled connection itself.
#[tokio::test]
async fn test_connection_settings_never_written() {
    let (backend, gateway) = memory_gateway();

    seed_orders(&gateway, &new_tenant(), &["o-1"]).await;
    gateway
        .run_scoped_with_user(&new_tenant(), &new_user(), |_session| {
            Box::pin(async move { anyhow::Ok(()) })
        })
        .await
        .unwrap();

    let settings = backend.idle_session_settings();
    assert!(!settings.is_empty());
    assert!(settings.iter().all(|s| s.is_empty()));
}

/// Test that variables from one call are gone by the next one on the same
/// connection.
#[tokio::test]
async fn test_variables_cleared_between_calls() {
    let (backend, gateway) = memory_gateway_with(
        MemoryConfig {
            max_connections: 1,
            ..Default::default()
        },
        GatewayConfig::default(),
    );
    let tenant_a = new_tenant();
    let tenant_b = new_tenant();

    seed_orders(&gateway, &tenant_a, &["a-1"]).await;

    let (connection, bound, visible) = gateway
        .run_scoped(&tenant_b, |session| {
            Box::pin(async move {
                anyhow::Ok((
                    session.connection_id(),
                    session.current_setting("app.tenant_id"),
                    session.count("orders"),
                ))
            })
        })
        .await
        .unwrap();

    assert_eq!(connection, Some(0));
    assert_eq!(bound.as_deref(), Some(tenant_b.as_str()));
    assert_eq!(visible, 0);
    assert_eq!(backend.connections_opened(), 1);
}

/// Test that a stale connection-level tenant setting is shadowed by the
/// transaction binding.
#[tokio::test]
async fn test_transaction_binding_shadows_connection_setting() {
    let (backend, gateway) = memory_gateway_with(
        MemoryConfig {
            max_connections: 1,
            ..Default::default()
        },
        GatewayConfig::default(),
    );
    let stale = new_tenant();
    let tenant = new_tenant();

    seed_orders(&gateway, &stale, &["s-1"]).await;
    backend.set_session_setting("app.tenant_id", &stale);

    let visible = count_orders(&gateway, &tenant).await;
    assert_eq!(visible, 0);
}

/// Test that a read-only gateway rejects writes and keeps reads working.
#[tokio::test]
async fn test_read_only_config_rejects_writes() {
    let (backend, gateway) = memory_gateway();
    let tenant = new_tenant();
    seed_orders(&gateway, &tenant, &["o-1"]).await;

    let reader = opsconsole_persistence::TenantIsolationGateway::new(
        std::sync::Arc::clone(&backend),
        GatewayConfig {
            read_only: true,
            ..Default::default()
        },
    );

    assert_eq!(count_orders(&reader, &tenant).await, 1);

    let err = reader
        .run_scoped(&tenant, |mut session| {
            Box::pin(async move {
                session.insert("orders", "o-2", json!({}))?;
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();

    let inner = err
        .operation_error()
        .and_then(|e| e.downcast_ref::<BackendError>());
    assert!(matches!(inner, Some(BackendError::RejectedStatement { .. })));
    assert_eq!(backend.rows_unchecked("orders").len(), 1);
}

// ============================================================================
// Pool Tests
// ============================================================================

/// Test that waiting too long for a connection is a transient begin failure.
#[tokio::test]
async fn test_pool_exhaustion_is_transient() {
    let (backend, gateway) = memory_gateway_with(
        MemoryConfig {
            max_connections: 1,
            ..Default::default()
        },
        GatewayConfig {
            acquire_timeout: Duration::from_millis(50),
            ..Default::default()
        },
    );
    let tenant = new_tenant();

    let (started_tx, started_rx) = oneshot::channel::<()>();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let holder = {
        let gateway = gateway.clone();
        let tenant = tenant.clone();
        tokio::spawn(async move {
            gateway
                .run_scoped(&tenant, move |_session| {
                    Box::pin(async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        anyhow::Ok(())
                    })
                })
                .await
        })
    };
    started_rx.await.unwrap();

    let counter = InvocationCounter::default();
    let hits = counter.clone();
    let err = gateway
        .run_scoped(&tenant, move |_session| {
            Box::pin(async move {
                hits.hit();
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GatewayError::Begin(BackendError::PoolExhausted { .. })
    ));
    assert!(err.is_transient());
    assert_eq!(counter.count(), 0);

    release_tx.send(()).unwrap();
    holder.await.unwrap().unwrap();

    // The released connection serves the next call.
    assert_eq!(count_orders(&gateway, &tenant).await, 0);
    assert_eq!(backend.connections_opened(), 1);
}

/// Test that invalid input never consumes a connection.
#[tokio::test]
async fn test_invalid_tenant_never_begins() {
    let (backend, gateway) = memory_gateway();
    let counter = InvocationCounter::default();

    for bad in ["", " 6f9619ff-8b86-d011-b42d-00c04fc964ff", "tenant-a"] {
        let hits = counter.clone();
        let err = gateway
            .run_scoped(bad, move |_session| {
                Box::pin(async move {
                    hits.hit();
                    anyhow::Ok(())
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidTenant { .. }));
        assert!(!err.is_transient());
    }

    assert_eq!(counter.count(), 0);
    assert_eq!(backend.transactions_begun(), 0);
    assert_eq!(backend.connections_opened(), 0);
}
