//! Tests for rollback and the failure paths of a scoped call.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use opsconsole_persistence::backends::memory::{MemoryBackend, MemoryConfig};
use opsconsole_persistence::error::{BackendError, GatewayError};
use opsconsole_persistence::gateway::GatewayConfig;

use crate::common::*;

fn single_connection_gateway() -> (Arc<MemoryBackend>, MemoryGateway) {
    memory_gateway_with(
        MemoryConfig {
            max_connections: 1,
            ..Default::default()
        },
        GatewayConfig {
            acquire_timeout: Duration::from_millis(200),
            ..Default::default()
        },
    )
}

// ============================================================================
// Operation Failure Tests
// ============================================================================

/// Test that an operation error discards every write of the call.
#[tokio::test]
async fn test_operation_error_rolls_back() {
    let (backend, gateway) = memory_gateway();
    let tenant = new_tenant();
    seed_orders(&gateway, &tenant, &["keep"]).await;

    let err = gateway
        .run_scoped(&tenant, |mut session| {
            Box::pin(async move {
                session.insert("orders", "o-2", json!({}))?;
                session.delete("orders", "keep")?;
                if session.count("orders") > 0 {
                    anyhow::bail!("validation failed");
                }
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Operation(_)));
    assert_eq!(
        err.operation_error().map(|e| e.to_string()).as_deref(),
        Some("validation failed")
    );

    let rows = backend.rows_unchecked("orders");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "keep");
    assert_eq!(backend.transactions_committed(), 1);
}

/// Test that a storage error inside the operation is passed through.
#[tokio::test]
async fn test_storage_error_passed_through() {
    let (_backend, gateway) = memory_gateway();
    let tenant = new_tenant();
    seed_orders(&gateway, &tenant, &["o-1"]).await;

    let err = gateway
        .run_scoped(&tenant, |mut session| {
            Box::pin(async move {
                session.insert("orders", "o-1", json!({}))?;
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();

    let inner = err
        .operation_error()
        .and_then(|e| e.downcast_ref::<BackendError>());
    assert!(matches!(inner, Some(BackendError::QueryError { .. })));
    assert!(!err.is_transient());
}

// ============================================================================
// Infrastructure Failure Tests
// ============================================================================

/// Test that a failed begin is reported as transient and skips the operation.
#[tokio::test]
async fn test_begin_failure() {
    let (backend, gateway) = memory_gateway();
    backend.faults().fail_begin(true);
    let counter = InvocationCounter::default();
    let hits = counter.clone();

    let err = gateway
        .run_scoped(&new_tenant(), move |_session| {
            Box::pin(async move {
                hits.hit();
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Begin(BackendError::ConnectionFailed { .. })));
    assert!(err.is_transient());
    assert_eq!(counter.count(), 0);

    backend.faults().fail_begin(false);
    assert_eq!(count_orders(&gateway, &new_tenant()).await, 0);
}

/// Test that failing to bind the tenant aborts before the operation runs.
#[tokio::test]
async fn test_tenant_variable_failure() {
    let (backend, gateway) = single_connection_gateway();
    backend.faults().fail_set_local(Some("app.tenant_id"));
    let counter = InvocationCounter::default();
    let hits = counter.clone();

    let err = gateway
        .run_scoped(&new_tenant(), move |_session| {
            Box::pin(async move {
                hits.hit();
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();

    match &err {
        GatewayError::SessionVariable { variable, .. } => assert_eq!(variable, "app.tenant_id"),
        other => panic!("expected SessionVariable, got {:?}", other),
    }
    assert_eq!(counter.count(), 0);
    assert_eq!(backend.transactions_committed(), 0);

    // The connection went back to the pool.
    backend.faults().fail_set_local(None);
    assert_eq!(count_orders(&gateway, &new_tenant()).await, 0);
}

/// Test that failing to bind the user aborts a scoped-with-user call.
#[tokio::test]
async fn test_user_variable_failure() {
    let (backend, gateway) = single_connection_gateway();
    backend.faults().fail_set_local(Some("app.user_id"));
    let counter = InvocationCounter::default();

    let hits = counter.clone();
    let err = gateway
        .run_scoped_with_user(&new_tenant(), &new_user(), move |mut session| {
            Box::pin(async move {
                hits.hit();
                session.insert("orders", "o-1", json!({}))?;
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::SessionVariable { ref variable, .. } if variable == "app.user_id"
    ));

    let hits = counter.clone();
    let err = gateway
        .run_unscoped_as_user(&new_user(), move |_session| {
            Box::pin(async move {
                hits.hit();
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::SessionVariable { .. }));

    assert_eq!(counter.count(), 0);
    assert!(backend.rows_unchecked("orders").is_empty());

    // Plain scoped calls do not bind the user and still work.
    seed_orders(&gateway, &new_tenant(), &["o-1"]).await;
}

/// Test that a failed commit is reported and nothing is persisted.
#[tokio::test]
async fn test_commit_failure() {
    let (backend, gateway) = single_connection_gateway();
    backend.faults().fail_commit(true);

    let err = gateway
        .run_scoped(&new_tenant(), |mut session| {
            Box::pin(async move {
                session.insert("orders", "o-1", json!({}))?;
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Commit(BackendError::ConnectionFailed { .. })));
    assert!(backend.rows_unchecked("orders").is_empty());

    backend.faults().fail_commit(false);
    seed_orders(&gateway, &new_tenant(), &["o-1"]).await;
    assert_eq!(backend.rows_unchecked("orders").len(), 1);
}

// ============================================================================
// Abnormal Exit Tests
// ============================================================================

/// Test that a panicking operation leaves no trace and frees its connection.
#[tokio::test]
async fn test_panic_in_operation_rolls_back() {
    let (backend, gateway) = single_connection_gateway();
    let tenant = new_tenant();

    let task = {
        let gateway = gateway.clone();
        let tenant = tenant.clone();
        tokio::spawn(async move {
            gateway
                .run_scoped(&tenant, |mut session| {
                    Box::pin(async move {
                        session.insert("orders", "o-1", json!({}))?;
                        if session.count("orders") == 1 {
                            panic!("operation blew up");
                        }
                        anyhow::Ok(())
                    })
                })
                .await
        })
    };

    let joined = task.await;
    assert!(joined.unwrap_err().is_panic());
    assert!(backend.rows_unchecked("orders").is_empty());

    assert_eq!(count_orders(&gateway, &tenant).await, 0);
    assert_eq!(backend.connections_opened(), 1);
}

/// Test that cancelling a call mid-operation discards its writes.
#[tokio::test]
async fn test_cancelled_call_rolls_back() {
    let (backend, gateway) = single_connection_gateway();
    let tenant = new_tenant();

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        gateway.run_scoped(&tenant, |mut session| {
            Box::pin(async move {
                session.insert("orders", "o-1", json!({}))?;
                tokio::time::sleep(Duration::from_secs(60)).await;
                anyhow::Ok(())
            })
        }),
    )
    .await;

    assert!(outcome.is_err());
    assert!(backend.rows_unchecked("orders").is_empty());
    assert_eq!(backend.transactions_committed(), 0);

    seed_orders(&gateway, &tenant, &["o-2"]).await;
    assert_eq!(count_orders(&gateway, &tenant).await, 1);
}
