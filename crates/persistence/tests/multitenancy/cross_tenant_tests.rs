//! Tests for the unscoped path and user attribution.

use serde_json::json;

use opsconsole_persistence::error::GatewayError;

use crate::common::*;

// ============================================================================
// Unscoped Access Tests
// ============================================================================

/// Test that an unscoped operation sees rows of every tenant.
#[tokio::test]
async fn test_unscoped_sees_all_tenants() {
    let (_backend, gateway) = memory_gateway();
    let tenant_a = new_tenant();
    let tenant_b = new_tenant();

    seed_orders(&gateway, &tenant_a, &["a-1"]).await;
    seed_orders(&gateway, &tenant_b, &["b-1", "b-2"]).await;

    let total = gateway
        .run_unscoped_as_user(&new_user(), |session| {
            Box::pin(async move { anyhow::Ok(session.count("orders")) })
        })
        .await
        .unwrap();
    assert_eq!(total, 3);
}

/// Test that the unscoped session binds the user and leaves the tenant unset.
#[tokio::test]
async fn test_unscoped_binds_only_user() {
    let (_backend, gateway) = memory_gateway();
    let user = new_user();

    let (tenant_var, user_var, session_user) = gateway
        .run_unscoped_as_user(&user, |session| {
            Box::pin(async move {
                anyhow::Ok((
                    session.current_setting("app.tenant_id"),
                    session.current_setting("app.user_id"),
                    session.user_id().to_string(),
                ))
            })
        })
        .await
        .unwrap();

    assert_eq!(tenant_var, None);
    assert_eq!(user_var.as_deref(), Some(user.as_str()));
    assert_eq!(session_user, user);
}

/// Test that a tenant binding from an earlier call does not leak into an
/// unscoped call on the same pooled connection.
#[tokio::test]
async fn test_unscoped_after_scoped_on_same_connection() {
    let (backend, gateway) = memory_gateway_with(
        opsconsole_persistence::backends::memory::MemoryConfig {
            max_connections: 1,
            ..Default::default()
        },
        Default::default(),
    );
    let tenant = new_tenant();
    seed_orders(&gateway, &tenant, &["o-1"]).await;

    let tenant_var = gateway
        .run_unscoped_as_user(&new_user(), |session| {
            Box::pin(async move { anyhow::Ok(session.current_setting("app.tenant_id")) })
        })
        .await
        .unwrap();

    assert_eq!(tenant_var, None);
    assert_eq!(backend.connections_opened(), 1);
}

/// Test that an invalid user never reaches storage.
#[tokio::test]
async fn test_unscoped_rejects_invalid_user() {
    let (backend, gateway) = memory_gateway();
    let counter = InvocationCounter::default();

    for bad in ["", "   ", "not-a-uuid", "00000000-0000-0000-0000-000000000000"] {
        let hits = counter.clone();
        let err = gateway
            .run_unscoped_as_user(bad, move |_session| {
                Box::pin(async move {
                    hits.hit();
                    anyhow::Ok(())
                })
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, GatewayError::InvalidUser { .. }),
            "expected InvalidUser for {:?}, got {:?}",
            bad,
            err
        );
        assert!(err.is_invalid_input());
    }

    assert_eq!(counter.count(), 0);
    assert_eq!(backend.transactions_begun(), 0);
}

// ============================================================================
// Attribution Tests
// ============================================================================

/// Test that a scoped call with a user records who wrote each row.
#[tokio::test]
async fn test_scoped_with_user_records_author() {
    let (backend, gateway) = memory_gateway();
    let tenant = new_tenant();
    let user = new_user();

    let (bound_tenant, bound_user) = gateway
        .run_scoped_with_user(&tenant, &user, |mut session| {
            Box::pin(async move {
                session.insert("orders", "o-1", json!({"total": 5}))?;
                anyhow::Ok((
                    session.current_setting("app.tenant_id"),
                    session.user_id().map(|u| u.to_string()),
                ))
            })
        })
        .await
        .unwrap();

    assert_eq!(bound_tenant.as_deref(), Some(tenant.as_str()));
    assert_eq!(bound_user.as_deref(), Some(user.as_str()));

    let rows = backend.rows_unchecked("orders");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].updated_by.as_deref(), Some(user.as_str()));
}

/// Test that updates carry the latest author.
#[tokio::test]
async fn test_update_records_latest_author() {
    let (backend, gateway) = memory_gateway();
    let tenant = new_tenant();
    let editor = new_user();

    seed_orders(&gateway, &tenant, &["o-1"]).await;
    assert_eq!(backend.rows_unchecked("orders")[0].updated_by, None);

    gateway
        .run_scoped_with_user(&tenant, &editor, |mut session| {
            Box::pin(async move {
                session.update("orders", "o-1", json!({"total": 7}))?;
                anyhow::Ok(())
            })
        })
        .await
        .unwrap();

    let rows = backend.rows_unchecked("orders");
    assert_eq!(rows[0].updated_by.as_deref(), Some(editor.as_str()));
    assert_eq!(rows[0].data, json!({"total": 7}));
}

/// Test that the user is validated even when the tenant is valid.
#[tokio::test]
async fn test_scoped_with_user_rejects_invalid_user() {
    let (backend, gateway) = memory_gateway();
    let counter = InvocationCounter::default();
    let hits = counter.clone();

    let err = gateway
        .run_scoped_with_user(&new_tenant(), "bob", move |_session| {
            Box::pin(async move {
                hits.hit();
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::InvalidUser { .. }));
    assert_eq!(counter.count(), 0);
    assert_eq!(backend.transactions_begun(), 0);
}

/// Test that an invalid tenant is reported before an invalid user.
#[tokio::test]
async fn test_invalid_tenant_reported_first() {
    let (_backend, gateway) = memory_gateway();

    let err = gateway
        .run_scoped_with_user("", "", |_session| Box::pin(async move { anyhow::Ok(()) }))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::InvalidTenant { .. }));
}
