//! Tests for tenant data isolation.
//!
//! This module tests that every scoped operation sees and writes only the
//! rows of its own tenant, including under concurrency.

use std::collections::HashMap;

use serde_json::json;
use tokio::task::JoinSet;

use opsconsole_persistence::backends::memory::{MemoryConfig, Row};
use opsconsole_persistence::error::{BackendError, GatewayError};
use opsconsole_persistence::gateway::GatewayConfig;

use crate::common::*;

// ============================================================================
// Read Isolation Tests
// ============================================================================

/// Test that a scoped read returns only the caller's tenant rows.
#[tokio::test]
async fn test_scoped_reads_only_own_tenant() {
    let (_backend, gateway) = memory_gateway();
    let tenant_a = new_tenant();
    let tenant_b = new_tenant();

    seed_orders(&gateway, &tenant_a, &["a-1", "a-2"]).await;
    seed_orders(&gateway, &tenant_b, &["b-1", "b-2", "b-3"]).await;

    assert_eq!(count_orders(&gateway, &tenant_a).await, 2);
    assert_eq!(count_orders(&gateway, &tenant_b).await, 3);

    let expected = tenant_a.clone();
    let rows = gateway
        .run_scoped(&tenant_a, |session| {
            Box::pin(async move { anyhow::Ok(session.select("orders")) })
        })
        .await
        .unwrap();
    assert!(rows.iter().all(|row| row.tenant_id == expected));
}

/// Test that a row id shared by two tenants resolves to the caller's row.
#[tokio::test]
async fn test_same_id_resolves_per_tenant() {
    let (_backend, gateway) = memory_gateway();
    let tenant_a = new_tenant();
    let tenant_b = new_tenant();

    seed_orders(&gateway, &tenant_a, &["shared"]).await;

    let found_by_b = gateway
        .run_scoped(&tenant_b, |session| {
            Box::pin(async move { anyhow::Ok(session.get("orders", "shared")) })
        })
        .await
        .unwrap();
    assert!(found_by_b.is_none());

    let found_by_a = gateway
        .run_scoped(&tenant_a, |session| {
            Box::pin(async move { anyhow::Ok(session.get("orders", "shared")) })
        })
        .await
        .unwrap();
    assert_eq!(found_by_a.map(|r| r.tenant_id), Some(tenant_a));
}

/// Test that updates cannot reach another tenant's rows.
#[tokio::test]
async fn test_update_does_not_cross_tenants() {
    let (backend, gateway) = memory_gateway();
    let tenant_a = new_tenant();
    let tenant_b = new_tenant();

    seed_orders(&gateway, &tenant_a, &["o-1"]).await;

    let updated = gateway
        .run_scoped(&tenant_b, |mut session| {
            Box::pin(async move { anyhow::Ok(session.update("orders", "o-1", json!({"hacked": true}))?) })
        })
        .await
        .unwrap();
    assert_eq!(updated, 0);

    let rows = backend.rows_unchecked("orders");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].data, json!({"id": "o-1"}));
}

/// Test that a scoped operation holding the gateway still only reaches its
/// own tenant's rows through every executor call.
#[tokio::test]
async fn test_scoped_operation_cannot_reach_foreign_rows() {
    let (backend, gateway) = memory_gateway();
    let owner = new_tenant();
    let other = new_tenant();

    gateway
        .run_scoped(&owner, |mut session| {
            Box::pin(async move {
                session.insert("orders", "secret", json!({"card": "4111"}))?;
                anyhow::Ok(())
            })
        })
        .await
        .unwrap();

    let captured = gateway.clone();
    let bound = other.clone();
    let (setting, seen, found, updated, deleted) = gateway
        .run_scoped(&other, move |mut session| {
            Box::pin(async move {
                assert_eq!(captured.config().variables.tenant, "app.tenant_id");
                let setting = session.current_setting("app.tenant_id");
                let seen = session.select("orders");
                let found = session.get("orders", "secret");
                let updated = session.update("orders", "secret", json!({"card": "0000"}))?;
                let deleted = session.delete("orders", "secret")?;
                anyhow::Ok((setting, seen, found, updated, deleted))
            })
        })
        .await
        .unwrap();

    assert_eq!(setting, Some(bound));
    assert!(seen.is_empty());
    assert!(found.is_none());
    assert_eq!(updated, 0);
    assert_eq!(deleted, 0);

    let rows = backend.rows_unchecked("orders");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tenant_id, owner);
    assert_eq!(rows[0].data, json!({"card": "4111"}));
}

// ============================================================================
// Write Isolation Tests
// ============================================================================

/// Test that writing a row for another tenant is rejected by the policy.
#[tokio::test]
async fn test_insert_for_other_tenant_rejected() {
    let (backend, gateway) = memory_gateway();
    let tenant_a = new_tenant();
    let tenant_b = new_tenant();

    let target = tenant_b.clone();
    let err = gateway
        .run_scoped(&tenant_a, move |mut session| {
            Box::pin(async move {
                session.insert_row(
                    "orders",
                    Row {
                        tenant_id: target,
                        id: "o-1".to_string(),
                        data: json!({}),
                        updated_by: None,
                    },
                )?;
                anyhow::Ok(())
            })
        })
        .await
        .unwrap_err();

    let inner = err
        .operation_error()
        .and_then(|e| e.downcast_ref::<BackendError>());
    assert!(matches!(inner, Some(BackendError::PolicyViolation { .. })));
    assert!(backend.rows_unchecked("orders").is_empty());
}

/// Test that an identifier is normalised before it is bound.
#[tokio::test]
async fn test_uppercase_uuid_binds_normalised_tenant() {
    let (backend, gateway) = memory_gateway();
    let raw = "6F9619FF-8B86-D011-B42D-00C04FC964FF";

    let bound = gateway
        .run_scoped(raw, |mut session| {
            Box::pin(async move {
                session.insert("orders", "o-1", json!({}))?;
                anyhow::Ok(session.tenant_id().to_string())
            })
        })
        .await
        .unwrap();

    assert_eq!(bound, "6f9619ff-8b86-d011-b42d-00c04fc964ff");
    assert_eq!(backend.rows_unchecked("orders")[0].tenant_id, bound);
}

/// Test that slug identifiers work when configured.
#[tokio::test]
async fn test_slug_identifiers() {
    let config = GatewayConfig {
        id_format: opsconsole_persistence::IdentifierFormat::Slug,
        ..Default::default()
    };
    let (_backend, gateway) = memory_gateway_with(MemoryConfig::default(), config);

    seed_orders(&gateway, "acme", &["o-1"]).await;
    assert_eq!(count_orders(&gateway, "acme").await, 1);
    assert_eq!(count_orders(&gateway, "globex").await, 0);

    let err = gateway
        .run_scoped("acme/research", |_session| Box::pin(async move { anyhow::Ok(()) }))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidTenant { .. }));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

/// Test that concurrent calls for different tenants never observe each
/// other's binding, even when their operations interleave.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tenants_stay_isolated() {
    let (backend, gateway) = memory_gateway_with(
        MemoryConfig {
            max_connections: 8,
            ..Default::default()
        },
        GatewayConfig::default(),
    );
    let tenants: Vec<String> = (0..4).map(|_| new_tenant()).collect();

    let mut tasks = JoinSet::new();
    for i in 0..40 {
        let gateway = gateway.clone();
        let tenant = tenants[i % tenants.len()].clone();
        tasks.spawn(async move {
            let expected = tenant.clone();
            gateway
                .run_scoped(&tenant, move |mut session| {
                    Box::pin(async move {
                        session.insert("orders", &format!("o-{}", i), json!({ "n": i }))?;
                        tokio::task::yield_now().await;

                        let bound = session.current_setting("app.tenant_id");
                        anyhow::ensure!(
                            bound.as_deref() == Some(expected.as_str()),
                            "bound tenant changed mid-operation"
                        );
                        let foreign = session
                            .select("orders")
                            .into_iter()
                            .filter(|row| row.tenant_id != expected)
                            .count();
                        anyhow::ensure!(foreign == 0, "saw {} foreign rows", foreign);

                        tokio::task::yield_now().await;
                        anyhow::Ok(session.connection_id())
                    })
                })
                .await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined.expect("task panicked").expect("scoped operation failed");
    }

    let mut per_tenant: HashMap<String, usize> = HashMap::new();
    for row in backend.rows_unchecked("orders") {
        *per_tenant.entry(row.tenant_id).or_default() += 1;
    }
    for tenant in &tenants {
        assert_eq!(per_tenant.get(tenant), Some(&10));
    }
}
