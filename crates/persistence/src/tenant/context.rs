//! Scoped execution contexts handed to caller operations.
//!
//! A [`TenantSession`] is the only way a scoped operation reaches storage. It
//! borrows the executor of the transaction the gateway opened for this call,
//! so every query it issues runs inside that transaction and sees the
//! transaction-scoped tenant variable. It exposes no commit, rollback or
//! variable-setting capability; those stay with the gateway.

use std::ops::{Deref, DerefMut};

use super::id::{TenantId, UserId};

/// Execution context for a single tenant-scoped unit of work.
///
/// Created by the gateway at the start of a scoped call, moved into the
/// caller's operation and dropped when the operation returns. The lifetime
/// `'t` ties the session to the transaction it was created for, so it cannot
/// outlive that transaction or be stored for later use.
///
/// The session dereferences to the backend's query executor:
///
/// ```ignore
/// gateway
///     .run_scoped(tenant, |session| {
///         Box::pin(async move {
///             let rows = session.query("SELECT id FROM orders", &[]).await?;
///             Ok(rows.len())
///         })
///     })
///     .await?;
/// ```
pub struct TenantSession<'t, X> {
    tenant_id: TenantId,
    user_id: Option<UserId>,
    executor: &'t mut X,
}

impl<'t, X> TenantSession<'t, X> {
    pub(crate) fn new(tenant_id: TenantId, user_id: Option<UserId>, executor: &'t mut X) -> Self {
        Self {
            tenant_id,
            user_id,
            executor,
        }
    }

    /// Returns the tenant this session is confined to.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the acting user, if one was supplied.
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }
}

impl<X> Deref for TenantSession<'_, X> {
    type Target = X;

    fn deref(&self) -> &X {
        self.executor
    }
}

impl<X> DerefMut for TenantSession<'_, X> {
    fn deref_mut(&mut self) -> &mut X {
        self.executor
    }
}

impl<X> std::fmt::Debug for TenantSession<'_, X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantSession")
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Execution context for a cross-tenant unit of work performed as a user.
///
/// Only the user variable is set on the underlying transaction. Whatever the
/// storage policy grants to "user set, tenant unset" applies.
pub struct UnscopedSession<'t, X> {
    user_id: UserId,
    executor: &'t mut X,
}

impl<'t, X> UnscopedSession<'t, X> {
    pub(crate) fn new(user_id: UserId, executor: &'t mut X) -> Self {
        Self { user_id, executor }
    }

    /// Returns the acting user.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

impl<X> Deref for UnscopedSession<'_, X> {
    type Target = X;

    fn deref(&self) -> &X {
        self.executor
    }
}

impl<X> DerefMut for UnscopedSession<'_, X> {
    fn deref_mut(&mut self) -> &mut X {
        self.executor
    }
}

impl<X> std::fmt::Debug for UnscopedSession<'_, X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnscopedSession")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}
