//! Tenant identity for scoped storage access.
//!
//! # Core Types
//!
//! - [`TenantId`] / [`UserId`] - validated identifiers, parsed before storage is touched
//! - [`IdentifierFormat`] - the accepted identifier shape (UUID by default)
//! - [`TenantSession`] - the context a tenant-scoped operation runs in
//! - [`UnscopedSession`] - the context of the deliberate cross-tenant path
//!
//! # Examples
//!
//! ```
//! use opsconsole_persistence::tenant::{IdentifierFormat, TenantId, UserId};
//!
//! let tenant = TenantId::parse("acme-corp", IdentifierFormat::Slug).unwrap();
//! let user = UserId::generate();
//!
//! assert_eq!(tenant.as_str(), "acme-corp");
//! assert!(UserId::parse(user.as_str(), IdentifierFormat::Uuid).is_ok());
//! ```

mod context;
mod id;

pub use context::{TenantSession, UnscopedSession};
pub use id::{IdentifierFormat, MAX_SLUG_LENGTH, TenantId, UserId};
