//! Tenant and user identifier types.
//!
//! Identifiers reach the gateway as untrusted strings (headers, token claims,
//! path segments). They are parsed into [`TenantId`] and [`UserId`] before a
//! transaction is opened, so malformed input never touches storage.

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of a slug identifier.
pub const MAX_SLUG_LENGTH: usize = 64;

static SLUG_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9_\-]+$").expect("slug pattern is a valid regex")
});

/// The accepted shape of tenant and user identifiers.
///
/// The storage policies cast the session variables to `uuid`, so UUIDs are the
/// default. `Slug` exists for deployments keyed by short names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierFormat {
    /// A hyphenated UUID, normalised to lowercase.
    #[default]
    Uuid,
    /// ASCII letters, digits, `_` and `-`, at most [`MAX_SLUG_LENGTH`] characters.
    Slug,
}

impl IdentifierFormat {
    /// Validates and normalises a raw identifier.
    ///
    /// Returns the normalised value or a human-readable reason.
    pub fn normalize(&self, raw: &str) -> Result<String, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("identifier is empty".to_string());
        }
        if trimmed.len() != raw.len() {
            return Err("identifier has surrounding whitespace".to_string());
        }

        match self {
            IdentifierFormat::Uuid => {
                let parsed = Uuid::try_parse(raw).map_err(|e| format!("not a UUID: {}", e))?;
                if parsed.is_nil() {
                    return Err("nil UUID is reserved".to_string());
                }
                Ok(parsed.hyphenated().to_string())
            }
            IdentifierFormat::Slug => {
                if raw.len() > MAX_SLUG_LENGTH {
                    return Err(format!(
                        "exceeds maximum length of {} characters",
                        MAX_SLUG_LENGTH
                    ));
                }
                if !SLUG_PATTERN.is_match(raw) {
                    return Err("contains characters outside [A-Za-z0-9_-]".to_string());
                }
                Ok(raw.to_string())
            }
        }
    }
}

impl fmt::Display for IdentifierFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierFormat::Uuid => write!(f, "uuid"),
            IdentifierFormat::Slug => write!(f, "slug"),
        }
    }
}

/// A validated tenant identifier.
///
/// Values only come from [`TenantId::parse`], so holding a `TenantId` means
/// the identifier passed validation for the configured format.
///
/// # Examples
///
/// ```
/// use opsconsole_persistence::tenant::{IdentifierFormat, TenantId};
///
/// let tenant = TenantId::parse("6F9619FF-8B86-D011-B42D-00C04FC964FF", IdentifierFormat::Uuid).unwrap();
/// assert_eq!(tenant.as_str(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");
///
/// assert!(TenantId::parse("", IdentifierFormat::Uuid).is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Parses a raw tenant identifier.
    pub fn parse(raw: &str, format: IdentifierFormat) -> Result<Self, String> {
        format.normalize(raw).map(Self)
    }

    /// Generates a fresh random UUID tenant identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated user identifier, recorded by storage-side audit triggers.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Parses a raw user identifier.
    pub fn parse(raw: &str, format: IdentifierFormat) -> Result<Self, String> {
        format.normalize(raw).map(Self)
    }

    /// Generates a fresh random UUID user identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Returns the user ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}
