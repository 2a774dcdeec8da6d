//! Tenant identifier type.
//!
//! Tenants are opaque identifiers resolved from a request header by an
//! external identity collaborator. Silo validates the shape and scopes every
//! bucket, object, cache entry, and signature to it.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

const MAX_TENANT_LEN: usize = 64;

/// Validated tenant identifier.
///
/// Allowed characters: ASCII alphanumerics plus `.`, `_`, `-`; length 1..=64.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Parse and validate a raw header value.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("Tenant identifier is empty".to_string());
        }
        if raw.len() > MAX_TENANT_LEN {
            return Err(format!(
                "Tenant identifier exceeds {} characters",
                MAX_TENANT_LEN
            ));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err("Tenant identifier contains invalid characters".to_string());
        }
        Ok(TenantId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
