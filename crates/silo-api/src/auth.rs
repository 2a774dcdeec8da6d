//! Tenant resolution and scope checks.
//!
//! The tenant identifier is always taken from the `x-silo-tenant` header and
//! never inferred, including on presigned calls: the header doubles as the
//! authorization scope and the cache namespace key. Scope checking itself is
//! an external collaborator; its middleware injects granted scopes via the
//! `x-silo-scopes` header, which this module consumes as-is.

use crate::error::HttpAppError;
use axum::{extract::FromRequestParts, http::request::Parts};
use silo_core::constants::{SCOPES_HEADER, SCOPE_STORAGE_READ, SCOPE_STORAGE_WRITE, TENANT_HEADER};
use silo_core::{AppError, TenantId};

/// Per-request tenant identity plus the scopes granted upstream.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    scopes: Vec<String>,
}

impl TenantContext {
    #[cfg(test)]
    pub fn for_tests(tenant: &str, scopes: &[&str]) -> Self {
        TenantContext {
            tenant_id: TenantId::parse(tenant).expect("valid test tenant"),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Require the read scope for a bearer-authorized read operation.
    pub fn require_read(&self) -> Result<(), AppError> {
        self.require_scope(SCOPE_STORAGE_READ)
    }

    /// Require the write scope for a bearer-authorized mutation.
    pub fn require_write(&self) -> Result<(), AppError> {
        self.require_scope(SCOPE_STORAGE_WRITE)
    }

    fn require_scope(&self, scope: &str) -> Result<(), AppError> {
        if self.scopes.is_empty() {
            return Err(AppError::Unauthorized(
                "No authorization scopes or presigned capability supplied".to_string(),
            ));
        }
        if !self.has_scope(scope) {
            return Err(AppError::Forbidden(format!("Missing scope: {}", scope)));
        }
        Ok(())
    }
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TENANT_HEADER)
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(format!(
                    "Missing {} header",
                    TENANT_HEADER
                )))
            })?
            .to_str()
            .map_err(|_| {
                HttpAppError(AppError::InvalidInput(format!(
                    "Invalid {} header",
                    TENANT_HEADER
                )))
            })?;

        let tenant_id = TenantId::parse(raw)
            .map_err(|reason| HttpAppError(AppError::InvalidInput(reason)))?;

        let scopes = parts
            .headers
            .get(SCOPES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(TenantContext { tenant_id, scopes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_core::ErrorMetadata;

    #[test]
    fn test_scope_checks() {
        let ctx = TenantContext::for_tests("acme", &["storage.read"]);
        assert!(ctx.require_read().is_ok());
        let err = ctx.require_write().unwrap_err();
        assert_eq!(err.http_status_code(), 403);
    }

    #[test]
    fn test_no_scopes_is_unauthorized() {
        let ctx = TenantContext::for_tests("acme", &[]);
        let err = ctx.require_read().unwrap_err();
        assert_eq!(err.http_status_code(), 401);
    }
}
