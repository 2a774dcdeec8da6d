//! Stateless HMAC presigned capability URLs.
//!
//! A capability is a deterministic newline-joined canonical string, HMACed
//! with the injected secret and carried in the `sig` query parameter. The
//! tenant is part of the canonical string, so a leaked URL cannot be replayed
//! against another tenant even knowing the bucket and key. Nothing is
//! persisted server-side; expiry bounds the risk window.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use silo_core::{AppError, TenantId};
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

/// Constraints an object capability was issued with. Absent fields render as
/// empty strings in the canonical form.
#[derive(Debug, Clone, Default)]
pub struct ObjectCapability {
    pub max_bytes: Option<u64>,
    pub content_type: Option<String>,
}

/// Transform parameters bound into a transform capability.
#[derive(Debug, Clone, Default)]
pub struct TransformCapability {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub quality: Option<u8>,
}

/// Pseudo-method used to domain-separate transform capabilities from object
/// GET capabilities on the same bucket/key.
const TRANSFORM_METHOD: &str = "TRANSFORM";

#[derive(Clone)]
pub struct PresignService {
    secret: Vec<u8>,
    default_expiry_secs: u64,
    max_expiry_secs: u64,
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn opt_string<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

impl PresignService {
    pub fn new(secret: &str, default_expiry_secs: u64, max_expiry_secs: u64) -> Self {
        PresignService {
            secret: secret.as_bytes().to_vec(),
            default_expiry_secs,
            max_expiry_secs,
        }
    }

    /// Absolute expiry timestamp for a requested lifetime, clamped to the
    /// configured maximum.
    pub fn expiry_for(&self, requested_secs: Option<u64>) -> u64 {
        let lifetime = requested_secs
            .unwrap_or(self.default_expiry_secs)
            .min(self.max_expiry_secs);
        unix_now().saturating_add(lifetime)
    }

    fn canonical_object(
        &self,
        tenant: &TenantId,
        method: &str,
        bucket: &str,
        key: &str,
        expires_at: u64,
        capability: &ObjectCapability,
    ) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}",
            tenant,
            method.to_uppercase(),
            bucket,
            key,
            expires_at,
            opt_string(&capability.max_bytes),
            capability.content_type.as_deref().unwrap_or(""),
        )
    }

    fn canonical_transform(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        expires_at: u64,
        transform: &TransformCapability,
    ) -> String {
        let base = self.canonical_object(
            tenant,
            TRANSFORM_METHOD,
            bucket,
            key,
            expires_at,
            &ObjectCapability::default(),
        );
        format!(
            "{}\n{}\n{}\n{}\n{}",
            base,
            opt_string(&transform.width),
            opt_string(&transform.height),
            transform.format.as_deref().unwrap_or(""),
            opt_string(&transform.quality),
        )
    }

    fn sign(&self, canonical: &str) -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(canonical.as_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    fn verify(&self, canonical: &str, signature: &str, expires_at: u64) -> Result<(), AppError> {
        if expires_at < unix_now() {
            return Err(AppError::Unauthorized(
                "Presigned capability has expired".to_string(),
            ));
        }
        let provided = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AppError::Unauthorized("Invalid signature".to_string()))?;

        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(canonical.as_bytes());
        let expected = mac.finalize().into_bytes();

        if expected.ct_eq(provided.as_slice()).into() {
            Ok(())
        } else {
            Err(AppError::Unauthorized("Invalid signature".to_string()))
        }
    }

    pub fn sign_object(
        &self,
        tenant: &TenantId,
        method: &str,
        bucket: &str,
        key: &str,
        expires_at: u64,
        capability: &ObjectCapability,
    ) -> String {
        self.sign(&self.canonical_object(tenant, method, bucket, key, expires_at, capability))
    }

    /// Constant-time validation of an object capability. Rejects expired
    /// capabilities before any comparison.
    pub fn validate_object(
        &self,
        tenant: &TenantId,
        method: &str,
        bucket: &str,
        key: &str,
        expires_at: u64,
        capability: &ObjectCapability,
        signature: &str,
    ) -> Result<(), AppError> {
        let canonical =
            self.canonical_object(tenant, method, bucket, key, expires_at, capability);
        self.verify(&canonical, signature, expires_at)
    }

    pub fn sign_transform(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        expires_at: u64,
        transform: &TransformCapability,
    ) -> String {
        self.sign(&self.canonical_transform(tenant, bucket, key, expires_at, transform))
    }

    pub fn validate_transform(
        &self,
        tenant: &TenantId,
        bucket: &str,
        key: &str,
        expires_at: u64,
        transform: &TransformCapability,
        signature: &str,
    ) -> Result<(), AppError> {
        let canonical = self.canonical_transform(tenant, bucket, key, expires_at, transform);
        self.verify(&canonical, signature, expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PresignService {
        PresignService::new("test-secret-test-secret", 900, 3600)
    }

    fn tenant() -> TenantId {
        TenantId::parse("acme").unwrap()
    }

    #[test]
    fn test_round_trip() {
        let svc = service();
        let exp = unix_now() + 60;
        let cap = ObjectCapability {
            max_bytes: Some(1024),
            content_type: Some("image/png".to_string()),
        };
        let sig = svc.sign_object(&tenant(), "PUT", "photos", "a/b.png", exp, &cap);
        assert!(svc
            .validate_object(&tenant(), "PUT", "photos", "a/b.png", exp, &cap, &sig)
            .is_ok());
    }

    #[test]
    fn test_any_mutated_field_invalidates() {
        let svc = service();
        let exp = unix_now() + 60;
        let cap = ObjectCapability::default();
        let sig = svc.sign_object(&tenant(), "GET", "photos", "a.png", exp, &cap);

        let other_tenant = TenantId::parse("rival").unwrap();
        assert!(svc
            .validate_object(&other_tenant, "GET", "photos", "a.png", exp, &cap, &sig)
            .is_err());
        assert!(svc
            .validate_object(&tenant(), "DELETE", "photos", "a.png", exp, &cap, &sig)
            .is_err());
        assert!(svc
            .validate_object(&tenant(), "GET", "other", "a.png", exp, &cap, &sig)
            .is_err());
        assert!(svc
            .validate_object(&tenant(), "GET", "photos", "b.png", exp, &cap, &sig)
            .is_err());
        assert!(svc
            .validate_object(&tenant(), "GET", "photos", "a.png", exp + 1, &cap, &sig)
            .is_err());
        let tightened = ObjectCapability {
            max_bytes: Some(1),
            content_type: None,
        };
        assert!(svc
            .validate_object(&tenant(), "GET", "photos", "a.png", exp, &tightened, &sig)
            .is_err());
    }

    #[test]
    fn test_expired_rejected_even_with_correct_signature() {
        let svc = service();
        let exp = unix_now() - 1;
        let cap = ObjectCapability::default();
        let sig = svc.sign_object(&tenant(), "GET", "photos", "a.png", exp, &cap);
        assert!(svc
            .validate_object(&tenant(), "GET", "photos", "a.png", exp, &cap, &sig)
            .is_err());
    }

    #[test]
    fn test_transform_signature_not_valid_for_object_get() {
        let svc = service();
        let exp = unix_now() + 60;
        let transform = TransformCapability {
            width: Some(100),
            ..TransformCapability::default()
        };
        let sig = svc.sign_transform(&tenant(), "photos", "a.png", exp, &transform);
        assert!(svc
            .validate_transform(&tenant(), "photos", "a.png", exp, &transform, &sig)
            .is_ok());
        assert!(svc
            .validate_object(
                &tenant(),
                "GET",
                "photos",
                "a.png",
                exp,
                &ObjectCapability::default(),
                &sig
            )
            .is_err());
    }

    #[test]
    fn test_expiry_clamped_to_max() {
        let svc = service();
        let far = svc.expiry_for(Some(1_000_000));
        assert!(far <= unix_now() + 3600);
        let default = svc.expiry_for(None);
        assert!(default >= unix_now() + 890 && default <= unix_now() + 900);
    }
}
