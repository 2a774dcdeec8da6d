//! Configuration module
//!
//! Environment-driven configuration for the storage engine. Every knob has a
//! default suitable for development; production deployments must provide a
//! signing secret.

use crate::models::quota::QuotaLimits;
use std::collections::HashMap;
use std::env;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PRESIGN_DEFAULT_EXPIRY_SECS: u64 = 900;
const DEFAULT_PRESIGN_MAX_EXPIRY_SECS: u64 = 3600;
const DEFAULT_MIN_PART_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_RESULT_CACHE_TTL_SECS: u64 = 30;
const DEFAULT_RESULT_CACHE_CAPACITY: usize = 1024;
const DEFAULT_TRANSFORM_MAX_DIMENSION: u32 = 4096;
const DEFAULT_TRANSFORM_MAX_PIXELS: u64 = 40_000_000;
const DEFAULT_TRANSFORM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TRANSFORM_CONCURRENCY: usize = 2;
const DEFAULT_TRANSFORM_CACHE_ENTRIES: usize = 256;
const DEFAULT_TRANSFORM_CACHE_MAX_BYTES: u64 = 64 * 1024 * 1024;
const DEFAULT_TRANSFORM_CACHE_TTL_SECS: u64 = 300;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    Local,
    Memory,
}

/// Full engine configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,

    // Storage backend
    pub storage_backend: StorageBackendKind,
    pub local_storage_path: String,

    // Presigned capability URLs.
    // Rotating the secret invalidates outstanding URLs; their short expiry
    // bounds the risk window, so no dual-secret grace period is kept.
    pub presign_secret: String,
    pub presign_default_expiry_secs: u64,
    pub presign_max_expiry_secs: u64,

    // Quotas (0 = unlimited)
    pub quota_defaults: QuotaLimits,
    pub quota_tenant_overrides: HashMap<String, QuotaLimits>,

    // Multipart
    pub multipart_min_part_size_bytes: u64,
    pub multipart_max_part_size_bytes: u64,

    // List/Head result cache
    pub result_cache_ttl_secs: u64,
    pub result_cache_capacity: usize,

    // Transform pipeline
    pub transform_enabled: bool,
    pub transform_max_width: u32,
    pub transform_max_height: u32,
    pub transform_max_pixels: u64,
    pub transform_timeout_secs: u64,
    pub transform_concurrency: usize,
    pub transform_png_repair: bool,
    pub transform_cache_entries: usize,
    pub transform_cache_max_bytes: u64,
    pub transform_cache_ttl_secs: u64,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, anyhow::Error> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool, anyhow::Error> {
    match env::var(name) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(anyhow::anyhow!("Invalid value for {}: {}", name, other)),
        },
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let is_production = environment == "production" || environment == "prod";

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let storage_backend = match env::var("SILO_STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => StorageBackendKind::Local,
            "memory" => StorageBackendKind::Memory,
            other => {
                return Err(anyhow::anyhow!(
                    "Invalid SILO_STORAGE_BACKEND: {} (expected 'local' or 'memory')",
                    other
                ))
            }
        };

        let presign_secret = match env::var("SILO_PRESIGN_SECRET") {
            Ok(secret) => secret,
            Err(_) if is_production => {
                return Err(anyhow::anyhow!(
                    "SILO_PRESIGN_SECRET must be set in production"
                ))
            }
            Err(_) => {
                tracing::warn!("SILO_PRESIGN_SECRET not set; using development-only secret");
                "silo-development-secret".to_string()
            }
        };
        if presign_secret.len() < 16 {
            return Err(anyhow::anyhow!(
                "SILO_PRESIGN_SECRET must be at least 16 characters"
            ));
        }

        let quota_defaults = QuotaLimits {
            max_total_bytes: env_parse("SILO_QUOTA_MAX_TOTAL_BYTES", 0u64)?,
            max_object_count: env_parse("SILO_QUOTA_MAX_OBJECT_COUNT", 0u64)?,
            max_object_size_bytes: env_parse("SILO_QUOTA_MAX_OBJECT_SIZE_BYTES", 0u64)?,
        };

        // JSON map of tenant id -> limits, e.g.
        // {"acme":{"max_total_bytes":1073741824}}
        let quota_tenant_overrides = match env::var("SILO_QUOTA_TENANT_OVERRIDES") {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Invalid SILO_QUOTA_TENANT_OVERRIDES: {}", e))?,
            _ => HashMap::new(),
        };

        let config = Config {
            server_port: env_parse("PORT", DEFAULT_PORT)?,
            environment,
            cors_origins,
            storage_backend,
            local_storage_path: env::var("SILO_STORAGE_PATH")
                .unwrap_or_else(|_| "./data".to_string()),
            presign_secret,
            presign_default_expiry_secs: env_parse(
                "SILO_PRESIGN_DEFAULT_EXPIRY_SECS",
                DEFAULT_PRESIGN_DEFAULT_EXPIRY_SECS,
            )?,
            presign_max_expiry_secs: env_parse(
                "SILO_PRESIGN_MAX_EXPIRY_SECS",
                DEFAULT_PRESIGN_MAX_EXPIRY_SECS,
            )?,
            quota_defaults,
            quota_tenant_overrides,
            multipart_min_part_size_bytes: env_parse(
                "SILO_MULTIPART_MIN_PART_SIZE_BYTES",
                DEFAULT_MIN_PART_SIZE_BYTES,
            )?,
            multipart_max_part_size_bytes: env_parse("SILO_MULTIPART_MAX_PART_SIZE_BYTES", 0u64)?,
            result_cache_ttl_secs: env_parse(
                "SILO_RESULT_CACHE_TTL_SECS",
                DEFAULT_RESULT_CACHE_TTL_SECS,
            )?,
            result_cache_capacity: env_parse(
                "SILO_RESULT_CACHE_CAPACITY",
                DEFAULT_RESULT_CACHE_CAPACITY,
            )?,
            transform_enabled: env_bool("SILO_TRANSFORM_ENABLED", true)?,
            transform_max_width: env_parse(
                "SILO_TRANSFORM_MAX_WIDTH",
                DEFAULT_TRANSFORM_MAX_DIMENSION,
            )?,
            transform_max_height: env_parse(
                "SILO_TRANSFORM_MAX_HEIGHT",
                DEFAULT_TRANSFORM_MAX_DIMENSION,
            )?,
            transform_max_pixels: env_parse(
                "SILO_TRANSFORM_MAX_PIXELS",
                DEFAULT_TRANSFORM_MAX_PIXELS,
            )?,
            transform_timeout_secs: env_parse(
                "SILO_TRANSFORM_TIMEOUT_SECS",
                DEFAULT_TRANSFORM_TIMEOUT_SECS,
            )?,
            transform_concurrency: env_parse(
                "SILO_TRANSFORM_CONCURRENCY",
                DEFAULT_TRANSFORM_CONCURRENCY,
            )?,
            transform_png_repair: env_bool("SILO_TRANSFORM_PNG_REPAIR", false)?,
            transform_cache_entries: env_parse(
                "SILO_TRANSFORM_CACHE_ENTRIES",
                DEFAULT_TRANSFORM_CACHE_ENTRIES,
            )?,
            transform_cache_max_bytes: env_parse(
                "SILO_TRANSFORM_CACHE_MAX_BYTES",
                DEFAULT_TRANSFORM_CACHE_MAX_BYTES,
            )?,
            transform_cache_ttl_secs: env_parse(
                "SILO_TRANSFORM_CACHE_TTL_SECS",
                DEFAULT_TRANSFORM_CACHE_TTL_SECS,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.presign_max_expiry_secs == 0 {
            return Err(anyhow::anyhow!("SILO_PRESIGN_MAX_EXPIRY_SECS must be > 0"));
        }
        if self.presign_default_expiry_secs > self.presign_max_expiry_secs {
            return Err(anyhow::anyhow!(
                "SILO_PRESIGN_DEFAULT_EXPIRY_SECS exceeds SILO_PRESIGN_MAX_EXPIRY_SECS"
            ));
        }
        if self.transform_concurrency == 0 {
            return Err(anyhow::anyhow!("SILO_TRANSFORM_CONCURRENCY must be > 0"));
        }
        if self.multipart_max_part_size_bytes != 0
            && self.multipart_max_part_size_bytes < self.multipart_min_part_size_bytes
        {
            return Err(anyhow::anyhow!(
                "SILO_MULTIPART_MAX_PART_SIZE_BYTES is below the minimum part size"
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production" || self.environment == "prod"
    }

    /// Quota limits for a tenant: override if present, defaults otherwise.
    pub fn quota_limits_for(&self, tenant: &str) -> QuotaLimits {
        self.quota_tenant_overrides
            .get(tenant)
            .copied()
            .unwrap_or(self.quota_defaults)
    }

    /// A configuration suitable for tests: memory backend, fixed secret.
    pub fn for_tests() -> Self {
        Config {
            server_port: 0,
            environment: "test".to_string(),
            cors_origins: vec!["*".to_string()],
            storage_backend: StorageBackendKind::Memory,
            local_storage_path: String::new(),
            presign_secret: "test-secret-test-secret".to_string(),
            presign_default_expiry_secs: DEFAULT_PRESIGN_DEFAULT_EXPIRY_SECS,
            presign_max_expiry_secs: DEFAULT_PRESIGN_MAX_EXPIRY_SECS,
            quota_defaults: QuotaLimits::unlimited(),
            quota_tenant_overrides: HashMap::new(),
            multipart_min_part_size_bytes: DEFAULT_MIN_PART_SIZE_BYTES,
            multipart_max_part_size_bytes: 0,
            result_cache_ttl_secs: DEFAULT_RESULT_CACHE_TTL_SECS,
            result_cache_capacity: DEFAULT_RESULT_CACHE_CAPACITY,
            transform_enabled: true,
            transform_max_width: DEFAULT_TRANSFORM_MAX_DIMENSION,
            transform_max_height: DEFAULT_TRANSFORM_MAX_DIMENSION,
            transform_max_pixels: DEFAULT_TRANSFORM_MAX_PIXELS,
            transform_timeout_secs: DEFAULT_TRANSFORM_TIMEOUT_SECS,
            transform_concurrency: DEFAULT_TRANSFORM_CONCURRENCY,
            transform_png_repair: false,
            transform_cache_entries: DEFAULT_TRANSFORM_CACHE_ENTRIES,
            transform_cache_max_bytes: DEFAULT_TRANSFORM_CACHE_MAX_BYTES,
            transform_cache_ttl_secs: DEFAULT_TRANSFORM_CACHE_TTL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_limits_for_prefers_override() {
        let mut config = Config::for_tests();
        config.quota_defaults = QuotaLimits {
            max_total_bytes: 100,
            max_object_count: 0,
            max_object_size_bytes: 0,
        };
        config.quota_tenant_overrides.insert(
            "acme".to_string(),
            QuotaLimits {
                max_total_bytes: 5000,
                max_object_count: 10,
                max_object_size_bytes: 0,
            },
        );

        assert_eq!(config.quota_limits_for("acme").max_total_bytes, 5000);
        assert_eq!(config.quota_limits_for("other").max_total_bytes, 100);
    }

    #[test]
    fn test_validate_rejects_default_expiry_above_max() {
        let mut config = Config::for_tests();
        config.presign_default_expiry_secs = 7200;
        config.presign_max_expiry_secs = 3600;
        assert!(config.validate().is_err());
    }
}
