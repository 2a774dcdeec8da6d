//! Tenant quota evaluation.
//!
//! Usage is read from the storage backend on every check; nothing is
//! reserved. Evaluation and the subsequent write are not transactionally
//! linked, so two concurrent writers can each pass and jointly exceed a
//! limit. Soft-limit semantics are accepted.

use crate::error::storage_error_to_app;
use silo_core::models::{QuotaEvaluation, QuotaLimits};
use silo_core::{AppError, Config, TenantId};
use silo_storage::ObjectStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct QuotaService {
    store: Arc<dyn ObjectStore>,
    config: Config,
}

impl QuotaService {
    pub fn new(store: Arc<dyn ObjectStore>, config: Config) -> Self {
        QuotaService { store, config }
    }

    /// Current tenant usage: (total bytes, object count), excluding multipart
    /// part artifacts.
    pub async fn usage(&self, tenant: &TenantId) -> Result<(u64, u64), AppError> {
        self.store.usage(tenant).await.map_err(storage_error_to_app)
    }

    /// Evaluate a prospective write of `incoming_bytes` adding
    /// `incoming_objects` objects against the tenant's configured limits.
    /// A limit of 0 is unlimited.
    pub async fn evaluate(
        &self,
        tenant: &TenantId,
        incoming_bytes: u64,
        incoming_objects: u64,
    ) -> Result<QuotaEvaluation, AppError> {
        let limits = self.config.quota_limits_for(tenant.as_str());
        let (current_total_bytes, current_object_count) = self.usage(tenant).await?;

        let mut evaluation =
            QuotaEvaluation::ok(limits, current_total_bytes, current_object_count, incoming_bytes);

        if let Some(reason) = exceeded_reason(
            &limits,
            current_total_bytes,
            current_object_count,
            incoming_bytes,
            incoming_objects,
        ) {
            evaluation.exceeded = true;
            evaluation.reason = Some(reason);
            tracing::warn!(
                tenant_id = %tenant,
                incoming_bytes,
                current_total_bytes,
                current_object_count,
                reason = evaluation.reason.as_deref().unwrap_or(""),
                "Quota evaluation rejected write"
            );
        }

        Ok(evaluation)
    }

    /// Evaluate and convert a rejection into the 413 quota error carrying the
    /// structured counters.
    pub async fn ensure_within(
        &self,
        tenant: &TenantId,
        incoming_bytes: u64,
        incoming_objects: u64,
    ) -> Result<(), AppError> {
        let evaluation = self
            .evaluate(tenant, incoming_bytes, incoming_objects)
            .await?;
        if evaluation.exceeded {
            return Err(AppError::QuotaExceeded(Box::new(evaluation)));
        }
        Ok(())
    }
}

fn exceeded_reason(
    limits: &QuotaLimits,
    current_total_bytes: u64,
    current_object_count: u64,
    incoming_bytes: u64,
    incoming_objects: u64,
) -> Option<String> {
    if limits.max_object_size_bytes != 0 && incoming_bytes > limits.max_object_size_bytes {
        return Some(format!(
            "object size {} exceeds per-object limit {}",
            incoming_bytes, limits.max_object_size_bytes
        ));
    }
    if limits.max_total_bytes != 0
        && current_total_bytes.saturating_add(incoming_bytes) > limits.max_total_bytes
    {
        return Some(format!(
            "total bytes would reach {} of limit {}",
            current_total_bytes.saturating_add(incoming_bytes),
            limits.max_total_bytes
        ));
    }
    if limits.max_object_count != 0
        && current_object_count.saturating_add(incoming_objects) > limits.max_object_count
    {
        return Some(format!(
            "object count would reach {} of limit {}",
            current_object_count.saturating_add(incoming_objects),
            limits.max_object_count
        ));
    }
    None
}
