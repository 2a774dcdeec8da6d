use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tenant quota limits. A value of 0 means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct QuotaLimits {
    pub max_total_bytes: u64,
    pub max_object_count: u64,
    pub max_object_size_bytes: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        QuotaLimits {
            max_total_bytes: 0,
            max_object_count: 0,
            max_object_size_bytes: 0,
        }
    }
}

impl QuotaLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }
}

/// Outcome of a quota check for a prospective write.
///
/// Advisory and non-transactional: evaluation and the subsequent write are
/// not linked, so two concurrent writers can each pass and jointly exceed a
/// limit. Soft-limit semantics are accepted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuotaEvaluation {
    pub exceeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub max_total_bytes: u64,
    pub max_object_size_bytes: u64,
    pub max_object_count: u64,
    pub current_total_bytes: u64,
    pub current_object_count: u64,
    pub incoming_bytes: u64,
}

impl QuotaEvaluation {
    /// An evaluation that passed all configured limits.
    pub fn ok(limits: QuotaLimits, current_total_bytes: u64, current_object_count: u64, incoming_bytes: u64) -> Self {
        QuotaEvaluation {
            exceeded: false,
            reason: None,
            max_total_bytes: limits.max_total_bytes,
            max_object_size_bytes: limits.max_object_size_bytes,
            max_object_count: limits.max_object_count,
            current_total_bytes,
            current_object_count,
            incoming_bytes,
        }
    }
}
