//! OpenAPI document for the public surface.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "silo",
        description = "Tenant-aware object storage engine: buckets, objects, multipart uploads, presigned capability URLs, quotas, and on-demand image transforms."
    ),
    paths(
        crate::handlers::health::healthz,
        crate::handlers::buckets::list_buckets,
        crate::handlers::buckets::create_bucket,
        crate::handlers::buckets::delete_bucket,
        crate::handlers::objects::list_objects,
        crate::handlers::objects::put_object,
        crate::handlers::objects::get_object,
        crate::handlers::objects::head_object,
        crate::handlers::objects::delete_object,
        crate::handlers::multipart::initiate,
        crate::handlers::multipart::upload_part,
        crate::handlers::multipart::get_parts,
        crate::handlers::multipart::complete,
        crate::handlers::multipart::abort,
        crate::handlers::presign::presign_object,
        crate::handlers::presign::presign_transform,
        crate::handlers::transform::get_transform,
        crate::handlers::usage::get_usage,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::QuotaErrorExtensions,
        silo_core::models::BucketSummary,
        silo_core::models::ObjectMetadata,
        silo_core::models::ObjectSummary,
        silo_core::models::ListObjectsResponse,
        silo_core::models::PutObjectResponse,
        silo_core::models::UsageResponse,
        silo_core::models::UploadStatus,
        silo_core::models::PartInfo,
        silo_core::models::InitiateMultipartResponse,
        silo_core::models::PartListResponse,
        silo_core::models::CompleteMultipartRequest,
        silo_core::models::CompleteMultipartResponse,
        silo_core::models::PresignRequest,
        silo_core::models::TransformPresignRequest,
        silo_core::models::PresignResponse,
        silo_core::models::QuotaLimits,
        silo_core::models::QuotaEvaluation,
    )),
    tags(
        (name = "buckets", description = "Bucket management"),
        (name = "objects", description = "Object CRUD, conditional requests, ranged reads"),
        (name = "multipart", description = "Multipart upload sessions"),
        (name = "presign", description = "Capability URL issuance"),
        (name = "transform", description = "On-demand image transforms"),
        (name = "usage", description = "Tenant usage"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;
