pub mod multipart;
pub mod object;
pub mod presign;
pub mod quota;

pub use multipart::{
    CompleteMultipartRequest, CompleteMultipartResponse, InitiateMultipartResponse, PartInfo,
    PartListResponse, UploadStatus,
};
pub use object::{BucketSummary, ListObjectsResponse, ObjectMetadata, ObjectSummary, PutObjectResponse, UsageResponse};
pub use presign::{
    PresignRequest, PresignResponse, TransformPresignRequest,
};
pub use quota::{QuotaEvaluation, QuotaLimits};
