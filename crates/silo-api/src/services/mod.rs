pub mod cache;
pub mod multipart;
pub mod presign;
pub mod quota;

pub use cache::{CachedResult, ResultCache, TenantVersionStore};
pub use multipart::MultipartUploadManager;
pub use presign::{ObjectCapability, PresignService, TransformCapability};
pub use quota::QuotaService;
