//! Shared constants for headers, scopes, and protocol limits.

/// Header carrying the caller's tenant identifier. Mandatory on every
/// operation; never inferred for anonymous/presigned calls.
pub const TENANT_HEADER: &str = "x-silo-tenant";

/// Header used by the external authorization middleware shim to inject
/// granted scopes into the request (comma-separated).
pub const SCOPES_HEADER: &str = "x-silo-scopes";

/// Scope required for read operations when no presign is supplied.
pub const SCOPE_STORAGE_READ: &str = "storage.read";

/// Scope required for write operations when no presign is supplied.
pub const SCOPE_STORAGE_WRITE: &str = "storage.write";

/// Highest part number accepted for a multipart upload (S3 convention).
pub const MULTIPART_MAX_PART_NUMBER: u32 = 10_000;

/// Prefix under which multipart part artifacts are stored inside a bucket.
/// Keys under this prefix never appear in object listings.
pub const MULTIPART_ARTIFACT_PREFIX: &str = ".uploads/";
