//! Silo Storage Library
//!
//! Physical storage backends behind the `ObjectStore` trait. Two adapters are
//! provided: `LocalStore` (filesystem, JSON sidecar metadata) and
//! `MemoryStore` (in-process, used in tests and ephemeral deployments).
//!
//! Keys are tenant-scoped: every bucket and object lives under the tenant's
//! namespace and no adapter ever resolves a key across tenants.

pub mod factory;
pub mod keys;
pub mod local;
pub mod memory;
pub mod traits;

pub use factory::create_store;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use traits::{compute_etag, ObjectStore, StorageError, StorageResult};
