//! Secret store adapters (C2, spec §4.2). `FileSecretStore` is the
//! concrete backend for `SecretStoreBackend::File`; `CachingSecretStore`
//! wraps any inner `SecretStore` with the TTL-bounded in-memory cache
//! the spec requires regardless of backend.

pub mod caching;
pub mod file_secret_store;

pub use caching::CachingSecretStore;
pub use file_secret_store::FileSecretStore;
