//! Secret store port (C2, spec §4.2). New module — the teacher has no
//! precedent for versioned secret storage, so this follows the same
//! repository-as-port shape as `domain::repository` (one `async_trait`,
//! one concrete adapter underneath).

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedSecret {
    pub value: String,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationResult {
    pub previous: VersionedSecret,
    pub current: VersionedSecret,
}

#[derive(Debug, Error, Clone)]
pub enum SecretStoreError {
    #[error("secret not found at path: {0}")]
    NotFound(String),
    #[error("secret version not found: {0} v{1}")]
    VersionNotFound(String, u32),
    #[error("secret store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_latest(&self, path: &str) -> Result<VersionedSecret, SecretStoreError>;
    async fn get_version(&self, path: &str, version: u32) -> Result<String, SecretStoreError>;
    async fn put(&self, path: &str, value: String) -> Result<u32, SecretStoreError>;
    async fn rotate(&self, path: &str, new_value: String) -> Result<RotationResult, SecretStoreError>;
    async fn delete(&self, path: &str) -> Result<(), SecretStoreError>;
}
