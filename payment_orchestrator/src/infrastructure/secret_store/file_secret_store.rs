//! File-backed `SecretStore` (spec §6 `secret_store_backend: file`) —
//! the concrete choice out of core scope per spec §1, implemented here
//! as the simplest thing that satisfies the port: one file per version
//! under `{root}/{path}/v{n}`, `path` sanitized to a filesystem-safe
//! slug so a merchant's `mac_secret_path` can't escape the root.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::secret_store::{RotationResult, SecretStore, SecretStoreError, VersionedSecret};

pub struct FileSecretStore {
    root: PathBuf,
}

impl FileSecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_dir(&self, path: &str) -> PathBuf {
        let slug: String = path
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(slug)
    }

    async fn latest_version(dir: &Path) -> Result<Option<u32>, SecretStoreError> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SecretStoreError::Backend(e.to_string())),
        };

        let mut max_version = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SecretStoreError::Backend(e.to_string()))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(v) = name.strip_prefix('v').and_then(|n| n.parse::<u32>().ok()) {
                    max_version = Some(max_version.map_or(v, |m: u32| m.max(v)));
                }
            }
        }
        Ok(max_version)
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_latest(&self, path: &str) -> Result<VersionedSecret, SecretStoreError> {
        let dir = self.path_dir(path);
        let version = Self::latest_version(&dir)
            .await?
            .ok_or_else(|| SecretStoreError::NotFound(path.to_string()))?;
        let value = self.get_version(path, version).await?;
        Ok(VersionedSecret { value, version })
    }

    async fn get_version(&self, path: &str, version: u32) -> Result<String, SecretStoreError> {
        let file = self.path_dir(path).join(format!("v{version}"));
        fs::read_to_string(&file)
            .await
            .map(|s| s.trim_end_matches('\n').to_string())
            .map_err(|_| SecretStoreError::VersionNotFound(path.to_string(), version))
    }

    async fn put(&self, path: &str, value: String) -> Result<u32, SecretStoreError> {
        let dir = self.path_dir(path);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SecretStoreError::Backend(e.to_string()))?;
        let next_version = Self::latest_version(&dir).await?.unwrap_or(0) + 1;
        fs::write(dir.join(format!("v{next_version}")), value)
            .await
            .map_err(|e| SecretStoreError::Backend(e.to_string()))?;
        Ok(next_version)
    }

    /// Creates a new version without deleting the previous one (spec
    /// §4.2: "callers may continue verifying gateway callbacks signed
    /// with the prior version for the cache lifetime").
    async fn rotate(
        &self,
        path: &str,
        new_value: String,
    ) -> Result<RotationResult, SecretStoreError> {
        let previous = self.get_latest(path).await?;
        let new_version = self.put(path, new_value).await?;
        let current = VersionedSecret {
            value: self.get_version(path, new_version).await?,
            version: new_version,
        };
        Ok(RotationResult { previous, current })
    }

    async fn delete(&self, path: &str) -> Result<(), SecretStoreError> {
        let dir = self.path_dir(path);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SecretStoreError::Backend(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rotate_keeps_previous_version_readable() {
        let dir = std::env::temp_dir().join(format!("secret-store-test-{}", uuid::Uuid::new_v4()));
        let store = FileSecretStore::new(&dir);

        let v1 = store.put("merchants/m1/mac", "first".into()).await.unwrap();
        let result = store
            .rotate("merchants/m1/mac", "second".into())
            .await
            .unwrap();

        assert_eq!(result.previous.version, v1);
        assert_eq!(result.current.value, "second");
        assert_eq!(
            store.get_version("merchants/m1/mac", v1).await.unwrap(),
            "first"
        );

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn get_latest_missing_path_errors() {
        let dir = std::env::temp_dir().join(format!("secret-store-test-{}", uuid::Uuid::new_v4()));
        let store = FileSecretStore::new(&dir);
        assert!(store.get_latest("nope").await.is_err());
    }
}
