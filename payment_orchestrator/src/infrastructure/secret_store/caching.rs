//! TTL-bounded in-memory cache in front of any `SecretStore` (spec
//! §4.2: "In-memory cache keyed by path, TTL-bounded (default 5 min),
//! per-process... invalidated on `put` and `delete`"). Grounded on the
//! credential cache's (C3) same TTL-plus-mutex shape, kept here as its
//! own adapter since C2 and C3 are cached independently.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::secret_store::{RotationResult, SecretStore, SecretStoreError, VersionedSecret};

struct CacheEntry {
    secret: VersionedSecret,
    cached_at: Instant,
}

pub struct CachingSecretStore<S: SecretStore> {
    inner: S,
    ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl<S: SecretStore> CachingSecretStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, path: &str) -> Option<VersionedSecret> {
        let cache = self.cache.lock().unwrap();
        let entry = cache.get(path)?;
        if entry.cached_at.elapsed() < self.ttl {
            Some(entry.secret.clone())
        } else {
            None
        }
    }

    fn store(&self, path: &str, secret: VersionedSecret) {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(
            path.to_string(),
            CacheEntry {
                secret,
                cached_at: Instant::now(),
            },
        );
    }

    fn invalidate(&self, path: &str) {
        self.cache.lock().unwrap().remove(path);
    }
}

#[async_trait]
impl<S: SecretStore> SecretStore for CachingSecretStore<S> {
    async fn get_latest(&self, path: &str) -> Result<VersionedSecret, SecretStoreError> {
        if let Some(secret) = self.cached(path) {
            return Ok(secret);
        }
        let secret = self.inner.get_latest(path).await?;
        self.store(path, secret.clone());
        Ok(secret)
    }

    async fn get_version(&self, path: &str, version: u32) -> Result<String, SecretStoreError> {
        // Previously-rotated versions are not cached: only the latest
        // version is kept warm, matching the spec's stated purpose
        // (verifying callbacks signed under the prior key during
        // rotation), not general-purpose historical lookups.
        self.inner.get_version(path, version).await
    }

    async fn put(&self, path: &str, value: String) -> Result<u32, SecretStoreError> {
        let version = self.inner.put(path, value).await?;
        self.invalidate(path);
        Ok(version)
    }

    async fn rotate(
        &self,
        path: &str,
        new_value: String,
    ) -> Result<RotationResult, SecretStoreError> {
        let result = self.inner.rotate(path, new_value).await?;
        self.invalidate(path);
        Ok(result)
    }

    async fn delete(&self, path: &str) -> Result<(), SecretStoreError> {
        self.inner.delete(path).await?;
        self.invalidate(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStore {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SecretStore for CountingStore {
        async fn get_latest(&self, _path: &str) -> Result<VersionedSecret, SecretStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(VersionedSecret {
                value: "v".into(),
                version: 1,
            })
        }
        async fn get_version(&self, _path: &str, _version: u32) -> Result<String, SecretStoreError> {
            unimplemented!()
        }
        async fn put(&self, _path: &str, _value: String) -> Result<u32, SecretStoreError> {
            unimplemented!()
        }
        async fn rotate(
            &self,
            _path: &str,
            _new_value: String,
        ) -> Result<RotationResult, SecretStoreError> {
            unimplemented!()
        }
        async fn delete(&self, _path: &str) -> Result<(), SecretStoreError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn second_read_within_ttl_hits_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = CachingSecretStore::new(
            CountingStore { calls: calls.clone() },
            Duration::from_secs(300),
        );

        store.get_latest("p").await.unwrap();
        store.get_latest("p").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
