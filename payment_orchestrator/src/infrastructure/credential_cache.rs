//! Merchant credential cache (C3, spec §4.3). Joins a `Merchant` row
//! from C1 with its MAC secret from C2 under one shared TTL. Backed by
//! `lru::LruCache` for recency tracking; on insert beyond capacity this
//! pops ~10% of the least-recently-used entries in one shot rather than
//! a single eviction, per spec §4.3 ("over-evict to reduce churn") —
//! the spec explicitly does not require strict oldest-first ordering
//! under concurrent access (§9 open question (c)), so a plain `Mutex`
//! around the cache (rather than a lock-free structure) is good enough.

use common::MerchantId;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::domain::error::OrchestratorError;
use crate::domain::merchant::Merchant;
use crate::domain::repository::MerchantRepository;
use crate::domain::secret_store::SecretStore;

#[derive(Clone)]
pub struct MerchantCredentials {
    pub merchant: Merchant,
    pub mac_secret: String,
}

struct Entry {
    credentials: MerchantCredentials,
    cached_at: Instant,
}

pub struct MerchantCredentialCache {
    merchants: Arc<dyn MerchantRepository>,
    secrets: Arc<dyn SecretStore>,
    ttl: Duration,
    cache: Mutex<LruCache<MerchantId, Entry>>,
}

impl MerchantCredentialCache {
    pub fn new(
        merchants: Arc<dyn MerchantRepository>,
        secrets: Arc<dyn SecretStore>,
        ttl: Duration,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            merchants,
            secrets,
            ttl,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(
        &self,
        merchant_id: MerchantId,
    ) -> Result<MerchantCredentials, OrchestratorError> {
        if let Some(credentials) = self.cached(merchant_id) {
            return Ok(credentials);
        }

        let merchant = self
            .merchants
            .find_by_id(merchant_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("merchant {merchant_id}")))?;
        let secret = self
            .secrets
            .get_latest(&merchant.mac_secret_path)
            .await
            .map_err(|e| OrchestratorError::Internal(format!("secret store error: {e}")))?;

        let credentials = MerchantCredentials {
            merchant,
            mac_secret: secret.value,
        };
        self.insert(merchant_id, credentials.clone());
        Ok(credentials)
    }

    pub fn invalidate(&self, merchant_id: MerchantId) {
        self.cache.lock().unwrap().pop(&merchant_id);
    }

    fn cached(&self, merchant_id: MerchantId) -> Option<MerchantCredentials> {
        let mut cache = self.cache.lock().unwrap();
        let entry = cache.get(&merchant_id)?;
        if entry.cached_at.elapsed() < self.ttl {
            Some(entry.credentials.clone())
        } else {
            None
        }
    }

    fn insert(&self, merchant_id: MerchantId, credentials: MerchantCredentials) {
        let mut cache = self.cache.lock().unwrap();
        if cache.len() >= cache.cap().get() {
            over_evict(&mut cache);
        }
        cache.put(
            merchant_id,
            Entry {
                credentials,
                cached_at: Instant::now(),
            },
        );
    }
}

/// Pops ~10% of the least-recently-used entries at once (spec §4.3:
/// "over-evict to reduce churn").
fn over_evict(cache: &mut LruCache<MerchantId, Entry>) {
    let to_evict = (cache.len() / 10).max(1);
    for _ in 0..to_evict {
        if cache.pop_lru().is_none() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::merchant::{Environment, GatewayIdentity};
    use crate::domain::secret_store::{RotationResult, SecretStoreError, VersionedSecret};
    use async_trait::async_trait;
    use chrono::Utc;
    use common::MerchantId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMerchantRepo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MerchantRepository for CountingMerchantRepo {
        async fn create(&self, merchant: Merchant) -> Result<Merchant, OrchestratorError> {
            Ok(merchant)
        }
        async fn update(&self, merchant: Merchant) -> Result<Merchant, OrchestratorError> {
            Ok(merchant)
        }
        async fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, OrchestratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(sample_merchant(id)))
        }
        async fn find_by_slug(&self, _slug: &str) -> Result<Option<Merchant>, OrchestratorError> {
            Ok(None)
        }
        async fn list(&self, _limit: i64, _offset: i64) -> Result<Vec<Merchant>, OrchestratorError> {
            Ok(vec![])
        }
    }

    struct StaticSecretStore;

    #[async_trait]
    impl SecretStore for StaticSecretStore {
        async fn get_latest(&self, _path: &str) -> Result<VersionedSecret, SecretStoreError> {
            Ok(VersionedSecret {
                value: "mac-secret".into(),
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

    fn sample_merchant(id: MerchantId) -> Merchant {
        Merchant {
            id,
            slug: "acme".into(),
            gateway_identity: GatewayIdentity {
                customer_number: "1".into(),
                merchant_number: "2".into(),
                dba_number: "3".into(),
                terminal_number: "4".into(),
            },
            mac_secret_path: "merchants/acme/mac".into(),
            environment: Environment::Sandbox,
            active: true,
            rate_limit_per_second: 50,
            rate_limit_burst: 100,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_get_within_ttl_does_not_hit_repository() {
        let repo = Arc::new(CountingMerchantRepo {
            calls: AtomicUsize::new(0),
        });
        let cache = MerchantCredentialCache::new(
            repo.clone(),
            Arc::new(StaticSecretStore),
            Duration::from_secs(300),
            1024,
        );

        let id = MerchantId::new();
        cache.get(id).await.unwrap();
        cache.get(id).await.unwrap();

        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let repo = Arc::new(CountingMerchantRepo {
            calls: AtomicUsize::new(0),
        });
        let cache = MerchantCredentialCache::new(
            repo.clone(),
            Arc::new(StaticSecretStore),
            Duration::from_secs(300),
            1024,
        );

        let id = MerchantId::new();
        cache.get(id).await.unwrap();
        cache.invalidate(id);
        cache.get(id).await.unwrap();

        assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn eviction_drops_roughly_ten_percent() {
        let cap = NonZeroUsize::new(100).unwrap();
        let mut cache: LruCache<MerchantId, Entry> = LruCache::new(cap);
        for _ in 0..100 {
            cache.put(
                MerchantId::new(),
                Entry {
                    credentials: MerchantCredentials {
                        merchant: sample_merchant(MerchantId::new()),
                        mac_secret: "x".into(),
                    },
                    cached_at: Instant::now(),
                },
            );
        }
        over_evict(&mut cache);
        assert_eq!(cache.len(), 90);
    }
}
