//! Token-bucket rate limiting (spec §4.5, §3 "C3... LRU+TTL", §9
//! "global mutable state... rate-limit... kept per-component"). An
//! in-process `governor` limiter absorbs the overwhelming majority of
//! checks without a database round trip; any request it would allow
//! still debits the `RateLimitRepository`-backed bucket so a process
//! restart does not hand every caller a full bucket again.

use governor::{DefaultDirectRateLimiter, Quota};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use crate::domain::error::OrchestratorError;
use crate::domain::rate_limit::RateLimitBucketKey;
use crate::domain::repository::RateLimitRepository;

pub struct RateLimiter {
    repo: Arc<dyn RateLimitRepository>,
    in_process: Mutex<HashMap<String, DefaultDirectRateLimiter>>,
}

impl RateLimiter {
    pub fn new(repo: Arc<dyn RateLimitRepository>) -> Self {
        Self {
            repo,
            in_process: Mutex::new(HashMap::new()),
        }
    }

    /// Returns whether the call identified by `key` is permitted.
    /// `capacity`/`refill_per_second` come from the merchant's or
    /// service's own configured limits (spec §3).
    pub async fn check(
        &self,
        key: &RateLimitBucketKey,
        capacity: u32,
        refill_per_second: u32,
    ) -> Result<bool, OrchestratorError> {
        let storage_key = key.as_storage_key();

        if !self.check_in_process(&storage_key, capacity, refill_per_second) {
            return Ok(false);
        }

        let bucket = self
            .repo
            .get_or_create(&storage_key, capacity as f64, refill_per_second as f64)
            .await?;
        let (allowed, bucket) = bucket.refill_and_consume(chrono::Utc::now());
        self.repo.save(bucket).await?;
        Ok(allowed)
    }

    fn check_in_process(&self, key: &str, capacity: u32, refill_per_second: u32) -> bool {
        let mut limiters = self.in_process.lock().unwrap();
        let limiter = limiters.entry(key.to_string()).or_insert_with(|| {
            let quota = Quota::per_second(NonZeroU32::new(refill_per_second.max(1)).unwrap())
                .allow_burst(NonZeroU32::new(capacity.max(1)).unwrap());
            governor::RateLimiter::direct(quota)
        });
        limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rate_limit::RateLimitBucket;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct InMemoryRateLimitRepo {
        buckets: StdMutex<HashMap<String, RateLimitBucket>>,
    }

    #[async_trait]
    impl RateLimitRepository for InMemoryRateLimitRepo {
        async fn get_or_create(
            &self,
            key: &str,
            capacity: f64,
            refill_rate_per_sec: f64,
        ) -> Result<RateLimitBucket, OrchestratorError> {
            let mut buckets = self.buckets.lock().unwrap();
            Ok(buckets
                .entry(key.to_string())
                .or_insert_with(|| RateLimitBucket {
                    key: key.to_string(),
                    tokens: capacity,
                    capacity,
                    refill_rate_per_sec,
                    last_refill_at: chrono::Utc::now(),
                })
                .clone())
        }

        async fn save(&self, bucket: RateLimitBucket) -> Result<(), OrchestratorError> {
            self.buckets.lock().unwrap().insert(bucket.key.clone(), bucket);
            Ok(())
        }
    }

    #[tokio::test]
    async fn exhausting_burst_capacity_rejects_the_next_call() {
        let repo = Arc::new(InMemoryRateLimitRepo {
            buckets: StdMutex::new(HashMap::new()),
        });
        let limiter = RateLimiter::new(repo);
        let key = RateLimitBucketKey {
            service_id: common::ServiceId::new(),
            merchant_id: None,
        };

        let mut allowed_count = 0;
        for _ in 0..20 {
            if limiter.check(&key, 5, 1).await.unwrap() {
                allowed_count += 1;
            }
        }

        assert!(allowed_count <= 5);
    }
}
