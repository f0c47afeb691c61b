//! Persisted token-bucket state (spec §3, §4.5). The in-process
//! `governor` limiter layered in front of this (C5) absorbs most reads;
//! this row exists so a restart does not reset a caller's bucket to
//! full capacity.

use chrono::{DateTime, Utc};
use common::{MerchantId, ServiceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitBucketKey {
    pub service_id: ServiceId,
    pub merchant_id: Option<MerchantId>,
}

impl RateLimitBucketKey {
    pub fn as_storage_key(&self) -> String {
        match self.merchant_id {
            Some(m) => format!("{}:{}", self.service_id, m),
            None => self.service_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitBucket {
    pub key: String,
    pub tokens: f64,
    pub capacity: f64,
    pub refill_rate_per_sec: f64,
    pub last_refill_at: DateTime<Utc>,
}

impl RateLimitBucket {
    /// Lazily refills based on wall-clock delta, then attempts to
    /// consume one token. Returns whether the consume succeeded and the
    /// bucket state to persist back.
    pub fn refill_and_consume(mut self, now: DateTime<Utc>) -> (bool, Self) {
        let elapsed = (now - self.last_refill_at).num_milliseconds().max(0) as f64 / 1000.0;
        let refilled = (self.tokens + elapsed * self.refill_rate_per_sec).min(self.capacity);
        self.tokens = refilled;
        self.last_refill_at = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            (true, self)
        } else {
            (false, self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refills_to_capacity_after_enough_time() {
        let bucket = RateLimitBucket {
            key: "svc1".into(),
            tokens: 0.0,
            capacity: 10.0,
            refill_rate_per_sec: 1.0,
            last_refill_at: Utc::now() - chrono::Duration::seconds(10),
        };
        let (ok, after) = bucket.refill_and_consume(Utc::now());
        assert!(ok);
        assert!(after.tokens >= 8.0);
    }

    #[test]
    fn exhausted_bucket_rejects() {
        let bucket = RateLimitBucket {
            key: "svc1".into(),
            tokens: 0.0,
            capacity: 10.0,
            refill_rate_per_sec: 1.0,
            last_refill_at: Utc::now(),
        };
        let (ok, _) = bucket.refill_and_consume(Utc::now());
        assert!(!ok);
    }
}
