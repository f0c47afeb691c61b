//! Retry/backoff policy (spec §4.4): exponential backoff, base delay
//! 100 ms, multiplier 2, max 30 s, ±10% jitter on each attempt, attempt
//! cap 6. Only `GatewayError::is_retriable` errors (transient transport
//! failures) are retried; declines and invalid-request codes return on
//! the first attempt.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::domain::gateway::GatewayError;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 6,
        }
    }
}

impl RetryConfig {
    /// Delay before the given 0-indexed attempt, with ±10% jitter.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let scaled = base_ms * self.multiplier.powi(attempt as i32);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        let jitter_fraction = rand::thread_rng().gen_range(-0.10..=0.10);
        let jittered = (capped * (1.0 + jitter_fraction)).max(0.0);
        Duration::from_millis(jittered.round() as u64)
    }
}

/// Runs `op` up to `config.max_attempts` times, sleeping between
/// attempts per the exponential-backoff schedule. Stops retrying as
/// soon as an error is not `is_retriable()`.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut op: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retriable() && attempt + 1 < config.max_attempts => {
                tokio::time::sleep(config.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transport_errors_up_to_cap() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            multiplier: 1.0,
            max_delay: Duration::from_millis(5),
            max_attempts: 6,
        };
        let attempts = AtomicU32::new(0);
        let result: Result<(), GatewayError> = with_retry(&config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Transport("boom".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn does_not_retry_declines() {
        let config = RetryConfig::default();
        let attempts = AtomicU32::new(0);
        let result: Result<(), GatewayError> = with_retry(&config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(GatewayError::Declined {
                    code: "05".into(),
                    text: "declined".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            multiplier: 1.0,
            max_delay: Duration::from_millis(5),
            max_attempts: 6,
        };
        let attempts = AtomicU32::new(0);
        let result = with_retry(&config, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(GatewayError::Transport("timeout".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delay_never_exceeds_max_by_more_than_jitter() {
        let config = RetryConfig::default();
        for attempt in 0..10 {
            let delay = config.delay_for_attempt(attempt);
            assert!(delay <= Duration::from_millis(33_000));
        }
    }
}
