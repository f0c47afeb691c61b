//! Per-adapter-instance circuit breaker (spec §4.4): three states
//! {closed, open, half-open}. Closed counts consecutive failures and
//! opens at a threshold; open rejects immediately until a timeout
//! elapses, then half-open admits a bounded number of probes. Any
//! probe failure reopens; any probe success closes and resets counters.
//!
//! Grounded on the pack's `ResiliencePolicy::CircuitBreaker` shape
//! (failure_threshold / recovery_timeout / success_threshold fields)
//! but implemented directly over `std::sync::Mutex` rather than that
//! example's fictional orchestrator crate.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::gateway::GatewayError;

#[derive(Debug, Clone, Copy)]
enum State {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { probes_in_flight: u32 },
}

pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    pub half_open_max_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            half_open_max_probes: 1,
        }
    }
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Call before attempting a gateway request. Returns
    /// `GatewayError::CircuitOpen` if the breaker is open and the
    /// recovery timeout has not yet elapsed, or if half-open has
    /// already admitted its probe quota.
    pub fn before_call(&self) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Closed { .. } => Ok(()),
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.open_timeout {
                    *state = State::HalfOpen {
                        probes_in_flight: 1,
                    };
                    Ok(())
                } else {
                    Err(GatewayError::CircuitOpen)
                }
            }
            State::HalfOpen { probes_in_flight } => {
                if probes_in_flight < self.config.half_open_max_probes {
                    *state = State::HalfOpen {
                        probes_in_flight: probes_in_flight + 1,
                    };
                    Ok(())
                } else {
                    Err(GatewayError::CircuitOpen)
                }
            }
        }
    }

    /// Any success in half-open closes the breaker and resets counters;
    /// a success in closed just keeps the failure counter at zero.
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        *state = State::Closed {
            consecutive_failures: 0,
        };
    }

    /// Any probe failure in half-open reopens immediately. In closed,
    /// failures accumulate until they hit the threshold.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        *state = match *state {
            State::Closed {
                consecutive_failures,
            } => {
                let consecutive_failures = consecutive_failures + 1;
                if consecutive_failures >= self.config.failure_threshold {
                    State::Open {
                        opened_at: Instant::now(),
                    }
                } else {
                    State::Closed {
                        consecutive_failures,
                    }
                }
            }
            State::Open { opened_at } => State::Open { opened_at },
            State::HalfOpen { .. } => State::Open {
                opened_at: Instant::now(),
            },
        };
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        matches!(*self.state.lock().unwrap(), State::Open { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
            half_open_max_probes: 1,
        });
        for _ in 0..3 {
            breaker.before_call().unwrap();
            breaker.record_failure();
        }
        assert!(breaker.is_open());
        assert!(matches!(
            breaker.before_call(),
            Err(GatewayError::CircuitOpen)
        ));
    }

    #[test]
    fn half_open_success_closes_and_resets() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_millis(1),
            half_open_max_probes: 1,
        });
        breaker.before_call().unwrap();
        breaker.record_failure();
        assert!(breaker.is_open());

        std::thread::sleep(Duration::from_millis(5));
        breaker.before_call().unwrap();
        breaker.record_success();
        assert!(!breaker.is_open());

        for _ in 0..10 {
            breaker.before_call().unwrap();
            breaker.record_success();
        }
        assert!(!breaker.is_open());
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_millis(1),
            half_open_max_probes: 1,
        });
        breaker.before_call().unwrap();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        breaker.before_call().unwrap();
        breaker.record_failure();
        assert!(breaker.is_open());
    }
}
