use crate::config::BreakerConfig;
use crate::errors::BreakerError;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Mutex;

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at_millis: u64,
    trial_in_flight: bool,
}

/// Trip/recover guard around the analyzer call.
///
/// The open→half-open transition happens lazily on the next call attempt
/// once the recovery timeout has elapsed; there is no background timer.
/// While half-open, exactly one trial call is in flight at a time.
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    recovery_timeout_ms: u64,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            recovery_timeout_ms: config.recovery_timeout_ms,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure_at_millis: 0,
                trial_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    /// Runs `call` unless the breaker rejects it. A rejection is
    /// distinguishable from an upstream failure so callers can fall back
    /// to cache without charging budget.
    pub async fn execute<F, Fut, T, E>(&self, call: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if let Err(retry_in_ms) = self.check_at(now_millis()) {
            return Err(BreakerError::Open { retry_in_ms });
        }
        match call().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure_at(now_millis());
                Err(BreakerError::Upstream(err))
            }
        }
    }

    /// Admission check with an explicit clock; `Err` carries the time
    /// until the next trial is allowed.
    pub fn check_at(&self, now_millis: u64) -> Result<(), u64> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    // another trial is already probing; retry right after
                    // it settles
                    return Err(0);
                }
                inner.trial_in_flight = true;
                Ok(())
            }
            BreakerState::Open => {
                let elapsed = now_millis.saturating_sub(inner.last_failure_at_millis);
                if elapsed > self.recovery_timeout_ms {
                    inner.state = BreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                    inner.trial_in_flight = true;
                    tracing::info!("circuit breaker half-open, allowing trial call");
                    Ok(())
                } else {
                    Err(self.recovery_timeout_ms - elapsed)
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.trial_in_flight = false;
        match inner.state {
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    tracing::info!("circuit breaker closed after successful trials");
                }
            }
            // stale success from before the trip; nothing to do
            BreakerState::Open => {}
        }
    }

    pub fn on_failure_at(&self, now_millis: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.trial_in_flight = false;
        inner.last_failure_at_millis = now_millis;
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.consecutive_successes = 0;
                tracing::warn!("trial call failed, circuit breaker re-opened");
            }
            BreakerState::Open => {}
        }
    }
}
