use crate::config::RateLimiterConfig;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Fixed admission window.
const WINDOW_MS: u64 = 1000;
/// Minimum spacing between admission re-checks by the queue head.
const MIN_RECHECK_MS: u64 = 10;

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    id: u64,
    at_millis: u64,
    weight: u32,
}

struct Waiter {
    id: u64,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct LimiterState {
    samples: VecDeque<Sample>,
    waiters: VecDeque<Waiter>,
    next_id: u64,
}

/// Sliding-window admission control for outbound provider calls.
///
/// Admission is an explicit FIFO ticket queue: only the head ticket may
/// admit, the head sleeps until the earliest retained sample ages out,
/// and each departing head wakes its successor. Admission order is
/// therefore strict arrival order. A failed call removes its own sample,
/// so failures are never charged against the window.
pub struct RateLimiter {
    rate_per_second: u32,
    burst_cap: u32,
    burst_window_ms: u64,
    state: Mutex<LimiterState>,
}

enum HeadWait {
    /// Head of the queue, capacity not yet free; sleep this long.
    Head(u64),
    /// Not head; park until the predecessor departs.
    Parked,
}

impl RateLimiter {
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            rate_per_second: config.rate_per_second.max(1),
            burst_cap: config.burst_cap.max(1),
            burst_window_ms: config.burst_window_ms.max(WINDOW_MS),
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Admits `weight` (waiting for a slot if needed), runs `call`, and
    /// removes the charge again if the call fails.
    pub async fn execute<F, Fut, T, E>(&self, weight: u32, call: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let sample_id = self.admit(weight).await;
        let result = call().await;
        if result.is_err() {
            self.settle_failure(sample_id);
        }
        result
    }

    /// Sync admission core with an explicit clock. Returns the recorded
    /// sample id on admission; queued callers always go first.
    pub fn try_admit_at(&self, now_millis: u64, weight: u32) -> Option<u64> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.waiters.is_empty() {
            return None;
        }
        self.admit_locked(&mut state, now_millis, weight)
    }

    /// Removes the charge for a failed call.
    pub fn settle_failure(&self, sample_id: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.samples.retain(|sample| sample.id != sample_id);
        if let Some(head) = state.waiters.front() {
            head.notify.notify_one();
        }
    }

    pub fn queued_waiters(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .waiters
            .len()
    }

    async fn admit(&self, weight: u32) -> u64 {
        // An oversized weight could never fit; clamp instead of parking the
        // caller forever.
        let weight = weight.min(self.rate_per_second).min(self.burst_cap);
        let notify = Arc::new(Notify::new());
        let ticket_id = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.waiters.is_empty() {
                if let Some(sample_id) = self.admit_locked(&mut state, now_millis(), weight) {
                    return sample_id;
                }
            }
            let id = state.next_id;
            state.next_id += 1;
            state.waiters.push_back(Waiter {
                id,
                notify: notify.clone(),
            });
            id
        };

        loop {
            let wait = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                let now = now_millis();
                let is_head = state.waiters.front().map(|w| w.id) == Some(ticket_id);
                if is_head {
                    if let Some(sample_id) = self.admit_locked(&mut state, now, weight) {
                        state.waiters.pop_front();
                        if let Some(next) = state.waiters.front() {
                            next.notify.notify_one();
                        }
                        return sample_id;
                    }
                    let deadline = self.next_expiry_millis(&state, now);
                    HeadWait::Head(deadline.saturating_sub(now).max(MIN_RECHECK_MS))
                } else {
                    HeadWait::Parked
                }
            };
            match wait {
                HeadWait::Head(delay_ms) => {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                        _ = notify.notified() => {}
                    }
                }
                HeadWait::Parked => notify.notified().await,
            }
        }
    }

    fn admit_locked(
        &self,
        state: &mut LimiterState,
        now_millis: u64,
        weight: u32,
    ) -> Option<u64> {
        state
            .samples
            .retain(|sample| now_millis.saturating_sub(sample.at_millis) < self.burst_window_ms);
        let in_window: u64 = state
            .samples
            .iter()
            .filter(|sample| now_millis.saturating_sub(sample.at_millis) < WINDOW_MS)
            .map(|sample| sample.weight as u64)
            .sum();
        let retained: u64 = state.samples.iter().map(|sample| sample.weight as u64).sum();
        if in_window + weight as u64 > self.rate_per_second as u64 {
            return None;
        }
        if retained + weight as u64 > self.burst_cap as u64 {
            return None;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.samples.push_back(Sample {
            id,
            at_millis: now_millis,
            weight,
        });
        Some(id)
    }

    /// Earliest instant at which capacity can free up by samples aging
    /// out of the 1-second window or the burst horizon.
    fn next_expiry_millis(&self, state: &LimiterState, now_millis: u64) -> u64 {
        let mut next = now_millis + WINDOW_MS;
        for sample in &state.samples {
            let window_expiry = sample.at_millis + WINDOW_MS;
            if window_expiry > now_millis && window_expiry < next {
                next = window_expiry;
            }
            let burst_expiry = sample.at_millis + self.burst_window_ms;
            if burst_expiry > now_millis && burst_expiry < next {
                next = burst_expiry;
            }
        }
        next
    }
}
