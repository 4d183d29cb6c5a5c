use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MetricsInner {
    counters: HashMap<&'static str, u64>,
    cycle_count: u64,
    cycle_total_ms: u64,
}

/// In-process counters surfaced through the status endpoint.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<Mutex<MetricsInner>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsInner::default())),
        }
    }

    pub fn cycle_started(&self) {
        self.add("radar_cycle_started_total", 1);
    }

    pub fn cycle_completed(&self) {
        self.add("radar_cycle_completed_total", 1);
    }

    pub fn cycle_skipped(&self) {
        self.add("radar_cycle_skipped_total", 1);
    }

    pub fn cycle_failed(&self) {
        self.add("radar_cycle_failed_total", 1);
    }

    pub fn wallets_fetched(&self, count: u64) {
        self.add("radar_wallets_fetched_total", count);
    }

    pub fn cache_hits(&self, count: u64) {
        self.add("radar_cache_hits_total", count);
    }

    pub fn analyzer_failures(&self, count: u64) {
        self.add("radar_analyzer_failures_total", count);
    }

    pub fn breaker_rejections(&self, count: u64) {
        self.add("radar_breaker_rejections_total", count);
    }

    pub fn record_cycle_ms(&self, duration_ms: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.cycle_count += 1;
        inner.cycle_total_ms += duration_ms;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .counters
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> Value {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let counters: HashMap<&str, u64> = inner
            .counters
            .iter()
            .map(|(name, value)| (*name, *value))
            .collect();
        let avg_ms = if inner.cycle_count > 0 {
            inner.cycle_total_ms / inner.cycle_count
        } else {
            0
        };
        json!({
            "counters": counters,
            "cycleCount": inner.cycle_count,
            "cycleAvgMs": avg_ms,
        })
    }

    fn add(&self, name: &'static str, count: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *inner.counters.entry(name).or_insert(0) += count;
    }
}
