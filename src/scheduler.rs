use crate::batch::{BatchProcessor, ChunkFn, ChunkFuture};
use crate::breaker::{BreakerState, CircuitBreaker};
use crate::cache::ScoreCache;
use crate::config::RadarConfig;
use crate::errors::{BreakerError, FetchError};
use crate::ledger::{CreditLedger, LedgerSnapshot};
use crate::metrics::Metrics;
use crate::model::WalletProfile;
use crate::provider::{DiscoverySource, RecordAnalyzer};
use crate::rate_limiter::RateLimiter;
use crate::store::ReadModelStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Priority for scheduled refresh batches.
pub const CYCLE_PRIORITY: i32 = 1;
/// Priority for administratively triggered batches; drains first.
pub const MANUAL_PRIORITY: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CycleSummary {
    pub candidates: usize,
    #[serde(rename = "cacheHits")]
    pub cache_hits: usize,
    pub fetched: usize,
    /// Requested but omitted: failed, breaker-rejected, or uninteresting.
    pub omitted: usize,
    pub tracked: usize,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed(CycleSummary),
    /// The minimum cycle cost could not be reserved; nothing was spent.
    SkippedBudget,
    /// A cycle was already running; the wake-up was a no-op.
    SkippedRunning,
    Failed(String),
}

/// Drives the periodic refresh cycle: rollover, budget check, discovery
/// or reuse, cache split, batched fetching, publish, and an adaptive
/// next-wake delay derived from the remaining daily budget.
///
/// The ledger, cache, and tracked set are owned here and mutated only by
/// the cycle (or an administrative fetch holding the same running flag),
/// so a plain mutex per resource is enough. Locks are never held across
/// an await point, following the same discipline as the batch drain.
pub struct AdaptiveScheduler {
    config: RadarConfig,
    ledger: Arc<Mutex<CreditLedger>>,
    cache: Arc<Mutex<ScoreCache<WalletProfile>>>,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    batch: BatchProcessor<String, WalletProfile>,
    analyzer: Arc<dyn RecordAnalyzer>,
    discovery: Arc<dyn DiscoverySource>,
    store: Arc<dyn ReadModelStore>,
    metrics: Arc<Metrics>,
    tracked: Arc<Mutex<HashMap<String, WalletProfile>>>,
    last_discovery_millis: Mutex<u64>,
    running: AtomicBool,
}

impl AdaptiveScheduler {
    pub fn new(
        config: RadarConfig,
        analyzer: Arc<dyn RecordAnalyzer>,
        discovery: Arc<dyn DiscoverySource>,
        store: Arc<dyn ReadModelStore>,
        metrics: Arc<Metrics>,
    ) -> Arc<Self> {
        let ledger = Arc::new(Mutex::new(CreditLedger::new(&config.budget, now_millis())));
        let cache = Arc::new(Mutex::new(ScoreCache::new(&config.cache)));
        let limiter = Arc::new(RateLimiter::new(&config.limiter));
        let breaker = Arc::new(CircuitBreaker::new(&config.breaker));
        let process_chunk = make_chunk_fn(
            analyzer.clone(),
            limiter.clone(),
            breaker.clone(),
            ledger.clone(),
            metrics.clone(),
            config.budget.cost_per_call,
            config.limiter.call_weight,
        );
        let batch = BatchProcessor::new(&config.batch, process_chunk);
        Arc::new(Self {
            config,
            ledger,
            cache,
            limiter,
            breaker,
            batch,
            analyzer,
            discovery,
            store,
            metrics,
            tracked: Arc::new(Mutex::new(HashMap::new())),
            last_discovery_millis: Mutex::new(0),
            running: AtomicBool::new(false),
        })
    }

    /// Runs one scheduled refresh cycle. A wake-up that lands while
    /// another cycle (or an administrative fetch) is running is a no-op.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.run_cycle_with_priority(CYCLE_PRIORITY).await
    }

    /// Manually triggered full refresh; its batch preempts queued
    /// scheduled work.
    pub async fn run_manual_cycle(&self) -> CycleOutcome {
        self.run_cycle_with_priority(MANUAL_PRIORITY).await
    }

    async fn run_cycle_with_priority(&self, priority: i32) -> CycleOutcome {
        if self.running.swap(true, Ordering::SeqCst) {
            return CycleOutcome::SkippedRunning;
        }
        let outcome = self.run_cycle_inner(priority).await;
        self.running.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_cycle_inner(&self, priority: i32) -> CycleOutcome {
        let started = now_millis();
        self.metrics.cycle_started();
        tracing::info!("refresh cycle started");

        {
            let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
            ledger.rollover_if_needed(started);
            if !ledger.reserve(self.config.budget.min_cycle_cost) {
                self.metrics.cycle_skipped();
                tracing::info!(
                    remaining_monthly = ledger.remaining_monthly(),
                    used_daily = ledger.used_daily(),
                    "cycle skipped, request budget exhausted"
                );
                return CycleOutcome::SkippedBudget;
            }
        }

        let candidates = self.candidate_addresses(started).await;
        let (fresh, stale) = {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.split_by_freshness_at(&candidates, started)
        };
        self.metrics.cache_hits(fresh.len() as u64);

        {
            // fresh values refresh the tracked set without spending credits
            let mut tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
            for (address, profile) in &fresh {
                tracked.insert(address.clone(), profile.clone());
            }
        }

        let fetched = if stale.is_empty() {
            Vec::new()
        } else {
            match self.batch.submit(stale.clone(), priority).await {
                Ok(profiles) => profiles,
                Err(err) => {
                    self.metrics.cycle_failed();
                    tracing::error!(error = %err, "batch processing failed, deferring to retry");
                    return CycleOutcome::Failed(err.message);
                }
            }
        };

        let finished = now_millis();
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            for profile in &fetched {
                cache.put_at(&profile.address, profile.clone(), profile.quality, finished);
            }
        }
        let published = {
            let mut tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
            for profile in &fetched {
                tracked.insert(profile.address.clone(), profile.clone());
            }
            let mut all: Vec<WalletProfile> = tracked.values().cloned().collect();
            all.sort_by(|a, b| a.address.cmp(&b.address));
            all
        };
        self.store.publish(&published).await;

        let summary = CycleSummary {
            candidates: candidates.len(),
            cache_hits: fresh.len(),
            fetched: fetched.len(),
            omitted: stale.len().saturating_sub(fetched.len()),
            tracked: published.len(),
            duration_ms: finished.saturating_sub(started),
        };
        self.metrics.cycle_completed();
        self.metrics.record_cycle_ms(summary.duration_ms);
        self.metrics.wallets_fetched(summary.fetched as u64);
        tracing::info!(
            candidates = summary.candidates,
            cache_hits = summary.cache_hits,
            fetched = summary.fetched,
            omitted = summary.omitted,
            tracked = summary.tracked,
            "refresh cycle completed"
        );
        CycleOutcome::Completed(summary)
    }

    async fn candidate_addresses(&self, now_millis: u64) -> Vec<String> {
        let tracked_keys: Vec<String> = {
            let tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
            tracked.keys().cloned().collect()
        };
        let needs_discovery = {
            let last = *self
                .last_discovery_millis
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            tracked_keys.len() < self.config.scheduler.min_tracked
                || now_millis.saturating_sub(last) >= self.config.scheduler.rediscovery_interval_ms
        };
        if !needs_discovery {
            return tracked_keys;
        }
        let discovered = self.discovery.discover().await;
        if discovered.is_empty() {
            tracing::warn!("discovery returned no candidates, reusing tracked set");
            return tracked_keys;
        }
        *self
            .last_discovery_millis
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = now_millis;
        // union keeps already-tracked wallets refreshing
        let mut candidates = discovered;
        for address in tracked_keys {
            if !candidates.contains(&address) {
                candidates.push(address);
            }
        }
        candidates
    }

    /// Administrative single-address fetch through the same ledger,
    /// limiter, and breaker instances; no budget bypass.
    pub async fn fetch_one(&self, address: &str) -> Result<Option<WalletProfile>, FetchError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(FetchError::Busy);
        }
        let result = self.fetch_one_inner(address).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn fetch_one_inner(&self, address: &str) -> Result<Option<WalletProfile>, FetchError> {
        let now = now_millis();
        let cost = self.config.budget.cost_per_call;
        {
            let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
            ledger.rollover_if_needed(now);
            if !ledger.reserve(cost) {
                return Err(FetchError::BudgetExhausted);
            }
        }
        let cached = {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.get_at(address, now)
        };
        if let Some(profile) = cached {
            return Ok(Some(profile));
        }
        let outcome = self
            .breaker
            .execute(|| {
                self.limiter
                    .execute(self.config.limiter.call_weight, || {
                        self.analyzer.analyze(address)
                    })
            })
            .await;
        match outcome {
            Ok(result) => {
                self.ledger
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .record(cost);
                if let Some(profile) = &result {
                    let stored_at = now_millis();
                    self.cache
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .put_at(address, profile.clone(), profile.quality, stored_at);
                    self.tracked
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(address.to_string(), profile.clone());
                }
                Ok(result)
            }
            Err(BreakerError::Open { retry_in_ms }) => {
                self.metrics.breaker_rejections(1);
                Err(FetchError::BreakerOpen { retry_in_ms })
            }
            Err(BreakerError::Upstream(err)) => {
                self.metrics.analyzer_failures(1);
                Err(FetchError::Upstream(err))
            }
        }
    }

    /// Next wake-up delay, inversely related to the remaining daily
    /// budget: scarce budget stretches the interval, abundant budget
    /// shortens it.
    pub fn delay_after(&self, outcome: &CycleOutcome) -> Duration {
        let scheduler = &self.config.scheduler;
        match outcome {
            CycleOutcome::Failed(_) => Duration::from_millis(scheduler.retry_interval_ms),
            CycleOutcome::SkippedBudget => Duration::from_millis(scheduler.budget_cooldown_ms),
            CycleOutcome::SkippedRunning => Duration::from_millis(scheduler.default_interval_ms),
            CycleOutcome::Completed(_) => {
                let ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
                if !ledger.reserve(self.config.budget.min_cycle_cost) {
                    return Duration::from_millis(scheduler.budget_cooldown_ms);
                }
                let limit = ledger.limit_daily().max(1);
                let remaining = ledger.remaining_daily() as f64 / limit as f64;
                if remaining < scheduler.daily_low_fraction {
                    Duration::from_millis(scheduler.slow_interval_ms)
                } else if remaining > scheduler.daily_high_fraction {
                    Duration::from_millis(scheduler.fast_interval_ms)
                } else {
                    Duration::from_millis(scheduler.default_interval_ms)
                }
            }
        }
    }

    pub fn ledger_snapshot(&self) -> LedgerSnapshot {
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        ledger.rollover_if_needed(now_millis());
        ledger.snapshot()
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    pub fn cache_size(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn tracked_len(&self) -> usize {
        self.tracked.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn tracked_wallets(&self) -> Vec<WalletProfile> {
        let tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<WalletProfile> = tracked.values().cloned().collect();
        all.sort_by(|a, b| a.address.cmp(&b.address));
        all
    }
}

fn make_chunk_fn(
    analyzer: Arc<dyn RecordAnalyzer>,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    ledger: Arc<Mutex<CreditLedger>>,
    metrics: Arc<Metrics>,
    cost_per_call: u64,
    call_weight: u32,
) -> ChunkFn<String, WalletProfile> {
    Arc::new(move |chunk: Vec<String>| -> ChunkFuture<WalletProfile> {
        let analyzer = analyzer.clone();
        let limiter = limiter.clone();
        let breaker = breaker.clone();
        let ledger = ledger.clone();
        let metrics = metrics.clone();
        Box::pin(async move {
            let mut profiles = Vec::new();
            for address in chunk {
                let outcome = breaker
                    .execute(|| limiter.execute(call_weight, || analyzer.analyze(&address)))
                    .await;
                match outcome {
                    Ok(result) => {
                        // a successful call that found nothing interesting
                        // still consumed provider credits
                        ledger
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .record(cost_per_call);
                        if let Some(profile) = result {
                            profiles.push(profile);
                        }
                    }
                    Err(BreakerError::Open { retry_in_ms }) => {
                        metrics.breaker_rejections(1);
                        tracing::debug!(
                            address = %address,
                            retry_in_ms,
                            "skipped, circuit breaker open"
                        );
                    }
                    Err(BreakerError::Upstream(err)) => {
                        metrics.analyzer_failures(1);
                        tracing::debug!(
                            address = %address,
                            error = %err,
                            "analyzer call failed, omitting"
                        );
                    }
                }
            }
            Ok(profiles)
        })
    })
}

/// Handle for the background scheduler loop. `stop` prevents any new
/// cycle and interrupts the inter-cycle sleep; an in-flight cycle
/// finishes on its own.
pub struct SchedulerHandle {
    stop: tokio::sync::watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

pub fn spawn_scheduler_loop(scheduler: Arc<AdaptiveScheduler>) -> SchedulerHandle {
    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(async move {
        loop {
            if *stop_rx.borrow() {
                break;
            }
            let outcome = scheduler.run_cycle().await;
            let delay = scheduler.delay_after(&outcome);
            tracing::debug!(delay_ms = delay.as_millis() as u64, "next cycle scheduled");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        // handle dropped; nobody can stop us, so stop now
                        break;
                    }
                }
            }
        }
        tracing::info!("scheduler loop stopped");
    });
    SchedulerHandle {
        stop: stop_tx,
        handle,
    }
}
