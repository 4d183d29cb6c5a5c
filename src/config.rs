use crate::model::ScoreThresholds;
use std::path::PathBuf;

/// Request-budget limits for the metered provider.
///
/// All costs are abstract credit units; the provider gives no quota
/// feedback, so these are enforced entirely client-side.
#[derive(Debug, Clone)]
pub struct BudgetConfig {
    pub monthly_budget: u64,
    pub daily_limit: u64,
    pub cost_per_call: u64,
    /// Minimum budget a cycle must be able to reserve before it starts.
    pub min_cycle_cost: u64,
    /// Remaining-monthly level below which a single warning is logged.
    pub low_budget_threshold: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Admitted weight allowed inside any trailing 1-second window.
    pub rate_per_second: u32,
    /// Total retained weight allowed inside the burst horizon.
    pub burst_cap: u32,
    pub burst_window_ms: u64,
    /// Weight charged per analyzer call.
    pub call_weight: u32,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct QualityTtl {
    pub high_ms: u64,
    pub medium_ms: u64,
    pub low_ms: u64,
}

impl QualityTtl {
    pub fn ttl_for(&self, quality: crate::model::Quality) -> u64 {
        match quality {
            crate::model::Quality::High => self.high_ms,
            crate::model::Quality::Medium => self.medium_ms,
            crate::model::Quality::Low => self.low_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl: QualityTtl,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub chunk_size: usize,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub default_interval_ms: u64,
    pub fast_interval_ms: u64,
    pub slow_interval_ms: u64,
    /// Delay after a cycle skipped for budget exhaustion.
    pub budget_cooldown_ms: u64,
    /// Delay after a cycle that failed unexpectedly.
    pub retry_interval_ms: u64,
    pub rediscovery_interval_ms: u64,
    /// Tracked-set size below which discovery is forced.
    pub min_tracked: usize,
    /// Remaining-daily fraction below which the slow interval is used.
    pub daily_low_fraction: f64,
    /// Remaining-daily fraction above which the fast interval is used.
    pub daily_high_fraction: f64,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub thresholds: ScoreThresholds,
}

#[derive(Debug, Clone)]
pub struct RadarConfig {
    pub budget: BudgetConfig,
    pub limiter: RateLimiterConfig,
    pub breaker: BreakerConfig,
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub scheduler: SchedulerConfig,
    pub provider: ProviderConfig,
    pub store_path: PathBuf,
}

impl RadarConfig {
    /// Builds a config from an injected lookup so tests can supply values
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            budget: BudgetConfig {
                monthly_budget: read_u64(&lookup, "RADAR_MONTHLY_BUDGET", 40_000),
                daily_limit: read_u64(&lookup, "RADAR_DAILY_LIMIT", 1_500),
                cost_per_call: read_u64(&lookup, "RADAR_COST_PER_CALL", 3),
                min_cycle_cost: read_u64(&lookup, "RADAR_MIN_CYCLE_COST", 30),
                low_budget_threshold: read_u64(&lookup, "RADAR_LOW_BUDGET_THRESHOLD", 2_000),
            },
            limiter: RateLimiterConfig {
                rate_per_second: read_u32(&lookup, "RADAR_RATE_PER_SECOND", 5),
                burst_cap: read_u32(&lookup, "RADAR_BURST_CAP", 10),
                burst_window_ms: read_u64(&lookup, "RADAR_BURST_WINDOW_MS", 5_000),
                call_weight: read_u32(&lookup, "RADAR_CALL_WEIGHT", 1),
            },
            breaker: BreakerConfig {
                failure_threshold: read_u32(&lookup, "RADAR_BREAKER_FAILURES", 5),
                success_threshold: read_u32(&lookup, "RADAR_BREAKER_SUCCESSES", 2),
                recovery_timeout_ms: read_u64(&lookup, "RADAR_BREAKER_RECOVERY_MS", 30_000),
            },
            cache: CacheConfig {
                max_entries: read_usize(&lookup, "RADAR_CACHE_MAX_ENTRIES", 10_000),
                ttl: QualityTtl {
                    high_ms: read_u64(&lookup, "RADAR_CACHE_TTL_HIGH_MS", 6 * 60 * 60 * 1000),
                    medium_ms: read_u64(&lookup, "RADAR_CACHE_TTL_MEDIUM_MS", 2 * 60 * 60 * 1000),
                    low_ms: read_u64(&lookup, "RADAR_CACHE_TTL_LOW_MS", 30 * 60 * 1000),
                },
            },
            batch: BatchConfig {
                chunk_size: read_usize(&lookup, "RADAR_CHUNK_SIZE", 10),
            },
            scheduler: SchedulerConfig {
                default_interval_ms: read_u64(&lookup, "RADAR_INTERVAL_MS", 15 * 60 * 1000),
                fast_interval_ms: read_u64(&lookup, "RADAR_FAST_INTERVAL_MS", 5 * 60 * 1000),
                slow_interval_ms: read_u64(&lookup, "RADAR_SLOW_INTERVAL_MS", 2 * 60 * 60 * 1000),
                budget_cooldown_ms: read_u64(&lookup, "RADAR_BUDGET_COOLDOWN_MS", 6 * 60 * 60 * 1000),
                retry_interval_ms: read_u64(&lookup, "RADAR_RETRY_INTERVAL_MS", 10 * 60 * 1000),
                rediscovery_interval_ms: read_u64(&lookup, "RADAR_REDISCOVERY_MS", 60 * 60 * 1000),
                min_tracked: read_usize(&lookup, "RADAR_MIN_TRACKED", 25),
                daily_low_fraction: read_f64(&lookup, "RADAR_DAILY_LOW_FRACTION", 0.2),
                daily_high_fraction: read_f64(&lookup, "RADAR_DAILY_HIGH_FRACTION", 0.6),
            },
            provider: ProviderConfig {
                base_url: lookup("RADAR_PROVIDER_URL")
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| "http://127.0.0.1:9090".to_string()),
                request_timeout_ms: read_u64(&lookup, "RADAR_PROVIDER_TIMEOUT_MS", 10_000),
                thresholds: ScoreThresholds {
                    high: read_f64(&lookup, "RADAR_SCORE_HIGH", 80.0),
                    medium: read_f64(&lookup, "RADAR_SCORE_MEDIUM", 50.0),
                },
            },
            store_path: PathBuf::from(
                lookup("RADAR_STORE_PATH")
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| "data/wallets.json".to_string()),
            ),
        }
    }
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn read_u64<F>(lookup: &F, key: &str, default_value: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).and_then(|value| value.trim().parse::<u64>().ok()) {
        Some(value) if value > 0 => value,
        _ => default_value,
    }
}

fn read_u32<F>(lookup: &F, key: &str, default_value: u32) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).and_then(|value| value.trim().parse::<u32>().ok()) {
        Some(value) if value > 0 => value,
        _ => default_value,
    }
}

fn read_usize<F>(lookup: &F, key: &str, default_value: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).and_then(|value| value.trim().parse::<usize>().ok()) {
        Some(value) if value > 0 => value,
        _ => default_value,
    }
}

fn read_f64<F>(lookup: &F, key: &str, default_value: f64) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).and_then(|value| value.trim().parse::<f64>().ok()) {
        Some(value) if value > 0.0 => value,
        _ => default_value,
    }
}
