use crate::config::BudgetConfig;
use chrono::{Datelike, Local, NaiveDate, TimeZone};
use serde::Serialize;

/// Client-side estimate of the consumable request budget.
///
/// The provider gives no quota feedback, so this ledger is best-effort
/// local accounting: `reserve` returning `false` is a normal "skip work"
/// signal, never an error, and the ledger itself has no failure mode.
#[derive(Debug, Clone)]
pub struct CreditLedger {
    budget_monthly: u64,
    limit_daily: u64,
    low_budget_threshold: u64,
    used_monthly: u64,
    used_daily: u64,
    /// First instant of the next local calendar month.
    reset_at_millis: u64,
    day_key: i32,
    low_budget_warned: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    #[serde(rename = "usedMonthly")]
    pub used_monthly: u64,
    #[serde(rename = "remainingMonthly")]
    pub remaining_monthly: u64,
    #[serde(rename = "usedDaily")]
    pub used_daily: u64,
    #[serde(rename = "limitDaily")]
    pub limit_daily: u64,
    #[serde(rename = "resetAtMillis")]
    pub reset_at_millis: u64,
}

impl CreditLedger {
    pub fn new(config: &BudgetConfig, now_millis: u64) -> Self {
        Self {
            budget_monthly: config.monthly_budget,
            limit_daily: config.daily_limit,
            low_budget_threshold: config.low_budget_threshold,
            used_monthly: 0,
            used_daily: 0,
            reset_at_millis: next_month_start_millis(now_millis),
            day_key: local_day_key(now_millis),
            low_budget_warned: false,
        }
    }

    /// Idempotent window rollover; callers invoke this before any read.
    pub fn rollover_if_needed(&mut self, now_millis: u64) {
        let day = local_day_key(now_millis);
        if day != self.day_key {
            self.day_key = day;
            self.used_daily = 0;
        }
        if now_millis >= self.reset_at_millis {
            self.used_monthly = 0;
            self.low_budget_warned = false;
            self.reset_at_millis = next_month_start_millis(now_millis);
            tracing::info!(
                budget = self.budget_monthly,
                "monthly request budget reset"
            );
        }
    }

    /// Pure pre-check; does not consume anything.
    pub fn reserve(&self, cost: u64) -> bool {
        self.remaining_monthly() >= cost && self.used_daily + cost <= self.limit_daily
    }

    pub fn record(&mut self, cost: u64) {
        self.used_monthly += cost;
        self.used_daily += cost;
        if !self.low_budget_warned && self.remaining_monthly() < self.low_budget_threshold {
            self.low_budget_warned = true;
            tracing::warn!(
                remaining = self.remaining_monthly(),
                used = self.used_monthly,
                "monthly request budget running low"
            );
        }
    }

    pub fn remaining_monthly(&self) -> u64 {
        self.budget_monthly.saturating_sub(self.used_monthly)
    }

    pub fn used_monthly(&self) -> u64 {
        self.used_monthly
    }

    pub fn used_daily(&self) -> u64 {
        self.used_daily
    }

    pub fn remaining_daily(&self) -> u64 {
        self.limit_daily.saturating_sub(self.used_daily)
    }

    pub fn limit_daily(&self) -> u64 {
        self.limit_daily
    }

    pub fn low_budget_warned(&self) -> bool {
        self.low_budget_warned
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            used_monthly: self.used_monthly,
            remaining_monthly: self.remaining_monthly(),
            used_daily: self.used_daily,
            limit_daily: self.limit_daily,
            reset_at_millis: self.reset_at_millis,
        }
    }
}

fn local_datetime(now_millis: u64) -> chrono::DateTime<Local> {
    Local
        .timestamp_millis_opt(now_millis as i64)
        .single()
        .unwrap_or_else(Local::now)
}

fn local_day_key(now_millis: u64) -> i32 {
    local_datetime(now_millis).date_naive().num_days_from_ce()
}

fn next_month_start_millis(now_millis: u64) -> u64 {
    let now = local_datetime(now_millis);
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        // local midnight can be skipped or doubled around DST changes
        .and_then(|start| Local.from_local_datetime(&start).earliest())
        .map(|start| start.timestamp_millis() as u64)
        .unwrap_or(now_millis + 31 * 24 * 60 * 60 * 1000)
}
