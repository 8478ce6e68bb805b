//! Posting quota enforcement
//!
//! Keeps the agent inside the platform's posting quotas. A [`UsageLedger`]
//! counts successful publishes per month and per day, a lockout remembers
//! when the platform last throttled us, and [`RateLimiter::can_post`]
//! combines both into a single admission decision.
//!
//! ```no_run
//! use libgenie::rate_limiter::{QuotaLimits, RateLimiter};
//!
//! let mut limiter = RateLimiter::open("usage.json", QuotaLimits::default());
//! let decision = limiter.can_post(50);
//! if decision.allowed {
//!     // publish, then:
//!     limiter.record_post("1890123456789");
//! } else {
//!     eprintln!("{}", decision.message);
//! }
//! ```

pub mod ledger;
pub mod lockout;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::info;

use crate::clock::{next_month_start, Clock, SystemClock};

pub use ledger::UsageLedger;
pub use lockout::LockoutStatus;
pub use store::{JsonFileStore, LedgerStore, UsageLedgerState};

/// Posting quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub monthly: u32,
    /// Stricter than `monthly / 30` on purpose, to spread posts across the month
    pub daily: u32,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            monthly: 500,
            daily: 17,
        }
    }
}

/// Derived usage numbers, recomputed on demand and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub monthly_used: u32,
    pub monthly_limit: u32,
    pub monthly_remaining: u32,
    pub daily_used: u32,
    pub daily_limit: u32,
    pub daily_remaining: u32,
}

/// Why an admission decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    LockedOut { until: NaiveDateTime },
    MonthlyLimit,
    DailyLimit,
    NearMonthlyLimit,
    Ok,
}

/// Outcome of [`RateLimiter::can_post`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
    pub message: String,
}

impl QuotaDecision {
    fn allow(reason: DecisionReason, message: String) -> Self {
        Self {
            allowed: true,
            reason,
            message,
        }
    }

    fn deny(reason: DecisionReason, message: String) -> Self {
        Self {
            allowed: false,
            reason,
            message,
        }
    }
}

/// Admission control over the usage ledger and lockout guard
pub struct RateLimiter {
    ledger: UsageLedger,
    limits: QuotaLimits,
}

impl RateLimiter {
    /// Open a limiter backed by a JSON ledger file and the system clock
    pub fn open(path: impl Into<PathBuf>, limits: QuotaLimits) -> Self {
        Self::with_store(
            Box::new(JsonFileStore::new(path)),
            Arc::new(SystemClock),
            limits,
        )
    }

    pub fn with_store(
        store: Box<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        limits: QuotaLimits,
    ) -> Self {
        Self {
            ledger: UsageLedger::open(store, clock),
            limits,
        }
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Record a confirmed publish and log the updated counters
    pub fn record_post(&mut self, id: &str) {
        self.ledger.record_post(id);

        let snapshot = self.snapshot();
        info!(
            "Post recorded. Monthly: {}/{}, Daily: {}/{}",
            snapshot.monthly_used,
            snapshot.monthly_limit,
            snapshot.daily_used,
            snapshot.daily_limit
        );
    }

    pub fn monthly_usage(&mut self) -> u32 {
        self.ledger.monthly_usage()
    }

    pub fn daily_usage(&mut self) -> u32 {
        self.ledger.daily_usage()
    }

    pub fn snapshot(&mut self) -> QuotaSnapshot {
        let monthly_used = self.ledger.monthly_usage();
        let daily_used = self.ledger.daily_usage();

        QuotaSnapshot {
            monthly_used,
            monthly_limit: self.limits.monthly,
            monthly_remaining: self.limits.monthly.saturating_sub(monthly_used),
            daily_used,
            daily_limit: self.limits.daily,
            daily_remaining: self.limits.daily.saturating_sub(daily_used),
        }
    }

    pub fn is_locked_out(&mut self) -> LockoutStatus {
        self.ledger.is_locked_out()
    }

    pub fn set_lockout(&mut self, hours: u32) -> NaiveDateTime {
        self.ledger.set_lockout(hours)
    }

    pub fn clear_lockout(&mut self) {
        self.ledger.clear_lockout()
    }

    /// Decide whether a publish may go ahead
    ///
    /// Checks run in order and the first match wins: lockout, monthly limit,
    /// daily limit, then the warning threshold on monthly headroom. Calling
    /// this repeatedly never changes the counters.
    pub fn can_post(&mut self, warn_threshold: u32) -> QuotaDecision {
        if let LockoutStatus::Locked { until } = self.ledger.is_locked_out() {
            let remaining = until - self.ledger.now();
            let hours = remaining.num_hours();
            let minutes = remaining.num_minutes() % 60;
            return QuotaDecision::deny(
                DecisionReason::LockedOut { until },
                format!(
                    "Rate limit lockout active after the platform returned 429. \
                     Wait {}h {}m (until {}) before trying again.",
                    hours,
                    minutes,
                    until.format("%H:%M:%S")
                ),
            );
        }

        let snapshot = self.snapshot();

        if snapshot.monthly_remaining == 0 {
            return QuotaDecision::deny(
                DecisionReason::MonthlyLimit,
                format!(
                    "Monthly limit reached! Used {}/{} posts. Resets on {}.",
                    snapshot.monthly_used,
                    snapshot.monthly_limit,
                    self.next_reset().format("%B %d, %Y")
                ),
            );
        }

        if snapshot.daily_remaining == 0 {
            return QuotaDecision::deny(
                DecisionReason::DailyLimit,
                format!(
                    "Daily limit reached! Posted {}/{} today. \
                     {} posts still remain this month; wait until tomorrow to spread usage.",
                    snapshot.daily_used, snapshot.daily_limit, snapshot.monthly_remaining
                ),
            );
        }

        if snapshot.monthly_remaining <= warn_threshold {
            return QuotaDecision::allow(
                DecisionReason::NearMonthlyLimit,
                format!(
                    "Warning: only {} posts remaining this month! Used {}/{}.",
                    snapshot.monthly_remaining, snapshot.monthly_used, snapshot.monthly_limit
                ),
            );
        }

        QuotaDecision::allow(
            DecisionReason::Ok,
            format!(
                "Rate limit OK. Monthly: {}/{} used, Daily: {}/{} used.",
                snapshot.monthly_used,
                snapshot.monthly_limit,
                snapshot.daily_used,
                snapshot.daily_limit
            ),
        )
    }

    /// First day of next calendar month
    pub fn next_reset(&self) -> NaiveDateTime {
        next_month_start(self.ledger.now())
    }

    /// Human-readable usage report
    pub fn usage_report(&mut self) -> String {
        let snapshot = self.snapshot();
        let rule = "-".repeat(44);

        let mut report = String::new();
        report.push_str(&rule);
        report.push_str("\nPlatform API Usage Report\n");
        report.push_str(&rule);
        report.push('\n');
        report.push_str(&format!(
            "Monthly Usage:  {:>3} / {} posts\n",
            snapshot.monthly_used, snapshot.monthly_limit
        ));
        report.push_str(&format!(
            "Monthly Left:   {:>3} posts\n",
            snapshot.monthly_remaining
        ));
        report.push_str(&format!(
            "Daily Usage:    {:>3} / {} posts\n",
            snapshot.daily_used, snapshot.daily_limit
        ));
        report.push_str(&format!("Daily Left:     {:>3} posts\n", snapshot.daily_remaining));
        report.push_str(&rule);
        report.push('\n');
        report.push_str(&format!(
            "Next Reset:     {}\n",
            self.next_reset().format("%B %d, %Y")
        ));
        if let LockoutStatus::Locked { until } = self.ledger.is_locked_out() {
            report.push_str(&format!(
                "Locked Until:   {}\n",
                until.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        report.push_str(&rule);
        report.push('\n');
        report
    }
}
