//! Usage ledger: durable record of successful publishes

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::store::{LedgerStore, UsageLedgerState};
use crate::clock::{day_start, month_start, Clock};
use crate::types::PostEvent;

/// Append-only record of publish events with monthly rollover
///
/// The in-memory state is authoritative. Store failures are logged and
/// otherwise ignored, so a read-only disk degrades to per-process counting.
pub struct UsageLedger {
    pub(super) state: UsageLedgerState,
    store: Box<dyn LedgerStore>,
    pub(super) clock: Arc<dyn Clock>,
}

impl UsageLedger {
    /// Load the ledger from `store`, starting fresh if it is absent or unreadable
    pub fn open(store: Box<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let state = match store.load(now) {
            Ok(Some(state)) => {
                debug!("Loaded usage ledger with {} post(s)", state.posts.len());
                state
            }
            Ok(None) => {
                debug!("No usage ledger found, starting fresh");
                UsageLedgerState::fresh(now)
            }
            Err(e) => {
                warn!("Could not load usage ledger, starting fresh: {}", e);
                UsageLedgerState::fresh(now)
            }
        };

        Self {
            state,
            store,
            clock,
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Current state, without applying rollover
    pub fn state(&self) -> &UsageLedgerState {
        &self.state
    }

    /// Record a confirmed publish at the current instant
    pub fn record_post(&mut self, id: &str) {
        self.roll_over();

        let timestamp = self.clock.now();
        self.state.posts.push(PostEvent {
            id: id.to_string(),
            timestamp,
        });
        self.persist();

        debug!("Recorded post {} at {}", id, timestamp);
    }

    /// Posts counted toward the current month
    pub fn monthly_usage(&mut self) -> u32 {
        self.roll_over();
        let reset = self.state.monthly_reset;
        self.count_since(reset)
    }

    /// Posts made since local midnight
    pub fn daily_usage(&mut self) -> u32 {
        self.roll_over();
        let today = day_start(self.clock.now());
        self.count_since(today.max(self.state.monthly_reset))
    }

    fn count_since(&self, since: NaiveDateTime) -> u32 {
        self.state
            .posts
            .iter()
            .filter(|post| post.timestamp >= since)
            .count() as u32
    }

    /// Apply month rollover and prune stale posts
    ///
    /// Entering a later month clears every post and moves `monthly_reset`
    /// forward. Unused quota never carries over.
    pub(super) fn roll_over(&mut self) {
        let current = month_start(self.clock.now());

        if current > self.state.monthly_reset {
            info!(
                "New month detected, resetting post counter ({} post(s) from previous period dropped)",
                self.state.posts.len()
            );
            self.state.posts.clear();
            self.state.monthly_reset = current;
            self.persist();
            return;
        }

        let reset = self.state.monthly_reset;
        let before = self.state.posts.len();
        self.state.posts.retain(|post| post.timestamp >= reset);
        if self.state.posts.len() != before {
            debug!("Pruned {} post(s) older than {}", before - self.state.posts.len(), reset);
            self.persist();
        }
    }

    /// Write the state out, logging and swallowing failures
    pub(super) fn persist(&self) {
        if let Err(e) = self.store.save(&self.state) {
            warn!("Could not save usage ledger: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limiter::store::JsonFileStore;
    use chrono::TimeDelta;
    use tempfile::TempDir;

    fn ledger_at(clock: &ManualClock) -> (TempDir, UsageLedger) {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path().join("usage.json"));
        let ledger = UsageLedger::open(Box::new(store), Arc::new(clock.clone()));
        (temp, ledger)
    }

    #[test]
    fn test_fresh_ledger_is_empty() {
        let clock = ManualClock::at(2025, 7, 14, 10, 0);
        let (_temp, mut ledger) = ledger_at(&clock);

        assert_eq!(ledger.monthly_usage(), 0);
        assert_eq!(ledger.daily_usage(), 0);
        assert_eq!(ledger.state().monthly_reset, month_start(clock.now()));
    }

    #[test]
    fn test_monthly_usage_counts_every_record() {
        let clock = ManualClock::at(2025, 7, 1, 8, 0);
        let (_temp, mut ledger) = ledger_at(&clock);

        for i in 0..12 {
            ledger.record_post(&format!("id-{}", i));
            clock.advance(TimeDelta::hours(20));
            assert_eq!(ledger.monthly_usage(), i + 1);
        }
    }

    #[test]
    fn test_daily_usage_excludes_previous_days() {
        let clock = ManualClock::at(2025, 7, 10, 22, 0);
        let (_temp, mut ledger) = ledger_at(&clock);

        ledger.record_post("yesterday-1");
        ledger.record_post("yesterday-2");
        clock.advance(TimeDelta::hours(3)); // 01:00 on the 11th
        ledger.record_post("today-1");

        assert_eq!(ledger.daily_usage(), 1);
        assert_eq!(ledger.monthly_usage(), 3);
        // Yesterday's posts are kept until the month ends
        assert_eq!(ledger.state().posts.len(), 3);
    }

    #[test]
    fn test_month_boundary_resets_usage() {
        let clock = ManualClock::at(2025, 7, 31, 23, 30);
        let (_temp, mut ledger) = ledger_at(&clock);

        ledger.record_post("last-of-july");
        assert_eq!(ledger.monthly_usage(), 1);

        clock.advance(TimeDelta::hours(1)); // August 1st, 00:30
        assert_eq!(ledger.monthly_usage(), 0);
        assert_eq!(ledger.daily_usage(), 0);
        assert!(ledger.state().posts.is_empty());
        assert_eq!(ledger.state().monthly_reset, month_start(clock.now()));
    }

    #[test]
    fn test_skipping_several_months_resets_once() {
        let clock = ManualClock::at(2025, 1, 15, 12, 0);
        let (_temp, mut ledger) = ledger_at(&clock);
        ledger.record_post("january");

        clock.set(NaiveDateTime::parse_from_str("2025-05-03 09:00:00", "%Y-%m-%d %H:%M:%S").unwrap());
        assert_eq!(ledger.monthly_usage(), 0);
        assert_eq!(
            ledger.state().monthly_reset,
            NaiveDateTime::parse_from_str("2025-05-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
        );
    }

    #[test]
    fn test_record_post_persists() {
        let clock = ManualClock::at(2025, 7, 14, 10, 0);
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("usage.json");

        {
            let mut ledger =
                UsageLedger::open(Box::new(JsonFileStore::new(&path)), Arc::new(clock.clone()));
            ledger.record_post("persisted");
        }

        let mut reopened =
            UsageLedger::open(Box::new(JsonFileStore::new(&path)), Arc::new(clock.clone()));
        assert_eq!(reopened.monthly_usage(), 1);
        assert_eq!(reopened.state().posts[0].id, "persisted");
    }

    #[test]
    fn test_unwritable_store_keeps_counting_in_memory() {
        let clock = ManualClock::at(2025, 7, 14, 10, 0);
        let temp = TempDir::new().unwrap();
        // A regular file where the parent directory should be makes every save fail
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let store = JsonFileStore::new(blocker.join("usage.json"));

        let mut ledger = UsageLedger::open(Box::new(store), Arc::new(clock.clone()));
        ledger.record_post("a");
        ledger.record_post("b");
        assert_eq!(ledger.monthly_usage(), 2);
    }
}
