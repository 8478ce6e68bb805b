//! Lockout guard: cool-down after the platform throttles us
//!
//! Two states. `Open` permits publishing. `Locked` forbids it until a
//! deadline, after which the next check reopens the guard lazily.

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{info, warn};

use super::ledger::UsageLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutStatus {
    Open,
    Locked { until: NaiveDateTime },
}

impl LockoutStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockoutStatus::Locked { .. })
    }

    pub fn until(&self) -> Option<NaiveDateTime> {
        match self {
            LockoutStatus::Open => None,
            LockoutStatus::Locked { until } => Some(*until),
        }
    }
}

impl UsageLedger {
    /// Arm the lockout for `hours` from now and persist it
    pub fn set_lockout(&mut self, hours: u32) -> NaiveDateTime {
        let until = self.clock.now() + TimeDelta::hours(i64::from(hours));
        self.state.lockout_until = Some(until);
        self.persist();

        warn!("Rate limit lockout set until {}", until.format("%Y-%m-%d %H:%M:%S"));
        until
    }

    /// Force the guard open regardless of the deadline
    pub fn clear_lockout(&mut self) {
        self.state.lockout_until = None;
        self.persist();

        info!("Rate limit lockout cleared");
    }

    /// Current guard state
    ///
    /// The only mutation is clearing a lockout whose deadline has passed.
    pub fn is_locked_out(&mut self) -> LockoutStatus {
        let Some(until) = self.state.lockout_until else {
            return LockoutStatus::Open;
        };

        if self.clock.now() >= until {
            info!("Rate limit lockout expired at {}", until.format("%Y-%m-%d %H:%M:%S"));
            self.state.lockout_until = None;
            self.persist();
            return LockoutStatus::Open;
        }

        LockoutStatus::Locked { until }
    }
}
