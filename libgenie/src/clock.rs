//! Wall-clock abstraction
//!
//! Quota accounting works on local calendar days and months, so the clock
//! hands out naive local timestamps. Tests swap in [`ManualClock`] to move
//! across day and month boundaries.

use std::sync::{Arc, Mutex};

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta};

/// Source of "now" for the ledger and lockout guard
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The real local clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A settable clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Convenience constructor; panics on an invalid date.
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let start = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .expect("valid manual clock start");
        Self::new(start)
    }

    pub fn set(&self, instant: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// First instant of the calendar month containing `instant`
pub fn month_start(instant: NaiveDateTime) -> NaiveDateTime {
    first_of_month(instant.year(), instant.month())
}

/// First instant of the calendar month after the one containing `instant`
pub fn next_month_start(instant: NaiveDateTime) -> NaiveDateTime {
    if instant.month() == 12 {
        first_of_month(instant.year() + 1, 1)
    } else {
        first_of_month(instant.year(), instant.month() + 1)
    }
}

/// Midnight at the start of the day containing `instant`
pub fn day_start(instant: NaiveDateTime) -> NaiveDateTime {
    instant.date().and_time(chrono::NaiveTime::MIN)
}

fn first_of_month(year: i32, month: u32) -> NaiveDateTime {
    // Day 1 exists for every month of every representable year.
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(chrono::NaiveTime::MIN)
}
