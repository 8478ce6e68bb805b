//! Usage ledger persistence across process restarts

use std::sync::Arc;

use chrono::TimeDelta;
use libgenie::clock::ManualClock;
use libgenie::rate_limiter::{DecisionReason, JsonFileStore, QuotaLimits, RateLimiter};
use serde_json::Value;
use tempfile::TempDir;

fn open(path: &std::path::Path, clock: &ManualClock) -> RateLimiter {
    RateLimiter::with_store(
        Box::new(JsonFileStore::new(path)),
        Arc::new(clock.clone()),
        QuotaLimits::default(),
    )
}

#[test]
fn test_counts_survive_restart() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state").join("usage.json");
    let clock = ManualClock::at(2025, 4, 15, 9, 30);

    {
        let mut limiter = open(&path, &clock);
        limiter.record_post("2001");
        limiter.record_post("2002");
    }

    let mut limiter = open(&path, &clock);
    assert_eq!(limiter.monthly_usage(), 2);
    assert_eq!(limiter.daily_usage(), 2);

    clock.advance(TimeDelta::days(1));
    let mut limiter = open(&path, &clock);
    assert_eq!(limiter.monthly_usage(), 2);
    assert_eq!(limiter.daily_usage(), 0);
}

#[test]
fn test_file_layout() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("usage.json");
    let clock = ManualClock::at(2025, 4, 15, 9, 30);

    let mut limiter = open(&path, &clock);
    limiter.record_post("2001");
    limiter.set_lockout(24);

    let document: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(document["posts"][0]["tweet_id"], "2001");
    assert_eq!(document["posts"][0]["timestamp"], "2025-04-15T09:30:00");
    assert_eq!(document["monthly_reset"], "2025-04-01T00:00:00");
    assert_eq!(document["rate_limit_lockout"], "2025-04-16T09:30:00");
}

#[test]
fn test_reads_file_written_by_previous_agent() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("usage.json");
    std::fs::write(
        &path,
        r#"{
  "posts": [
    {"tweet_id": "1911000000000000001", "timestamp": "2025-05-02T08:15:30.123456"},
    {"tweet_id": "1911000000000000002", "timestamp": "2025-05-20T19:01:02.654321"}
  ],
  "monthly_reset": "2025-05-01T00:00:00",
  "rate_limit_lockout": null
}"#,
    )
    .unwrap();

    let clock = ManualClock::at(2025, 5, 20, 21, 0);
    let mut limiter = open(&path, &clock);
    let snapshot = limiter.snapshot();
    assert_eq!(snapshot.monthly_used, 2);
    assert_eq!(snapshot.daily_used, 1);
    assert_eq!(snapshot.monthly_remaining, 498);
}

#[test]
fn test_lockout_survives_restart_and_expires() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("usage.json");
    let clock = ManualClock::at(2025, 7, 1, 12, 0);

    open(&path, &clock).set_lockout(24);

    clock.advance(TimeDelta::hours(23));
    let mut limiter = open(&path, &clock);
    let decision = limiter.can_post(50);
    assert!(!decision.allowed);
    assert!(matches!(decision.reason, DecisionReason::LockedOut { .. }));
    assert!(decision.message.contains("Wait 1h 0m"));

    clock.advance(TimeDelta::hours(1));
    let mut limiter = open(&path, &clock);
    assert!(limiter.can_post(50).allowed);

    let document: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(document["rate_limit_lockout"].is_null());
}

#[test]
fn test_month_rollover_on_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("usage.json");
    let clock = ManualClock::at(2025, 1, 31, 23, 0);

    {
        let mut limiter = open(&path, &clock);
        for i in 0..5 {
            limiter.record_post(&format!("{}", 3000 + i));
        }
    }

    clock.advance(TimeDelta::hours(2));
    let mut limiter = open(&path, &clock);
    assert_eq!(limiter.monthly_usage(), 0);
    assert!(limiter.usage_report().contains("March 01, 2025"));

    let document: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(document["posts"].as_array().unwrap().len(), 0);
    assert_eq!(document["monthly_reset"], "2025-02-01T00:00:00");
}

#[test]
fn test_corrupt_file_starts_fresh() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("usage.json");
    std::fs::write(&path, "{ not json").unwrap();

    let clock = ManualClock::at(2025, 3, 3, 3, 3);
    let mut limiter = open(&path, &clock);
    assert_eq!(limiter.monthly_usage(), 0);

    limiter.record_post("1");
    let mut reopened = open(&path, &clock);
    assert_eq!(reopened.monthly_usage(), 1);
}
