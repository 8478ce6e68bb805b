//! Persistence for the usage ledger
//!
//! The whole ledger is one JSON document, rewritten on every mutation:
//!
//! ```json
//! {
//!   "posts": [{"tweet_id": "1890", "timestamp": "2025-02-03T10:11:12.345678"}],
//!   "monthly_reset": "2025-02-01T00:00:00",
//!   "rate_limit_lockout": null
//! }
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::clock::month_start;
use crate::error::{LedgerError, Result};
use crate::types::PostEvent;

/// In-memory ledger state, mirrored to the store after every mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageLedgerState {
    pub posts: Vec<PostEvent>,
    /// Always the first instant of a calendar month
    pub monthly_reset: NaiveDateTime,
    pub lockout_until: Option<NaiveDateTime>,
}

impl UsageLedgerState {
    pub fn fresh(now: NaiveDateTime) -> Self {
        Self {
            posts: Vec::new(),
            monthly_reset: month_start(now),
            lockout_until: None,
        }
    }
}

/// On-disk shape. Every key is optional so older files still load.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredLedger {
    #[serde(default)]
    posts: Vec<PostEvent>,
    #[serde(default)]
    monthly_reset: Option<NaiveDateTime>,
    #[serde(default)]
    rate_limit_lockout: Option<NaiveDateTime>,
}

impl StoredLedger {
    fn into_state(self, now: NaiveDateTime) -> UsageLedgerState {
        let monthly_reset = self
            .monthly_reset
            .map(month_start)
            .unwrap_or_else(|| month_start(now));

        UsageLedgerState {
            posts: self.posts,
            monthly_reset,
            lockout_until: self.rate_limit_lockout,
        }
    }

    fn from_state(state: &UsageLedgerState) -> Self {
        Self {
            posts: state.posts.clone(),
            monthly_reset: Some(state.monthly_reset),
            rate_limit_lockout: state.lockout_until,
        }
    }
}

/// Where the ledger lives between runs
pub trait LedgerStore: Send + Sync {
    /// Load persisted state. `Ok(None)` means nothing has been stored yet.
    ///
    /// `now` fills in fields missing from older documents.
    fn load(&self, now: NaiveDateTime) -> Result<Option<UsageLedgerState>>;

    /// Overwrite the persisted state wholesale
    fn save(&self, state: &UsageLedgerState) -> Result<()>;
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self, now: NaiveDateTime) -> Result<Option<UsageLedgerState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(LedgerError::Io)?;
        let stored: StoredLedger = serde_json::from_str(&content).map_err(LedgerError::Json)?;
        Ok(Some(stored.into_state(now)))
    }

    fn save(&self, state: &UsageLedgerState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(LedgerError::Io)?;
            }
        }

        let json = serde_json::to_string_pretty(&StoredLedger::from_state(state))
            .map_err(LedgerError::Json)?;
        std::fs::write(&self.path, json).map_err(LedgerError::Io)?;
        Ok(())
    }
}
