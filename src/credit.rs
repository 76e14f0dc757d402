//! Credit / free-tier gate.
//!
//! Authorizes a top-level generation action for unauthenticated users. The gate is consulted once
//! per action (a whole single-shot call or a whole pipeline run), never per step or variation.

use crate::config::FreeTierConfig;
use crate::error::StorageError;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

const TREE_CREDITS: &str = "credit_usage";
const USAGE_KEY: &[u8] = b"free_tier";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTierStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

pub trait CreditGate: Send + Sync {
    fn can_use_free_tier(&self) -> FreeTierStatus;

    fn increment_free_tier_usage(&self);

    fn format_reset_time(&self, reset_at: DateTime<Utc>) -> String;
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct UsageWindow {
    window_start: DateTime<Utc>,
    used: u32,
}

/// Fixed-window free-tier allowance: `limit` generations per `window`, reset when the window
/// elapses.
pub struct FreeTierLedger {
    limit: u32,
    window: Duration,
    usage: Mutex<UsageWindow>,
    tree: Option<sled::Tree>,
    clock: Clock,
}

impl FreeTierLedger {
    pub fn new(config: &FreeTierConfig) -> Self {
        Self::with_clock(config, Arc::new(Utc::now))
    }

    pub fn with_clock(config: &FreeTierConfig, clock: Clock) -> Self {
        let now = clock();
        Self {
            limit: config.limit,
            window: Duration::hours(i64::from(config.window_hours)),
            usage: Mutex::new(UsageWindow {
                window_start: now,
                used: 0,
            }),
            tree: None,
            clock,
        }
    }

    /// Ledger whose usage count is kept in `db` across process restarts.
    pub fn persistent(config: &FreeTierConfig, db: &sled::Db) -> Result<Self, StorageError> {
        let tree = db.open_tree(TREE_CREDITS).map_err(to_storage_io)?;
        let mut ledger = Self::new(config);
        if let Some(raw) = tree.get(USAGE_KEY).map_err(to_storage_io)? {
            let stored: UsageWindow = serde_json::from_slice(&raw)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;
            *ledger.usage.get_mut() = stored;
        }
        ledger.tree = Some(tree);
        Ok(ledger)
    }

    fn current_window(&self, usage: &mut UsageWindow, now: DateTime<Utc>) {
        if now >= usage.window_start + self.window {
            debug!(previous_used = usage.used, "Free tier window rolled over");
            *usage = UsageWindow {
                window_start: now,
                used: 0,
            };
        }
    }

    fn store(&self, usage: &UsageWindow) {
        let Some(tree) = &self.tree else {
            return;
        };
        let result = serde_json::to_vec(usage)
            .map_err(|e| StorageError::InvalidData(e.to_string()))
            .and_then(|value| {
                tree.insert(USAGE_KEY, value)
                    .map(|_| ())
                    .map_err(to_storage_io)
            });
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist free tier usage");
        }
    }
}

impl CreditGate for FreeTierLedger {
    fn can_use_free_tier(&self) -> FreeTierStatus {
        let now = (self.clock)();
        let mut usage = self.usage.lock();
        self.current_window(&mut usage, now);
        let remaining = self.limit.saturating_sub(usage.used);
        FreeTierStatus {
            allowed: remaining > 0,
            remaining,
            reset_at: usage.window_start + self.window,
        }
    }

    fn increment_free_tier_usage(&self) {
        let now = (self.clock)();
        let mut usage = self.usage.lock();
        self.current_window(&mut usage, now);
        usage.used = usage.used.saturating_add(1);
        self.store(&usage);
    }

    fn format_reset_time(&self, reset_at: DateTime<Utc>) -> String {
        format_reset_time_from(reset_at, (self.clock)())
    }
}

/// Human-readable reset time relative to `now`, e.g. `in 3h 05m (at 2026-10-15 14:00 UTC)`.
pub fn format_reset_time_from(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = reset_at - now;
    if remaining <= Duration::zero() {
        return "now".to_string();
    }
    let total_minutes = (remaining.num_seconds() + 59) / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    let relative = if hours > 0 {
        format!("in {}h {:02}m", hours, minutes)
    } else {
        format!("in {}m", minutes)
    };
    format!("{} (at {})", relative, reset_at.format("%Y-%m-%d %H:%M UTC"))
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}
