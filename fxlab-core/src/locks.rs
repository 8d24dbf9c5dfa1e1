//! Reentry locks — per-pair cooldowns after qualifying closes.
//!
//! Closing reasons map to lock durations through a configuration table; when
//! several reasons fire together the longest applicable category wins. The
//! per-pair lock merges via `max`, so the lock timeline is non-decreasing
//! under any interleaving of overlapping closes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::Pair;
use crate::reason;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Event-risk closes (`EVENT_HIGH_FORCE_CLOSE` and friends).
    pub event_minutes: i64,
    /// Time-stop closes.
    pub time_stop_minutes: i64,
    /// Regime-flip closes.
    pub regime_flip_minutes: i64,
    /// Plain stop invalidations.
    pub stop_invalidation_minutes: i64,
    /// Stop invalidations that happened under spread stress; falls back to
    /// `stop_invalidation_minutes` when unset.
    pub stressed_stop_minutes: Option<i64>,
    /// Any other qualifying close (pre-rollover disposition, external codes).
    pub default_minutes: i64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            event_minutes: 20,
            time_stop_minutes: 30,
            regime_flip_minutes: 45,
            stop_invalidation_minutes: 15,
            stressed_stop_minutes: None,
            default_minutes: 5,
        }
    }
}

/// Map closing reason codes to a single lock duration in minutes.
///
/// Returns `None` when no reason qualifies: take-profit closes and the
/// end-of-replay flatten never lock a pair. Spread-stress tags are
/// modifiers, not close reasons — a stop invalidation accompanied by one
/// picks up the stressed variant, but a stress tag alone locks nothing.
pub fn resolve_reentry_lock_minutes(reasons: &[String], cfg: &LockConfig) -> Option<i64> {
    let stressed = reasons.iter().any(|r| reason::is_stress_tag(r));
    let mut best: Option<i64> = None;
    for code in reasons {
        if reason::is_stress_tag(code) {
            continue;
        }
        let minutes = match code.as_str() {
            reason::TAKE_PROFIT_HIT | reason::END_OF_REPLAY_FLAT => continue,
            c if c.starts_with("EVENT_") => cfg.event_minutes,
            c if c.starts_with("TIME_STOP") => cfg.time_stop_minutes,
            c if c.starts_with("REGIME_FLIP") => cfg.regime_flip_minutes,
            c if c.starts_with("STOP_INVALIDATED") => {
                if stressed {
                    cfg.stressed_stop_minutes
                        .unwrap_or(cfg.stop_invalidation_minutes)
                        .max(cfg.stop_invalidation_minutes)
                } else {
                    cfg.stop_invalidation_minutes
                }
            }
            _ => cfg.default_minutes,
        };
        best = Some(best.map_or(minutes, |b| b.max(minutes)));
    }
    best
}

/// Per-pair "cannot re-enter before" timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReentryLocks {
    locked_until: HashMap<Pair, DateTime<Utc>>,
}

impl ReentryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a candidate lock; the effective lock never shrinks.
    /// Returns the resulting lock timestamp.
    pub fn merge(&mut self, pair: &Pair, candidate: DateTime<Utc>) -> DateTime<Utc> {
        let entry = self
            .locked_until
            .entry(pair.clone())
            .and_modify(|cur| {
                if candidate > *cur {
                    *cur = candidate;
                }
            })
            .or_insert(candidate);
        *entry
    }

    /// Convenience: resolve reasons against the table and merge from `now`.
    pub fn apply_close(
        &mut self,
        pair: &Pair,
        now: DateTime<Utc>,
        reasons: &[String],
        cfg: &LockConfig,
    ) -> Option<DateTime<Utc>> {
        resolve_reentry_lock_minutes(reasons, cfg)
            .map(|minutes| self.merge(pair, now + Duration::minutes(minutes)))
    }

    pub fn is_locked(&self, pair: &Pair, now: DateTime<Utc>) -> bool {
        self.locked_until.get(pair).is_some_and(|until| now < *until)
    }

    pub fn until(&self, pair: &Pair) -> Option<DateTime<Utc>> {
        self.locked_until.get(pair).copied()
    }

    /// Cleared explicitly when a new entry opens.
    pub fn clear(&mut self, pair: &Pair) {
        self.locked_until.remove(pair);
    }
}
