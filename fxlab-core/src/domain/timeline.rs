//! Timeline — append-only audit trail of *why* decisions happened.
//!
//! Independent of the ledger: the ledger records what moved money, the
//! timeline records every semantic event including blocked entries and
//! stop adjustments that moved nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineKind {
    EntryOpened,
    EntryBlocked,
    PartialTaken,
    StopTightened,
    PositionClosed,
    RolloverFeeApplied,
    ReentryLockUpdated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub ts: DateTime<Utc>,
    pub kind: TimelineKind,
    pub reasons: Vec<String>,
    /// Free-form detail; BTreeMap keeps serialized output stable.
    pub detail: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        ts: DateTime<Utc>,
        kind: TimelineKind,
        reasons: Vec<String>,
        detail: BTreeMap<String, String>,
    ) {
        self.events.push(TimelineEvent {
            ts,
            kind,
            reasons,
            detail,
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn count(&self, kind: TimelineKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

/// Shorthand for building detail maps: `detail![("key", value), ...]`.
#[macro_export]
macro_rules! detail {
    ($(($k:expr, $v:expr)),* $(,)?) => {{
        let mut map = std::collections::BTreeMap::new();
        $( map.insert($k.to_string(), $v.to_string()); )*
        map
    }};
}
