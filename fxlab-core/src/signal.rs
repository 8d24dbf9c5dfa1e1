//! Entry signals and the pluggable source that produces them.
//!
//! Strategy construction (discretionary or otherwise) is out of core scope;
//! the engine only consumes `EntrySignal`s through the `SignalSource` seam,
//! so swapping strategies never touches the state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::quote::flex_ts;
use crate::domain::{Pair, Side};

/// A request to open a position, produced by a strategy layer or scripted
/// by a replay fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySignal {
    #[serde(with = "flex_ts")]
    pub ts: DateTime<Utc>,
    pub side: Side,
    pub stop_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit_price: Option<f64>,
    /// Explicit notional; when absent the risk budget sizes the trade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notional_usd: Option<f64>,
    /// Signal confidence in [0, 1]; scales risk-based sizing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Pluggable producer of entry signals.
pub trait SignalSource: Send + Sync {
    /// Signals due at or before `now`, in input order. Each signal is
    /// yielded exactly once.
    fn poll(&mut self, pair: &Pair, now: DateTime<Utc>) -> Vec<EntrySignal>;

    fn name(&self) -> &str;
}

/// Scripted source backed by a pre-ordered signal list (replay fixtures).
#[derive(Debug, Clone, Default)]
pub struct ScriptedSignals {
    queue: VecDeque<EntrySignal>,
}

impl ScriptedSignals {
    pub fn new(mut signals: Vec<EntrySignal>) -> Self {
        signals.sort_by_key(|s| s.ts);
        Self {
            queue: signals.into(),
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl SignalSource for ScriptedSignals {
    fn poll(&mut self, _pair: &Pair, now: DateTime<Utc>) -> Vec<EntrySignal> {
        let mut due = Vec::new();
        while self.queue.front().is_some_and(|s| s.ts <= now) {
            due.push(self.queue.pop_front().expect("front checked"));
        }
        due
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
