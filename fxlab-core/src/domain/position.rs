//! Position — the single open position a pair's state machine may own.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::pair::Pair;

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1.0 for long, -1.0 for short. Used for side-aware price arithmetic.
    pub fn direction(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// How the trailing stop candidate is computed once trailing is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingMode {
    /// Candidate at `reference - direction * initial_risk * distance_r`.
    RDistance,
    /// Candidate at `reference * (1 - direction * trail_pct)`.
    Percent,
}

/// An open position.
///
/// Invariants enforced here:
/// - `units` is strictly positive while open
/// - `current_stop` only ever tightens (see [`Position::tighten_stop`])
/// - `partial_taken_pct` is monotonically non-decreasing, capped at 100
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub pair: Pair,
    pub side: Side,
    pub entry_price: f64,
    pub initial_stop: f64,
    pub current_stop: f64,
    pub take_profit: Option<f64>,
    pub units: f64,
    /// |entry - initial stop|, the denominator of every R-multiple.
    pub initial_risk: f64,
    /// Percentage of the original size already closed via partials (0-100).
    pub partial_taken_pct: f64,
    pub trailing_active: bool,
    pub trailing_mode: TrailingMode,
    pub opened_at: DateTime<Utc>,
    pub entry_notional: f64,
    /// Age in ticks since entry.
    pub ticks_held: u64,
    /// Best favorable excursion seen so far, in R.
    pub max_favorable_r: f64,
    /// Last UTC date a rollover fee was debited, to fee once per crossing.
    pub last_rollover_date: Option<NaiveDate>,
    /// Date of the previous tick while this position was open.
    pub last_mark_date: NaiveDate,
    /// Set once a pre-rollover derisk partial has been taken.
    pub derisked: bool,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        pair: Pair,
        side: Side,
        entry_price: f64,
        initial_stop: f64,
        take_profit: Option<f64>,
        units: f64,
        opened_at: DateTime<Utc>,
    ) -> Self {
        debug_assert!(units > 0.0, "unit size must be strictly positive");
        let initial_risk = (entry_price - initial_stop).abs();
        Self {
            pair,
            side,
            entry_price,
            initial_stop,
            current_stop: initial_stop,
            take_profit,
            units,
            initial_risk,
            partial_taken_pct: 0.0,
            trailing_active: false,
            trailing_mode: TrailingMode::RDistance,
            opened_at,
            entry_notional: entry_price * units,
            ticks_held: 0,
            max_favorable_r: 0.0,
            last_rollover_date: None,
            last_mark_date: opened_at.date_naive(),
            derisked: false,
        }
    }

    pub fn partial_taken(&self) -> bool {
        self.partial_taken_pct > 0.0
    }

    /// Favorable excursion in R, computed from the exitable side of the
    /// quote: bid for a long, ask for a short.
    pub fn favorable_r(&self, bid: f64, ask: f64) -> f64 {
        if self.initial_risk <= 0.0 {
            return 0.0;
        }
        match self.side {
            Side::Buy => (bid - self.entry_price) / self.initial_risk,
            Side::Sell => (self.entry_price - ask) / self.initial_risk,
        }
    }

    /// Mark-to-market PnL against the exitable side of the quote.
    pub fn unrealized_pnl(&self, bid: f64, ask: f64) -> f64 {
        match self.side {
            Side::Buy => (bid - self.entry_price) * self.units,
            Side::Sell => (self.entry_price - ask) * self.units,
        }
    }

    /// Ratchet: apply `candidate` only if it tightens the stop for this side.
    ///
    /// Long stops may only rise, short stops may only fall. Returns true if
    /// the stop moved.
    pub fn tighten_stop(&mut self, candidate: f64) -> bool {
        let tightens = match self.side {
            Side::Buy => candidate > self.current_stop,
            Side::Sell => candidate < self.current_stop,
        };
        if tightens {
            self.current_stop = candidate;
        }
        tightens
    }

    /// Side-aware stop trigger: bid at/through the stop for a long, ask
    /// at/through it for a short.
    pub fn stop_triggered(&self, bid: f64, ask: f64) -> bool {
        match self.side {
            Side::Buy => bid <= self.current_stop,
            Side::Sell => ask >= self.current_stop,
        }
    }

    /// Side-aware take-profit trigger, if a take-profit is set.
    pub fn take_profit_hit(&self, bid: f64, ask: f64) -> bool {
        match (self.side, self.take_profit) {
            (Side::Buy, Some(tp)) => bid >= tp,
            (Side::Sell, Some(tp)) => ask <= tp,
            (_, None) => false,
        }
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.opened_at).num_seconds() / 60
    }

    /// Per-tick bookkeeping: age, favorable-excursion high-water mark, and
    /// the mark date used for day-boundary detection.
    pub fn note_tick(&mut self, ts: DateTime<Utc>, favorable_r: f64) {
        self.ticks_held += 1;
        if favorable_r > self.max_favorable_r {
            self.max_favorable_r = favorable_r;
        }
        self.last_mark_date = ts.date_naive();
    }
}
