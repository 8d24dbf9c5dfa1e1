//! Reason codes attached to ledger rows, timeline events, and blocked entries.
//!
//! Every decision the engine makes carries at least one of these codes —
//! silent no-ops are disallowed. Externally supplied force-close codes pass
//! through verbatim, so `LedgerRow::reasons` is `Vec<String>` rather than an
//! enum; the constants here cover everything the engine emits itself.

// ── Spread stress factors (tagged by the stress model, in application order) ──
pub const SESSION_TRANSITION_SPREAD: &str = "SESSION_TRANSITION_SPREAD";
pub const ROLLOVER_SPREAD: &str = "ROLLOVER_SPREAD";
pub const EVENT_MEDIUM_SPREAD: &str = "EVENT_MEDIUM_SPREAD";
pub const EVENT_HIGH_SPREAD: &str = "EVENT_HIGH_SPREAD";
pub const CUSTOM_SPREAD_STRESS: &str = "CUSTOM_SPREAD_STRESS";

// ── Entry admission ──
pub const REENTRY_LOCKED: &str = "REENTRY_LOCKED";
pub const MARKET_CLOSED: &str = "MARKET_CLOSED";
pub const EVENT_HIGH_BLOCK: &str = "EVENT_HIGH_BLOCK";
pub const SPREAD_TOO_WIDE: &str = "SPREAD_TOO_WIDE";
pub const RISK_BUDGET_EXCEEDED: &str = "RISK_BUDGET_EXCEEDED";
pub const CURRENCY_EXPOSURE_EXCEEDED: &str = "CURRENCY_EXPOSURE_EXCEEDED";
pub const STOP_DISTANCE_ZERO: &str = "STOP_DISTANCE_ZERO";
pub const POSITION_ALREADY_OPEN: &str = "POSITION_ALREADY_OPEN";
pub const ENTRY_ATTEMPT_SPENT: &str = "ENTRY_ATTEMPT_SPENT";

// ── Position management ──
pub const PARTIAL_TAKE_PROFIT: &str = "PARTIAL_TAKE_PROFIT";
pub const TRAILING_STOP_TIGHTENED: &str = "TRAILING_STOP_TIGHTENED";
pub const BREAKEVEN_STOP_SET: &str = "BREAKEVEN_STOP_SET";
pub const TAKE_PROFIT_HIT: &str = "TAKE_PROFIT_HIT";
pub const STOP_INVALIDATED_LONG: &str = "STOP_INVALIDATED_LONG";
pub const STOP_INVALIDATED_SHORT: &str = "STOP_INVALIDATED_SHORT";
pub const EVENT_HIGH_FORCE_CLOSE: &str = "EVENT_HIGH_FORCE_CLOSE";
pub const ROLLOVER_FEE: &str = "ROLLOVER_FEE";
pub const PRE_ROLLOVER_CLOSE: &str = "PRE_ROLLOVER_CLOSE";
pub const PRE_ROLLOVER_DERISK: &str = "PRE_ROLLOVER_DERISK";
pub const PRE_ROLLOVER_WEAK_CLOSE: &str = "PRE_ROLLOVER_WEAK_CLOSE";
pub const TIME_STOP_NO_FOLLOW_THROUGH: &str = "TIME_STOP_NO_FOLLOW_THROUGH";
pub const TIME_STOP_MAX_HOLD: &str = "TIME_STOP_MAX_HOLD";
pub const REGIME_FLIP_CLOSE: &str = "REGIME_FLIP_CLOSE";
pub const END_OF_REPLAY_FLAT: &str = "END_OF_REPLAY_FLAT";

// ── Live-cycle collaborator outcomes ──
pub const BROKER_OPEN_FAILED: &str = "BROKER_OPEN_FAILED";

/// True for spread-stress tags, which annotate other decisions rather than
/// standing alone as close reasons.
pub fn is_stress_tag(code: &str) -> bool {
    code.ends_with("_SPREAD") || code == CUSTOM_SPREAD_STRESS
}
