//! Engine configuration — every management rule is a knob, not a constant.

use serde::{Deserialize, Serialize};

use crate::domain::TrailingMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// R-multiple at which the partial take-profit fires.
    pub partial_at_r: f64,
    /// Percentage of units closed by the partial; 0 disables the step.
    pub partial_close_pct: f64,
    /// Trailing distance in R (RDistance mode).
    pub trailing_distance_r: f64,
    /// Trailing distance as a fraction of reference price (Percent mode).
    pub trailing_percent: f64,
    pub trailing_mode: TrailingMode,
    /// Stops are not evaluated for this long after entry (0 disables).
    pub min_hold_minutes: i64,
    /// Daily financing debit in basis points of marked notional.
    pub rollover_fee_bps: f64,
    /// Close open positions when a tick carries high event risk.
    pub force_close_on_high_event: bool,
    pub pre_rollover: PreRolloverConfig,
    pub time_stop: TimeStopConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            partial_at_r: 1.0,
            partial_close_pct: 50.0,
            trailing_distance_r: 1.0,
            trailing_percent: 0.005,
            trailing_mode: TrailingMode::RDistance,
            min_hold_minutes: 0,
            rollover_fee_bps: 1.0,
            force_close_on_high_event: true,
            pre_rollover: PreRolloverConfig::default(),
            time_stop: TimeStopConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreRolloverMode {
    /// Force-close any position caught in the window under stress.
    Close,
    /// Partially close winners, fully close weak positions, leave the
    /// undecided untouched.
    Derisk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreRolloverConfig {
    /// Minutes before the rollover boundary the disposition window opens.
    pub window_min: i64,
    /// Spread-to-ATR stress level that arms the disposition.
    pub spread_to_atr_threshold: f64,
    pub mode: PreRolloverMode,
    /// Percentage closed when derisking a winner.
    pub derisk_pct: f64,
    /// Favorable excursion (R) a position needs to count as a winner.
    pub min_winner_r: f64,
    /// Positions with current R below this are closed as weak.
    pub weak_max_r: f64,
    /// UTC hour of the rollover boundary.
    pub rollover_hour_utc: u32,
}

impl Default for PreRolloverConfig {
    fn default() -> Self {
        Self {
            window_min: 45,
            spread_to_atr_threshold: 0.20,
            mode: PreRolloverMode::Derisk,
            derisk_pct: 50.0,
            min_winner_r: 0.5,
            weak_max_r: 0.0,
            rollover_hour_utc: 21,
        }
    }
}

impl PreRolloverConfig {
    /// Minutes until the next rollover boundary from `ts`.
    pub fn minutes_to_boundary(&self, ts: chrono::DateTime<chrono::Utc>) -> i64 {
        use chrono::Timelike;
        let now_min = (ts.hour() * 60 + ts.minute()) as i64;
        let mark = (self.rollover_hour_utc * 60) as i64;
        (mark - now_min).rem_euclid(1440)
    }

    pub fn in_window(&self, ts: chrono::DateTime<chrono::Utc>) -> bool {
        let mins = self.minutes_to_boundary(ts);
        mins > 0 && mins <= self.window_min
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeStopConfig {
    /// Close after this many ticks if the trade never got going (0 disables).
    pub no_follow_through_bars: u64,
    /// Favorable excursion (R) below which "never got going" applies.
    pub min_follow_through_r: f64,
    /// Hard age limit in ticks (0 disables). Regime-aligned positions that
    /// are already trailing are exempt.
    pub max_hold_bars: u64,
}

impl Default for TimeStopConfig {
    fn default() -> Self {
        Self {
            no_follow_through_bars: 12,
            min_follow_through_r: 0.3,
            max_hold_bars: 96,
        }
    }
}
