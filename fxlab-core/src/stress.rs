//! Stress model — execution-adjusted quotes under spread stress.
//!
//! Converts a raw quote into a stressed quote with the same midpoint and a
//! spread widened by stacking multiplicative penalties. Factors apply in a
//! fixed, reason-tagged order so each contributor is individually auditable:
//! session transition, rollover, medium event, high event, then any
//! fixture-injected custom multiplier last. Every factor is floored at 1.0;
//! stress can only widen, never narrow.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EventRisk, Quote, QuoteError};
use crate::reason;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    pub session_transition_mult: f64,
    pub rollover_mult: f64,
    pub medium_event_mult: f64,
    pub high_event_mult: f64,
    /// Minutes around a session boundary that count as "in transition".
    pub transition_buffer_min: i64,
    /// UTC hours at which trading sessions hand over (Tokyo, London, New York).
    pub session_open_hours_utc: Vec<u32>,
    /// UTC hour of the daily rollover (5pm New York).
    pub rollover_hour_utc: u32,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            session_transition_mult: 1.5,
            rollover_mult: 2.0,
            medium_event_mult: 1.25,
            high_event_mult: 2.0,
            transition_buffer_min: 30,
            session_open_hours_utc: vec![0, 7, 12],
            rollover_hour_utc: 21,
        }
    }
}

impl StressConfig {
    /// Minutes of `ts` from the nearest occurrence of `hour:00` UTC,
    /// wrapping across midnight.
    fn minutes_from_hour(ts: DateTime<Utc>, hour: u32) -> i64 {
        let now_min = (ts.hour() * 60 + ts.minute()) as i64;
        let mark = (hour * 60) as i64;
        let diff = (now_min - mark).abs();
        diff.min(1440 - diff)
    }

    pub fn in_transition_window(&self, ts: DateTime<Utc>) -> bool {
        self.session_open_hours_utc
            .iter()
            .any(|&h| Self::minutes_from_hour(ts, h) <= self.transition_buffer_min)
    }

    pub fn in_rollover_window(&self, ts: DateTime<Utc>) -> bool {
        Self::minutes_from_hour(ts, self.rollover_hour_utc) <= self.transition_buffer_min
    }

    /// Minutes remaining until the next rollover boundary.
    pub fn minutes_to_rollover(&self, ts: DateTime<Utc>) -> i64 {
        let now_min = (ts.hour() * 60 + ts.minute()) as i64;
        let mark = (self.rollover_hour_utc * 60) as i64;
        (mark - now_min).rem_euclid(1440)
    }
}

/// A quote after spread stress, carrying the raw tick's flags forward for
/// the state machine plus the list of stress factors that applied.
#[derive(Debug, Clone)]
pub struct StressedQuote {
    pub ts: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    pub raw_spread: f64,
    pub stress_reasons: Vec<&'static str>,
    pub event_risk: Option<EventRisk>,
    pub shock: bool,
    pub rollover: bool,
    pub force_close_reason_code: Option<String>,
}

impl StressedQuote {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Applies the configured spread penalties to raw quotes.
#[derive(Debug, Clone, Default)]
pub struct StressModel {
    pub cfg: StressConfig,
}

impl StressModel {
    pub fn new(cfg: StressConfig) -> Self {
        Self { cfg }
    }

    pub fn apply(&self, quote: &Quote) -> Result<StressedQuote, QuoteError> {
        quote.validate()?;

        let mid = quote.mid();
        let base_spread = quote.spread();
        let mut factor = 1.0;
        let mut reasons = Vec::new();

        // Fixed order; each multiplier floored at 1 and tagged when it bites.
        let mut push = |mult: f64, tag: &'static str, factor: &mut f64| {
            let m = mult.max(1.0);
            if m > 1.0 {
                *factor *= m;
                reasons.push(tag);
            }
        };

        if self.cfg.in_transition_window(quote.ts) {
            push(
                self.cfg.session_transition_mult,
                reason::SESSION_TRANSITION_SPREAD,
                &mut factor,
            );
        }
        if quote.rollover || self.cfg.in_rollover_window(quote.ts) {
            push(self.cfg.rollover_mult, reason::ROLLOVER_SPREAD, &mut factor);
        }
        match quote.event_risk {
            Some(EventRisk::Medium) => push(
                self.cfg.medium_event_mult,
                reason::EVENT_MEDIUM_SPREAD,
                &mut factor,
            ),
            Some(EventRisk::High) => push(
                self.cfg.high_event_mult,
                reason::EVENT_HIGH_SPREAD,
                &mut factor,
            ),
            None => {}
        }
        if let Some(custom) = quote.spread_multiplier {
            push(custom, reason::CUSTOM_SPREAD_STRESS, &mut factor);
        }

        let spread = base_spread * factor;
        Ok(StressedQuote {
            ts: quote.ts,
            bid: mid - spread / 2.0,
            ask: mid + spread / 2.0,
            raw_spread: base_spread,
            stress_reasons: reasons,
            event_risk: quote.event_risk,
            shock: quote.shock,
            rollover: quote.rollover,
            force_close_reason_code: quote.force_close_reason_code.clone(),
        })
    }
}
