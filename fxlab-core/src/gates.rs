//! Admission gates — market hours, economic events, and pair eligibility.
//!
//! Gates can block new entries, require tightened stops, or demand a force
//! close. A blocked entry is a normal outcome, not an error, and always
//! carries reason codes.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Pair;
use crate::reason;
use crate::stress::StressedQuote;

// ── Market hours ─────────────────────────────────────────────────────

/// Weekly open/close schedule. Day indices are 0 = Monday … 6 = Sunday.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketHoursConfig {
    pub open_dow: u32,
    pub open_hour_utc: u32,
    pub close_dow: u32,
    pub close_hour_utc: u32,
}

impl Default for MarketHoursConfig {
    fn default() -> Self {
        // FX week: Sunday 21:00 UTC through Friday 21:00 UTC.
        Self {
            open_dow: 6,
            open_hour_utc: 21,
            close_dow: 4,
            close_hour_utc: 21,
        }
    }
}

/// Result of the market-hours hard gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    pub market_closed: bool,
    pub reopens_at: Option<DateTime<Utc>>,
}

/// Pure function of current time and the weekly schedule.
pub fn market_hours(cfg: &MarketHoursConfig, now: DateTime<Utc>) -> MarketHours {
    const WEEK_MIN: i64 = 7 * 24 * 60;
    let week_min =
        now.weekday().num_days_from_monday() as i64 * 1440 + (now.hour() * 60 + now.minute()) as i64;
    let open_min = cfg.open_dow as i64 * 1440 + cfg.open_hour_utc as i64 * 60;
    let close_min = cfg.close_dow as i64 * 1440 + cfg.close_hour_utc as i64 * 60;

    let closed = if close_min <= open_min {
        week_min >= close_min && week_min < open_min
    } else {
        week_min >= close_min || week_min < open_min
    };

    if closed {
        let minute_floor = now - Duration::seconds(now.second() as i64)
            - Duration::nanoseconds(now.nanosecond() as i64);
        let delta = (open_min - week_min).rem_euclid(WEEK_MIN);
        MarketHours {
            market_closed: true,
            reopens_at: Some(minute_floor + Duration::minutes(delta)),
        }
    } else {
        MarketHours {
            market_closed: false,
            reopens_at: None,
        }
    }
}

// ── Economic events ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// A normalized calendar event, as supplied by the event source collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicEvent {
    pub timestamp_utc: DateTime<Utc>,
    /// Three-letter currency code the event concerns.
    pub currency: String,
    pub impact: Impact,
    pub event_name: String,
}

/// Escalating responses derived from impact and proximity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventTier {
    /// Entries allowed with a tightened stop.
    Tighten,
    /// No new entries.
    Block,
    /// Open positions must close.
    ForceClose,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventGate {
    pub events: Vec<EconomicEvent>,
    pub medium_tighten_window_min: i64,
    pub high_block_window_min: i64,
    pub high_force_close_window_min: i64,
}

impl EventGate {
    pub fn with_defaults(events: Vec<EconomicEvent>) -> Self {
        Self {
            events,
            medium_tighten_window_min: 15,
            high_block_window_min: 30,
            high_force_close_window_min: 10,
        }
    }

    /// Strongest tier any relevant event imposes at `now` for this pair.
    pub fn tier(&self, pair: &Pair, now: DateTime<Utc>) -> Option<EventTier> {
        let mut strongest: Option<EventTier> = None;
        for event in &self.events {
            if !pair.involves(&event.currency) {
                continue;
            }
            let proximity_min = (event.timestamp_utc - now).num_minutes().abs();
            let tier = match event.impact {
                Impact::High if proximity_min <= self.high_force_close_window_min => {
                    Some(EventTier::ForceClose)
                }
                Impact::High if proximity_min <= self.high_block_window_min => {
                    Some(EventTier::Block)
                }
                Impact::Medium if proximity_min <= self.medium_tighten_window_min => {
                    Some(EventTier::Tighten)
                }
                _ => None,
            };
            if tier > strongest {
                strongest = tier;
            }
        }
        strongest
    }
}

// ── Pair eligibility ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryGateConfig {
    /// Spread-to-ATR ceiling for admission.
    pub max_spread_to_atr: f64,
    /// Tightened ceiling inside session-transition windows.
    pub transition_spread_to_atr: f64,
    /// Stop-distance multiplier applied when an event tier demands
    /// tightened stops (0.5 halves the distance).
    pub event_stop_tighten_factor: f64,
}

impl Default for EntryGateConfig {
    fn default() -> Self {
        Self {
            max_spread_to_atr: 0.25,
            transition_spread_to_atr: 0.15,
            event_stop_tighten_factor: 0.5,
        }
    }
}

/// Per-pair context supplied by external layers (indicators, regime model).
/// `atr: None` means the data was unavailable; distance gates degrade to
/// inactive rather than fabricating a number.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairContext {
    pub atr: Option<f64>,
    pub regime_aligned: bool,
    /// Set by the driver from the stress model's transition window.
    pub session_transition: bool,
}

/// What the admission gate decided for a candidate entry.
#[derive(Debug, Clone, Default)]
pub struct GateDecision {
    pub blockers: Vec<String>,
    pub tighten_stop: bool,
}

impl GateDecision {
    pub fn admitted(&self) -> bool {
        self.blockers.is_empty()
    }
}

/// Combined market-hours, event, and eligibility gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionGate {
    pub hours: MarketHoursConfig,
    pub entry: EntryGateConfig,
    pub events: EventGate,
}

impl AdmissionGate {
    /// True when a calendar event at `now` demands open positions close.
    /// Drivers translate this into a forced-close tick for the engine.
    pub fn demands_force_close(&self, pair: &Pair, now: DateTime<Utc>) -> bool {
        self.events.tier(pair, now) == Some(EventTier::ForceClose)
    }

    /// The quote's own event-risk stamp counts alongside the calendar: a
    /// high-risk tick blocks entries, a medium-risk tick tightens stops.
    pub fn check(&self, pair: &Pair, quote: &StressedQuote, ctx: &PairContext) -> GateDecision {
        let mut decision = GateDecision::default();

        let hours = market_hours(&self.hours, quote.ts);
        if hours.market_closed {
            decision.blockers.push(reason::MARKET_CLOSED.to_string());
        }

        let tick_tier = match quote.event_risk {
            Some(crate::domain::EventRisk::High) => Some(EventTier::Block),
            Some(crate::domain::EventRisk::Medium) => Some(EventTier::Tighten),
            None => None,
        };
        match self.events.tier(pair, quote.ts).max(tick_tier) {
            Some(EventTier::Block) | Some(EventTier::ForceClose) => {
                decision.blockers.push(reason::EVENT_HIGH_BLOCK.to_string());
            }
            Some(EventTier::Tighten) => decision.tighten_stop = true,
            None => {}
        }

        if let Some(atr) = ctx.atr.filter(|a| *a > 0.0) {
            let cap = if ctx.session_transition {
                self.entry.transition_spread_to_atr
            } else {
                self.entry.max_spread_to_atr
            };
            if quote.spread() / atr > cap {
                decision.blockers.push(reason::SPREAD_TOO_WIDE.to_string());
            }
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pair() -> Pair {
        Pair::new("EURUSD").unwrap()
    }

    fn stressed(ts: DateTime<Utc>, bid: f64, ask: f64) -> StressedQuote {
        StressedQuote {
            ts,
            bid,
            ask,
            raw_spread: ask - bid,
            stress_reasons: vec![],
            event_risk: None,
            shock: false,
            rollover: false,
            force_close_reason_code: None,
        }
    }

    #[test]
    fn saturday_is_closed_with_sunday_reopen() {
        let cfg = MarketHoursConfig::default();
        let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let hours = market_hours(&cfg, saturday);
        assert!(hours.market_closed);
        assert_eq!(
            hours.reopens_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 10, 21, 0, 0).unwrap())
        );
    }

    #[test]
    fn midweek_is_open() {
        let cfg = MarketHoursConfig::default();
        let tuesday = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        assert!(!market_hours(&cfg, tuesday).market_closed);
    }

    #[test]
    fn friday_evening_is_closed() {
        let cfg = MarketHoursConfig::default();
        let friday_late = Utc.with_ymd_and_hms(2024, 3, 8, 21, 30, 0).unwrap();
        assert!(market_hours(&cfg, friday_late).market_closed);
    }

    #[test]
    fn event_tier_escalates_with_proximity() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let gate = EventGate::with_defaults(vec![EconomicEvent {
            timestamp_utc: now + Duration::minutes(25),
            currency: "USD".into(),
            impact: Impact::High,
            event_name: "NFP".into(),
        }]);
        // 25 minutes out: block window but not force-close window.
        assert_eq!(gate.tier(&pair(), now), Some(EventTier::Block));
        assert_eq!(
            gate.tier(&pair(), now + Duration::minutes(20)),
            Some(EventTier::ForceClose)
        );
        assert_eq!(gate.tier(&pair(), now - Duration::minutes(30)), None);
    }

    #[test]
    fn force_close_window_demands_flattening() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let gate = AdmissionGate {
            events: EventGate::with_defaults(vec![EconomicEvent {
                timestamp_utc: now + Duration::minutes(5),
                currency: "USD".into(),
                impact: Impact::High,
                event_name: "FOMC".into(),
            }]),
            ..AdmissionGate::default()
        };
        assert!(gate.demands_force_close(&pair(), now));
        // Outside the force-close window the calendar only blocks entries.
        assert!(!gate.demands_force_close(&pair(), now - Duration::minutes(20)));
    }

    #[test]
    fn event_for_unrelated_currency_is_ignored() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let gate = EventGate::with_defaults(vec![EconomicEvent {
            timestamp_utc: now,
            currency: "JPY".into(),
            impact: Impact::High,
            event_name: "BoJ".into(),
        }]);
        assert_eq!(gate.tier(&pair(), now), None);
    }

    #[test]
    fn wide_spread_blocks_when_atr_known() {
        let gate = AdmissionGate::default();
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let q = stressed(ts, 1.1000, 1.1010); // 10 pip spread
        let ctx = PairContext {
            atr: Some(0.0020), // spread/atr = 0.5 > 0.25
            ..PairContext::default()
        };
        let decision = gate.check(&pair(), &q, &ctx);
        assert_eq!(decision.blockers, vec![reason::SPREAD_TOO_WIDE]);
    }

    #[test]
    fn unknown_atr_degrades_gate_to_inactive() {
        let gate = AdmissionGate::default();
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let q = stressed(ts, 1.1000, 1.1010);
        let decision = gate.check(&pair(), &q, &PairContext::default());
        assert!(decision.admitted());
    }

    #[test]
    fn high_risk_tick_blocks_even_without_calendar() {
        let gate = AdmissionGate::default();
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let mut q = stressed(ts, 1.1000, 1.1002);
        q.event_risk = Some(crate::domain::EventRisk::High);
        let decision = gate.check(&pair(), &q, &PairContext::default());
        assert_eq!(decision.blockers, vec![reason::EVENT_HIGH_BLOCK]);

        q.event_risk = Some(crate::domain::EventRisk::Medium);
        let decision = gate.check(&pair(), &q, &PairContext::default());
        assert!(decision.admitted());
        assert!(decision.tighten_stop);
    }

    #[test]
    fn transition_window_tightens_the_cap() {
        let gate = AdmissionGate::default();
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let q = stressed(ts, 1.10000, 1.10040); // spread/atr = 0.2
        let mut ctx = PairContext {
            atr: Some(0.0020),
            ..PairContext::default()
        };
        assert!(gate.check(&pair(), &q, &ctx).admitted());
        ctx.session_transition = true; // cap drops to 0.15
        assert!(!gate.check(&pair(), &q, &ctx).admitted());
    }
}
