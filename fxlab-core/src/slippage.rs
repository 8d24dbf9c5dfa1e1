//! Slippage model — deterministic, seeded, always adverse.
//!
//! The offset in basis points is `base(entry|exit) + conditional additions +
//! random_bps * draw`, with the draw in [-1, 1] from an injected seeded
//! generator and the total floored at zero. The sign of the price adjustment
//! is fixed by trade direction (+1 buying, -1 selling), so randomness only
//! varies the magnitude — identical inputs and seed always reproduce
//! identical fills.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{EventRisk, Side};
use crate::stress::StressedQuote;

/// Whether a fill opens or closes exposure; entry and exit carry separate
/// base slippage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillIntent {
    Entry,
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageConfig {
    pub entry_bps: f64,
    pub exit_bps: f64,
    pub medium_event_add_bps: f64,
    pub high_event_add_bps: f64,
    pub shock_add_bps: f64,
    /// Amplitude of the random component.
    pub random_bps: f64,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            entry_bps: 0.4,
            exit_bps: 0.6,
            medium_event_add_bps: 0.5,
            high_event_add_bps: 1.5,
            shock_add_bps: 2.0,
            random_bps: 0.3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SlippageModel {
    pub cfg: SlippageConfig,
}

impl SlippageModel {
    pub fn new(cfg: SlippageConfig) -> Self {
        Self { cfg }
    }

    /// Non-negative slippage in basis points for this quote's conditions.
    pub fn bps(&self, quote: &StressedQuote, intent: FillIntent, rng: &mut impl Rng) -> f64 {
        let base = match intent {
            FillIntent::Entry => self.cfg.entry_bps,
            FillIntent::Exit => self.cfg.exit_bps,
        };
        let event_add = match quote.event_risk {
            Some(EventRisk::Medium) => self.cfg.medium_event_add_bps,
            Some(EventRisk::High) => self.cfg.high_event_add_bps,
            None => 0.0,
        };
        let shock_add = if quote.shock { self.cfg.shock_add_bps } else { 0.0 };
        let draw: f64 = rng.gen_range(-1.0..=1.0);
        (base + event_add + shock_add + self.cfg.random_bps * draw).max(0.0)
    }

    /// Slippage-adjusted execution price.
    ///
    /// Reference is the stressed ask when buying, the stressed bid when
    /// selling; the offset always moves the price against the trader.
    pub fn fill_price(
        &self,
        quote: &StressedQuote,
        side: Side,
        intent: FillIntent,
        rng: &mut impl Rng,
    ) -> f64 {
        let buying = matches!(
            (side, intent),
            (Side::Buy, FillIntent::Entry) | (Side::Sell, FillIntent::Exit)
        );
        let bps = self.bps(quote, intent, rng);
        let (reference, sign) = if buying {
            (quote.ask, 1.0)
        } else {
            (quote.bid, -1.0)
        };
        reference * (1.0 + sign * bps / 10_000.0)
    }
}
