//! Risk & exposure budget — sizing and open-risk ceilings.
//!
//! Sizing targets a risk percentage of reference equity scaled by signal
//! confidence, capped so implied leverage never exceeds the configured
//! maximum. Usage is tracked at portfolio, pair, and currency level (a pair
//! consumes budget in both of its currencies) and released proportionally
//! to the closed fraction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::Pair;
use crate::reason;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Target risk per trade as a percentage of equity, at confidence 1.0.
    pub risk_per_trade_pct: f64,
    pub max_leverage: f64,
    /// Ceiling on summed open risk across all pairs, percent of equity.
    pub max_portfolio_risk_pct: f64,
    /// Ceiling on summed open risk per currency, percent of equity.
    pub max_currency_risk_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: 1.0,
            max_leverage: 20.0,
            max_portfolio_risk_pct: 5.0,
            max_currency_risk_pct: 3.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum SizingError {
    #[error("stop distance is zero at entry {entry}")]
    ZeroStopDistance { entry: f64 },
    #[error("reference equity {0} is not positive")]
    NonPositiveEquity(f64),
}

/// Outcome of sizing one candidate trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizedTrade {
    pub units: f64,
    pub notional: f64,
    /// Actual open-risk percentage consumed (post leverage cap).
    pub risk_pct: f64,
}

impl RiskConfig {
    /// Size a candidate so `stop_distance * units ≈ equity * risk_pct / 100`,
    /// then cap notional at `equity * max_leverage`.
    pub fn size(
        &self,
        equity: f64,
        entry_price: f64,
        stop_price: f64,
        confidence: Option<f64>,
    ) -> Result<SizedTrade, SizingError> {
        if equity <= 0.0 {
            return Err(SizingError::NonPositiveEquity(equity));
        }
        let distance = (entry_price - stop_price).abs();
        if distance <= 0.0 {
            return Err(SizingError::ZeroStopDistance { entry: entry_price });
        }
        let confidence = confidence.unwrap_or(1.0).clamp(0.0, 1.0);
        let target_pct = self.risk_per_trade_pct * confidence;
        let mut units = equity * target_pct / 100.0 / distance;

        let max_notional = equity * self.max_leverage;
        if units * entry_price > max_notional {
            units = max_notional / entry_price;
        }

        Ok(SizedTrade {
            units,
            notional: units * entry_price,
            risk_pct: distance * units / equity * 100.0,
        })
    }
}

/// Currency buckets aggregate several pairs, so releases can leave float
/// residue; anything at or below this counts as an empty bucket.
const BUCKET_EPS: f64 = 1e-9;

/// Running open-risk percentages by portfolio, pair, and currency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskUsage {
    pub portfolio_pct: f64,
    pub per_pair: HashMap<Pair, f64>,
    pub per_currency: HashMap<String, f64>,
}

impl RiskUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// First ceiling the candidate would breach, if any.
    pub fn would_breach(&self, cfg: &RiskConfig, pair: &Pair, add_pct: f64) -> Option<&'static str> {
        if self.portfolio_pct + add_pct > cfg.max_portfolio_risk_pct {
            return Some(reason::RISK_BUDGET_EXCEEDED);
        }
        for currency in [pair.base(), pair.quote()] {
            let current = self.per_currency.get(currency).copied().unwrap_or(0.0);
            if current + add_pct > cfg.max_currency_risk_pct {
                return Some(reason::CURRENCY_EXPOSURE_EXCEEDED);
            }
        }
        None
    }

    pub fn reserve(&mut self, pair: &Pair, pct: f64) {
        self.portfolio_pct += pct;
        *self.per_pair.entry(pair.clone()).or_insert(0.0) += pct;
        for currency in [pair.base(), pair.quote()] {
            *self.per_currency.entry(currency.to_string()).or_insert(0.0) += pct;
        }
    }

    /// Release `fraction` (0-1) of the pair's current usage from every bucket.
    pub fn release(&mut self, pair: &Pair, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        let held = self.per_pair.get(pair).copied().unwrap_or(0.0);
        let released = held * fraction;
        if released <= 0.0 {
            return;
        }
        self.portfolio_pct = (self.portfolio_pct - released).max(0.0);
        if self.portfolio_pct <= BUCKET_EPS {
            self.portfolio_pct = 0.0;
        }
        if let Some(entry) = self.per_pair.get_mut(pair) {
            *entry = (*entry - released).max(0.0);
            if *entry <= BUCKET_EPS {
                self.per_pair.remove(pair);
            }
        }
        for currency in [pair.base(), pair.quote()] {
            if let Some(entry) = self.per_currency.get_mut(currency) {
                *entry = (*entry - released).max(0.0);
                if *entry <= BUCKET_EPS {
                    self.per_currency.remove(currency);
                }
            }
        }
    }

    pub fn pair_pct(&self, pair: &Pair) -> f64 {
        self.per_pair.get(pair).copied().unwrap_or(0.0)
    }
}
