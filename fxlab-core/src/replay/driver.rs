//! The replay driver — deterministic offline execution of one fixture.
//!
//! Ticks are processed strictly in order: management first, then entry
//! attempts while flat. Anything still open when the stream ends is
//! flattened at the final quote, so a replay always finishes with zero
//! exposure and fully-realized PnL.

use serde::{Deserialize, Serialize};

use crate::domain::{EquityPoint, Ledger, Pair, Timeline};
use crate::engine::{EngineConfig, PositionEngine};
use crate::gates::{AdmissionGate, PairContext};
use crate::locks::LockConfig;
use crate::reason;
use crate::risk::{RiskConfig, RiskUsage};
use crate::rng::SeedHierarchy;
use crate::signal::{ScriptedSignals, SignalSource};
use crate::slippage::SlippageConfig;
use crate::stress::{StressConfig, StressModel};

use super::fixture::{ReplayError, ReplayFixture};
use super::summary::ReplaySummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub initial_equity: f64,
    pub master_seed: u64,
    /// Scenario iteration index, part of the RNG sub-seed.
    pub iteration: u64,
    /// ATR supplied to the spread-eligibility and pre-rollover gates;
    /// `None` leaves those distance gates inactive.
    pub atr: Option<f64>,
    pub regime_aligned: bool,
    pub engine: EngineConfig,
    pub risk: RiskConfig,
    pub locks: LockConfig,
    pub slippage: SlippageConfig,
    pub stress: StressConfig,
    pub gate: AdmissionGate,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            master_seed: 0,
            iteration: 0,
            atr: None,
            regime_aligned: false,
            engine: EngineConfig::default(),
            risk: RiskConfig::default(),
            locks: LockConfig::default(),
            slippage: SlippageConfig::default(),
            stress: StressConfig::default(),
            gate: AdmissionGate::default(),
        }
    }
}

/// Everything a replay produced: books, audit trail, curve, and summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub pair: Pair,
    pub ledger: Ledger,
    pub timeline: Timeline,
    pub equity_curve: Vec<EquityPoint>,
    pub summary: ReplaySummary,
}

#[derive(Debug, Clone)]
pub struct ReplayDriver {
    cfg: ReplayConfig,
}

impl ReplayDriver {
    pub fn new(cfg: ReplayConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.cfg
    }

    /// Run the fixture to completion. Identical fixture and config always
    /// produce an identical report.
    pub fn run(&self, fixture: &ReplayFixture) -> Result<ReplayReport, ReplayError> {
        fixture.validate()?;

        let cfg = &self.cfg;
        let mut engine = PositionEngine::new(
            fixture.pair.clone(),
            cfg.engine.clone(),
            cfg.risk.clone(),
            cfg.locks.clone(),
            cfg.slippage.clone(),
            cfg.initial_equity,
        );
        let mut rng = SeedHierarchy::new(cfg.master_seed).rng_for(
            fixture.pair.as_str(),
            "slippage",
            cfg.iteration,
        );
        let stress = StressModel::new(cfg.stress.clone());
        let mut signals = ScriptedSignals::new(fixture.entries.clone());
        let mut risk = RiskUsage::new();
        let mut curve = Vec::with_capacity(fixture.quotes.len() + 1);
        let mut last_stressed = None;

        for quote in &fixture.quotes {
            let mut stressed = stress.apply(quote)?;
            // A calendar event inside its force-close window becomes a
            // forced-close tick for the engine's first ladder step.
            if stressed.force_close_reason_code.is_none()
                && cfg.gate.demands_force_close(&fixture.pair, stressed.ts)
            {
                stressed.force_close_reason_code =
                    Some(reason::EVENT_HIGH_FORCE_CLOSE.to_string());
            }
            let ctx = PairContext {
                atr: cfg.atr,
                regime_aligned: cfg.regime_aligned,
                session_transition: cfg.stress.in_transition_window(stressed.ts),
            };

            engine.on_tick(&stressed, &ctx, &mut risk, &mut rng);

            // Signals stay queued while a position is open; a close and a
            // fresh entry on the same tick is legal, a flip is not. Once one
            // polled signal opens, the rest of the tick's signals are refused
            // with their own timeline records.
            if !engine.has_position() {
                for signal in signals.poll(&fixture.pair, stressed.ts) {
                    engine.try_enter(&signal, &stressed, &ctx, &cfg.gate, &mut risk, &mut rng);
                }
            }

            curve.push(engine.equity_point(&stressed));
            last_stressed = Some(stressed);
        }

        if let Some(stressed) = &last_stressed {
            if engine
                .close_end_of_replay(stressed, &mut risk, &mut rng)
                .is_some()
            {
                curve.push(engine.equity_point(stressed));
            }
        }

        let summary = ReplaySummary::compute(
            cfg.initial_equity,
            engine.equity(),
            engine.realized_pnl(),
            engine.rollover_fees(),
            fixture.quotes.len(),
            engine.ledger(),
            engine.timeline(),
            &curve,
        );

        Ok(ReplayReport {
            pair: fixture.pair.clone(),
            ledger: engine.ledger().clone(),
            timeline: engine.timeline().clone(),
            equity_curve: curve,
            summary,
        })
    }
}
