//! Live cycle orchestration.
//!
//! Each cycle fans the configured pairs out over a bounded rayon pool. A
//! pair's cycle is: load persisted context, apply stress, run the engine's
//! management ladder, attempt at most one entry, mirror decisions to the
//! broker, persist context. The shared risk budget sits behind a mutex and
//! the critical section covers only the admit-and-reserve decision — broker
//! I/O always happens outside it. A failing pair reports its error and
//! leaves every other pair untouched.

use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use fxlab_core::broker::{Broker, RetryPolicy};
use fxlab_core::domain::{Pair, Quote};
use fxlab_core::engine::{ManagementAction, PositionEngine};
use fxlab_core::gates::PairContext;
use fxlab_core::reason;
use fxlab_core::replay::ReplayError;
use fxlab_core::risk::RiskUsage;
use fxlab_core::rng::SeedHierarchy;
use fxlab_core::signal::EntrySignal;
use fxlab_core::store::PositionContextStore;
use fxlab_core::stress::StressModel;
use thiserror::Error;

use crate::config::RunnerConfig;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("quote rejected: {0}")]
    Quote(#[from] ReplayError),
    #[error("broker failure: {0}")]
    Broker(#[from] fxlab_core::broker::BrokerError),
    #[error("context store failure: {0}")]
    Store(#[from] fxlab_core::store::StoreError),
    #[error("risk budget lock poisoned")]
    LockPoisoned,
}

/// Everything the cycle knows about one pair this tick.
#[derive(Debug, Clone)]
pub struct PairSnapshot {
    pub pair: Pair,
    pub quote: Quote,
    pub ctx: PairContext,
    pub signals: Vec<EntrySignal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairOutcome {
    pub pair: Pair,
    /// Human-readable renderings of the engine's actions, in order.
    pub actions: Vec<String>,
    pub entered: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub outcomes: Vec<PairOutcome>,
}

pub struct CycleRunner {
    cfg: RunnerConfig,
    broker: Arc<dyn Broker>,
    store: Arc<dyn PositionContextStore>,
    retry: RetryPolicy,
}

impl CycleRunner {
    pub fn new(
        cfg: RunnerConfig,
        broker: Arc<dyn Broker>,
        store: Arc<dyn PositionContextStore>,
    ) -> Self {
        Self {
            cfg,
            broker,
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run one cycle over the given snapshots. `cycle` feeds the RNG
    /// hierarchy, so re-running a cycle with the same inputs reproduces
    /// the same fills.
    pub fn run_cycle(&self, cycle: u64, snapshots: Vec<PairSnapshot>) -> CycleReport {
        info!(cycle, pairs = snapshots.len(), "starting cycle");
        let risk = Mutex::new(self.rebuild_risk_usage(&snapshots));

        let run = || {
            snapshots
                .par_iter()
                .map(|snapshot| self.process_pair(cycle, snapshot, &risk))
                .collect::<Vec<_>>()
        };
        let outcomes = if self.cfg.workers > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.cfg.workers)
                .build()
            {
                Ok(pool) => pool.install(run),
                Err(err) => {
                    warn!(%err, "bounded pool unavailable, using global pool");
                    run()
                }
            }
        } else {
            run()
        };

        CycleReport { cycle, outcomes }
    }

    /// Open risk carried over from previous cycles, reconstructed from the
    /// persisted positions.
    fn rebuild_risk_usage(&self, snapshots: &[PairSnapshot]) -> RiskUsage {
        let equity = self.cfg.replay.initial_equity;
        let mut usage = RiskUsage::new();
        for snapshot in snapshots {
            if let Ok(Some(ctx)) = self.store.load(&snapshot.pair) {
                if let Some(pos) = &ctx.position {
                    let pct = pos.initial_risk * pos.units / equity * 100.0;
                    usage.reserve(&snapshot.pair, pct);
                }
            }
        }
        usage
    }

    fn process_pair(
        &self,
        cycle: u64,
        snapshot: &PairSnapshot,
        risk: &Mutex<RiskUsage>,
    ) -> PairOutcome {
        match self.try_process_pair(cycle, snapshot, risk) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(pair = %snapshot.pair, %err, "pair cycle failed");
                PairOutcome {
                    pair: snapshot.pair.clone(),
                    actions: Vec::new(),
                    entered: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    fn try_process_pair(
        &self,
        cycle: u64,
        snapshot: &PairSnapshot,
        risk: &Mutex<RiskUsage>,
    ) -> Result<PairOutcome, CycleError> {
        let replay_cfg = &self.cfg.replay;
        let stress = StressModel::new(replay_cfg.stress.clone());
        let mut stressed = stress
            .apply(&snapshot.quote)
            .map_err(ReplayError::from)?;
        // A calendar event inside its force-close window becomes a
        // forced-close tick for the engine's first ladder step.
        if stressed.force_close_reason_code.is_none()
            && replay_cfg
                .gate
                .demands_force_close(&snapshot.pair, stressed.ts)
        {
            stressed.force_close_reason_code =
                Some(reason::EVENT_HIGH_FORCE_CLOSE.to_string());
        }

        let mut engine = PositionEngine::new(
            snapshot.pair.clone(),
            replay_cfg.engine.clone(),
            replay_cfg.risk.clone(),
            replay_cfg.locks.clone(),
            replay_cfg.slippage.clone(),
            replay_cfg.initial_equity,
        );
        if let Some(ctx) = self.store.load(&snapshot.pair)? {
            engine.restore(ctx);
        }
        let mut rng = SeedHierarchy::new(replay_cfg.master_seed).rng_for(
            snapshot.pair.as_str(),
            "live",
            cycle,
        );

        // Management decisions under the budget lock (pure and fast), broker
        // mirroring after it is released.
        let actions = {
            let mut risk = risk.lock().map_err(|_| CycleError::LockPoisoned)?;
            engine.on_tick(&stressed, &snapshot.ctx, &mut risk, &mut rng)
        };
        let mut error = None;
        for action in &actions {
            debug!(pair = %snapshot.pair, ?action, "management action");
            let mirror = match action {
                ManagementAction::ClosedFull { .. } => {
                    Some(self.retry.run(|| self.broker.close_position(&snapshot.pair, None)))
                }
                ManagementAction::ClosedPartial { pct, .. } => Some(
                    self.retry
                        .run(|| self.broker.close_position(&snapshot.pair, Some(*pct))),
                ),
                ManagementAction::StopAdjusted { .. }
                | ManagementAction::FeeApplied { .. } => None,
            };
            if let Some(Err(err)) = mirror {
                warn!(pair = %snapshot.pair, %err, "broker close failed");
                error = Some(err.to_string());
            }
        }

        // At most one order placement per cycle; reserve under the lock,
        // place the order outside it, roll back if the order is refused.
        // Signals consumed after that attempt still land on the audit trail.
        let mut entered = false;
        let mut attempted = false;
        for signal in &snapshot.signals {
            if attempted {
                let code = if engine.has_position() {
                    reason::POSITION_ALREADY_OPEN
                } else {
                    reason::ENTRY_ATTEMPT_SPENT
                };
                debug!(pair = %snapshot.pair, code, "entry signal skipped");
                engine.note_entry_skipped(stressed.ts, signal.side, code);
                continue;
            }
            let admitted = {
                let mut risk = risk.lock().map_err(|_| CycleError::LockPoisoned)?;
                engine.try_enter(
                    signal,
                    &stressed,
                    &snapshot.ctx,
                    &replay_cfg.gate,
                    &mut risk,
                    &mut rng,
                )
            };
            if !admitted {
                continue;
            }
            attempted = true;
            let (notional, side) = {
                let pos = engine.position().ok_or_else(|| {
                    fxlab_core::store::StoreError::Corrupt {
                        pair: snapshot.pair.to_string(),
                        detail: "entry reported but no position".into(),
                    }
                })?;
                (pos.entry_notional, pos.side)
            };
            let placed = self.retry.run(|| {
                self.broker.open_position(
                    &snapshot.pair,
                    side,
                    notional,
                    replay_cfg.risk.max_leverage,
                )
            });
            match placed {
                Ok(_) => entered = true,
                Err(err) => {
                    warn!(pair = %snapshot.pair, %err, "broker open failed, rolling back");
                    let mut risk = risk.lock().map_err(|_| CycleError::LockPoisoned)?;
                    engine.rollback_entry(&mut risk);
                    error = Some(err.to_string());
                }
            }
        }

        let ctx = engine.context();
        if ctx.position.is_none() && ctx.lock_until.is_none() {
            self.store.clear(&snapshot.pair)?;
        } else {
            self.store.save(&snapshot.pair, &ctx)?;
        }

        Ok(PairOutcome {
            pair: snapshot.pair.clone(),
            actions: actions.iter().map(|a| format!("{a:?}")).collect(),
            entered,
            error,
        })
    }
}
