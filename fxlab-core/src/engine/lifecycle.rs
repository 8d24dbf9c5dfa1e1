//! The per-pair position state machine.
//!
//! At most one open position per pair. Every tick walks a fixed priority
//! ladder — forced close, partial take-profit, trailing ratchet, take-profit,
//! stop invalidation, rollover fee, pre-rollover disposition, time stops —
//! and a terminal close short-circuits the remaining steps. Because the
//! take-profit check precedes the stop check, a tick satisfying both resolves
//! as a take-profit.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::domain::{
    EquityPoint, EventRisk, Ledger, LedgerKind, Pair, Position, Side, Timeline, TimelineKind,
};
use crate::detail;
use crate::gates::{AdmissionGate, PairContext};
use crate::locks::{LockConfig, ReentryLocks};
use crate::reason;
use crate::risk::{RiskConfig, RiskUsage, SizedTrade};
use crate::signal::EntrySignal;
use crate::slippage::{FillIntent, SlippageConfig, SlippageModel};
use crate::store::PositionContext;
use crate::stress::StressedQuote;

use super::config::{EngineConfig, PreRolloverMode};

/// What the engine did to the position on one tick, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagementAction {
    ClosedFull { reasons: Vec<String>, pnl: f64 },
    ClosedPartial { pct: f64, pnl: f64 },
    StopAdjusted { stop: f64 },
    FeeApplied { amount: f64 },
}

/// One pair's lifecycle engine: position, books, locks, and the rules that
/// drive them. Pure with respect to I/O — callers feed it stressed quotes
/// and a seeded generator, and mirror its decisions to a broker if they
/// have one.
#[derive(Debug, Clone)]
pub struct PositionEngine {
    cfg: EngineConfig,
    risk_cfg: RiskConfig,
    lock_cfg: LockConfig,
    slippage: SlippageModel,
    pair: Pair,
    position: Option<Position>,
    locks: ReentryLocks,
    /// Realized (cash) equity.
    equity: f64,
    realized_pnl: f64,
    rollover_fees: f64,
    ledger: Ledger,
    timeline: Timeline,
}

impl PositionEngine {
    pub fn new(
        pair: Pair,
        cfg: EngineConfig,
        risk_cfg: RiskConfig,
        lock_cfg: LockConfig,
        slippage_cfg: SlippageConfig,
        initial_equity: f64,
    ) -> Self {
        Self {
            cfg,
            risk_cfg,
            lock_cfg,
            slippage: SlippageModel::new(slippage_cfg),
            pair,
            position: None,
            locks: ReentryLocks::new(),
            equity: initial_equity,
            realized_pnl: 0.0,
            rollover_fees: 0.0,
            ledger: Ledger::new(),
            timeline: Timeline::new(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn rollover_fees(&self) -> f64 {
        self.rollover_fees
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn locks(&self) -> &ReentryLocks {
        &self.locks
    }

    /// Mark-to-market equity sample against the current quote.
    pub fn equity_point(&self, quote: &StressedQuote) -> EquityPoint {
        let unrealized = self
            .position
            .as_ref()
            .map_or(0.0, |p| p.unrealized_pnl(quote.bid, quote.ask));
        EquityPoint {
            ts: quote.ts,
            equity: self.equity + unrealized,
            realized_pnl: self.realized_pnl,
            unrealized_pnl: unrealized,
        }
    }

    // ── Cross-cycle persistence ──────────────────────────────────────

    pub fn context(&self) -> PositionContext {
        PositionContext {
            position: self.position.clone(),
            lock_until: self.locks.until(&self.pair),
        }
    }

    pub fn restore(&mut self, ctx: PositionContext) {
        self.position = ctx.position;
        if let Some(until) = ctx.lock_until {
            self.locks.merge(&self.pair, until);
        }
    }

    // ── Entry ────────────────────────────────────────────────────────

    /// Attempt to open a position from a signal. Returns true on success;
    /// every rejection lands on the timeline with its reason codes,
    /// including signals arriving while a position is already open.
    pub fn try_enter(
        &mut self,
        signal: &EntrySignal,
        quote: &StressedQuote,
        ctx: &PairContext,
        gate: &AdmissionGate,
        risk: &mut RiskUsage,
        rng: &mut impl Rng,
    ) -> bool {
        if self.position.is_some() {
            self.note_entry_skipped(quote.ts, signal.side, reason::POSITION_ALREADY_OPEN);
            return false;
        }

        if self.locks.is_locked(&self.pair, quote.ts) {
            let until = self
                .locks
                .until(&self.pair)
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            self.timeline.record(
                quote.ts,
                TimelineKind::EntryBlocked,
                vec![reason::REENTRY_LOCKED.to_string()],
                detail![("lockedUntil", until)],
            );
            return false;
        }

        let decision = gate.check(&self.pair, quote, ctx);
        if !decision.admitted() {
            self.timeline.record(
                quote.ts,
                TimelineKind::EntryBlocked,
                decision.blockers,
                detail![("side", signal.side)],
            );
            return false;
        }

        let exec = self
            .slippage
            .fill_price(quote, signal.side, FillIntent::Entry, rng);

        let mut stop = signal.stop_price;
        if decision.tighten_stop {
            let distance = (exec - stop).abs() * gate.entry.event_stop_tighten_factor;
            stop = exec - signal.side.direction() * distance;
        }
        let distance = (exec - stop).abs();
        if distance <= 0.0 {
            self.timeline.record(
                quote.ts,
                TimelineKind::EntryBlocked,
                vec![reason::STOP_DISTANCE_ZERO.to_string()],
                detail![("execPrice", exec)],
            );
            return false;
        }

        let sized = match signal.notional_usd {
            Some(notional) if notional > 0.0 => {
                let units = notional / exec;
                SizedTrade {
                    units,
                    notional,
                    risk_pct: distance * units / self.equity * 100.0,
                }
            }
            _ => match self.risk_cfg.size(self.equity, exec, stop, signal.confidence) {
                Ok(sized) => sized,
                Err(err) => {
                    self.timeline.record(
                        quote.ts,
                        TimelineKind::EntryBlocked,
                        vec![reason::STOP_DISTANCE_ZERO.to_string()],
                        detail![("error", err)],
                    );
                    return false;
                }
            },
        };

        if let Some(code) = risk.would_breach(&self.risk_cfg, &self.pair, sized.risk_pct) {
            self.timeline.record(
                quote.ts,
                TimelineKind::EntryBlocked,
                vec![code.to_string()],
                detail![("riskPct", sized.risk_pct)],
            );
            return false;
        }
        risk.reserve(&self.pair, sized.risk_pct);

        let mut position = Position::open(
            self.pair.clone(),
            signal.side,
            exec,
            stop,
            signal.take_profit_price,
            sized.units,
            quote.ts,
        );
        position.trailing_mode = self.cfg.trailing_mode;
        self.locks.clear(&self.pair);

        self.ledger.append(
            quote.ts,
            LedgerKind::Entry,
            signal.side,
            exec,
            sized.units,
            0.0,
            0.0,
            signal.label.iter().cloned().collect(),
            sized.units,
            self.equity,
        );
        self.timeline.record(
            quote.ts,
            TimelineKind::EntryOpened,
            Vec::new(),
            detail![
                ("side", signal.side),
                ("execPrice", exec),
                ("units", sized.units),
                ("stop", stop),
            ],
        );
        self.position = Some(position);
        true
    }

    /// Audit record for a signal that was consumed without an admission
    /// attempt, so skipped signals never vanish silently.
    pub fn note_entry_skipped(&mut self, ts: DateTime<Utc>, side: Side, code: &str) {
        self.timeline.record(
            ts,
            TimelineKind::EntryBlocked,
            vec![code.to_string()],
            detail![("side", side)],
        );
    }

    // ── Tick management ──────────────────────────────────────────────

    /// Run the management ladder for one tick. No-op while flat.
    pub fn on_tick(
        &mut self,
        quote: &StressedQuote,
        ctx: &PairContext,
        risk: &mut RiskUsage,
        rng: &mut impl Rng,
    ) -> Vec<ManagementAction> {
        let mut actions = Vec::new();
        if self.position.is_none() {
            return actions;
        }

        // 1. Forced close: external code verbatim, else high event risk.
        let forced = if let Some(code) = &quote.force_close_reason_code {
            Some(vec![code.clone()])
        } else if self.cfg.force_close_on_high_event && quote.event_risk == Some(EventRisk::High) {
            Some(vec![reason::EVENT_HIGH_FORCE_CLOSE.to_string()])
        } else {
            None
        };
        if let Some(reasons) = forced {
            actions.push(self.close_full(quote, reasons, risk, rng));
            return actions;
        }

        // 2. Partial take-profit, then breakeven stop and trailing arm.
        let wants_partial = {
            let pos = self.position.as_ref().expect("position checked open");
            self.cfg.partial_close_pct > 0.0
                && !pos.partial_taken()
                && pos.favorable_r(quote.bid, quote.ask) >= self.cfg.partial_at_r
        };
        if wants_partial {
            let pct = self.cfg.partial_close_pct;
            actions.push(self.close_partial(
                quote,
                pct,
                vec![reason::PARTIAL_TAKE_PROFIT.to_string()],
                risk,
                rng,
            ));
            if let Some(pos) = self.position.as_mut() {
                let breakeven = pos.entry_price;
                let moved = pos.tighten_stop(breakeven);
                pos.trailing_active = true;
                if moved {
                    self.timeline.record(
                        quote.ts,
                        TimelineKind::StopTightened,
                        vec![reason::BREAKEVEN_STOP_SET.to_string()],
                        detail![("stop", breakeven)],
                    );
                    actions.push(ManagementAction::StopAdjusted { stop: breakeven });
                }
            }
        }

        // 3. Trailing ratchet.
        if let Some(pos) = self.position.as_mut() {
            if pos.trailing_active {
                let reference = match pos.side {
                    Side::Buy => quote.bid,
                    Side::Sell => quote.ask,
                };
                let dir = pos.side.direction();
                let candidate = match pos.trailing_mode {
                    crate::domain::TrailingMode::RDistance => {
                        reference - dir * pos.initial_risk * self.cfg.trailing_distance_r
                    }
                    crate::domain::TrailingMode::Percent => {
                        reference * (1.0 - dir * self.cfg.trailing_percent)
                    }
                };
                if pos.tighten_stop(candidate) {
                    let stop = pos.current_stop;
                    self.timeline.record(
                        quote.ts,
                        TimelineKind::StopTightened,
                        vec![reason::TRAILING_STOP_TIGHTENED.to_string()],
                        detail![("stop", stop)],
                    );
                    actions.push(ManagementAction::StopAdjusted { stop });
                }
            }
        }

        // 4. Take-profit. Evaluated before the stop, so an exact tie between
        //    the two resolves as a take-profit.
        let tp_hit = self
            .position
            .as_ref()
            .is_some_and(|p| p.take_profit_hit(quote.bid, quote.ask));
        if tp_hit {
            actions.push(self.close_full(
                quote,
                vec![reason::TAKE_PROFIT_HIT.to_string()],
                risk,
                rng,
            ));
            return actions;
        }

        // 5. Stop invalidation, suppressed inside the minimum hold window.
        //    Stress tags on the tick ride along as lock modifiers.
        let stop_hit = {
            let pos = self.position.as_ref().expect("position checked open");
            (self.cfg.min_hold_minutes <= 0
                || pos.age_minutes(quote.ts) >= self.cfg.min_hold_minutes)
                && pos.stop_triggered(quote.bid, quote.ask)
        };
        if stop_hit {
            let pos = self.position.as_ref().expect("position checked open");
            let mut reasons = vec![match pos.side {
                Side::Buy => reason::STOP_INVALIDATED_LONG.to_string(),
                Side::Sell => reason::STOP_INVALIDATED_SHORT.to_string(),
            }];
            reasons.extend(quote.stress_reasons.iter().map(|s| s.to_string()));
            actions.push(self.close_full(quote, reasons, risk, rng));
            return actions;
        }

        // 6. Rollover fee, once per day-boundary crossing.
        let fee_due = {
            let pos = self.position.as_ref().expect("position checked open");
            let today = quote.ts.date_naive();
            let boundary = quote.rollover || today > pos.last_mark_date;
            self.cfg.rollover_fee_bps > 0.0
                && boundary
                && pos.last_rollover_date != Some(today)
        };
        if fee_due {
            actions.push(self.apply_rollover_fee(quote));
        }

        // 7. Pre-rollover disposition, armed only under spread stress.
        let pre = self.cfg.pre_rollover.clone();
        if pre.in_window(quote.ts) {
            let stressed = ctx
                .atr
                .filter(|a| *a > 0.0)
                .is_some_and(|atr| quote.spread() / atr > pre.spread_to_atr_threshold);
            if stressed {
                match pre.mode {
                    PreRolloverMode::Close => {
                        actions.push(self.close_full(
                            quote,
                            vec![reason::PRE_ROLLOVER_CLOSE.to_string()],
                            risk,
                            rng,
                        ));
                        return actions;
                    }
                    PreRolloverMode::Derisk => {
                        let (favorable, derisked) = {
                            let pos = self.position.as_ref().expect("position checked open");
                            (pos.favorable_r(quote.bid, quote.ask), pos.derisked)
                        };
                        if favorable >= pre.min_winner_r && !derisked {
                            actions.push(self.close_partial(
                                quote,
                                pre.derisk_pct,
                                vec![reason::PRE_ROLLOVER_DERISK.to_string()],
                                risk,
                                rng,
                            ));
                            if let Some(pos) = self.position.as_mut() {
                                pos.derisked = true;
                            }
                        } else if favorable < pre.weak_max_r {
                            actions.push(self.close_full(
                                quote,
                                vec![reason::PRE_ROLLOVER_WEAK_CLOSE.to_string()],
                                risk,
                                rng,
                            ));
                            return actions;
                        }
                    }
                }
            }
        }

        // Tick bookkeeping before the age-based step: the current tick
        // counts toward the hold and the favorable high-water mark.
        let time_stop = {
            let pos = self.position.as_mut().expect("position checked open");
            let favorable = pos.favorable_r(quote.bid, quote.ask);
            pos.note_tick(quote.ts, favorable);

            // 8. Time stops.
            let cfg = &self.cfg.time_stop;
            if cfg.no_follow_through_bars > 0
                && pos.ticks_held >= cfg.no_follow_through_bars
                && pos.max_favorable_r < cfg.min_follow_through_r
            {
                Some(reason::TIME_STOP_NO_FOLLOW_THROUGH)
            } else if cfg.max_hold_bars > 0
                && pos.ticks_held >= cfg.max_hold_bars
                && !(ctx.regime_aligned && pos.trailing_active)
            {
                Some(reason::TIME_STOP_MAX_HOLD)
            } else {
                None
            }
        };
        if let Some(code) = time_stop {
            actions.push(self.close_full(quote, vec![code.to_string()], risk, rng));
        }

        actions
    }

    // ── Closes ───────────────────────────────────────────────────────

    /// Flatten at end of replay. Never produces a reentry lock.
    pub fn close_end_of_replay(
        &mut self,
        quote: &StressedQuote,
        risk: &mut RiskUsage,
        rng: &mut impl Rng,
    ) -> Option<ManagementAction> {
        if self.position.is_none() {
            return None;
        }
        Some(self.close_full(
            quote,
            vec![reason::END_OF_REPLAY_FLAT.to_string()],
            risk,
            rng,
        ))
    }

    /// Undo an entry whose broker order could not be placed: the books are
    /// rewound at the entry price with zero PnL and the budget released.
    pub fn rollback_entry(&mut self, risk: &mut RiskUsage) -> Option<ManagementAction> {
        let pos = self.position.take()?;
        risk.release(&self.pair, 1.0);
        let reasons = vec![reason::BROKER_OPEN_FAILED.to_string()];
        self.ledger.append(
            pos.opened_at,
            LedgerKind::Exit,
            pos.side,
            pos.entry_price,
            pos.units,
            0.0,
            0.0,
            reasons.clone(),
            0.0,
            self.equity,
        );
        self.timeline.record(
            pos.opened_at,
            TimelineKind::PositionClosed,
            reasons.clone(),
            detail![("execPrice", pos.entry_price)],
        );
        Some(ManagementAction::ClosedFull { reasons, pnl: 0.0 })
    }

    fn close_full(
        &mut self,
        quote: &StressedQuote,
        reasons: Vec<String>,
        risk: &mut RiskUsage,
        rng: &mut impl Rng,
    ) -> ManagementAction {
        let pos = self.position.take().expect("close_full requires a position");
        let exec = self
            .slippage
            .fill_price(quote, pos.side, FillIntent::Exit, rng);
        let pnl = match pos.side {
            Side::Buy => (exec - pos.entry_price) * pos.units,
            Side::Sell => (pos.entry_price - exec) * pos.units,
        };
        self.equity += pnl;
        self.realized_pnl += pnl;
        risk.release(&self.pair, 1.0);

        self.ledger.append(
            quote.ts,
            LedgerKind::Exit,
            pos.side,
            exec,
            pos.units,
            pnl,
            0.0,
            reasons.clone(),
            0.0,
            self.equity,
        );
        self.timeline.record(
            quote.ts,
            TimelineKind::PositionClosed,
            reasons.clone(),
            detail![("execPrice", exec), ("pnl", pnl), ("units", pos.units)],
        );

        if let Some(until) = self.locks.apply_close(&self.pair, quote.ts, &reasons, &self.lock_cfg)
        {
            self.timeline.record(
                quote.ts,
                TimelineKind::ReentryLockUpdated,
                reasons.clone(),
                detail![("lockedUntil", until.to_rfc3339())],
            );
        }

        ManagementAction::ClosedFull { reasons, pnl }
    }

    fn close_partial(
        &mut self,
        quote: &StressedQuote,
        pct: f64,
        reasons: Vec<String>,
        risk: &mut RiskUsage,
        rng: &mut impl Rng,
    ) -> ManagementAction {
        let pct = pct.clamp(0.0, 100.0);
        if pct >= 100.0 {
            return self.close_full(quote, reasons, risk, rng);
        }
        let pos = self
            .position
            .as_mut()
            .expect("close_partial requires a position");
        let side = pos.side;
        let units_closed = pos.units * pct / 100.0;
        pos.units -= units_closed;
        pos.partial_taken_pct = (pos.partial_taken_pct + pct).min(100.0);
        let entry_price = pos.entry_price;
        let open_after = pos.units;

        let exec = self.slippage.fill_price(quote, side, FillIntent::Exit, rng);
        let pnl = match side {
            Side::Buy => (exec - entry_price) * units_closed,
            Side::Sell => (entry_price - exec) * units_closed,
        };
        self.equity += pnl;
        self.realized_pnl += pnl;
        risk.release(&self.pair, pct / 100.0);

        self.ledger.append(
            quote.ts,
            LedgerKind::PartialExit,
            side,
            exec,
            units_closed,
            pnl,
            0.0,
            reasons.clone(),
            open_after,
            self.equity,
        );
        self.timeline.record(
            quote.ts,
            TimelineKind::PartialTaken,
            reasons,
            detail![("execPrice", exec), ("pnl", pnl), ("pct", pct)],
        );

        ManagementAction::ClosedPartial { pct, pnl }
    }

    fn apply_rollover_fee(&mut self, quote: &StressedQuote) -> ManagementAction {
        let mid = quote.mid();
        let (side, units, fee) = {
            let pos = self
                .position
                .as_mut()
                .expect("rollover fee requires a position");
            let fee = pos.units * mid * self.cfg.rollover_fee_bps / 10_000.0;
            pos.last_rollover_date = Some(quote.ts.date_naive());
            (pos.side, pos.units, fee)
        };
        self.equity -= fee;
        self.rollover_fees += fee;

        self.ledger.append(
            quote.ts,
            LedgerKind::RolloverFee,
            side,
            mid,
            units,
            0.0,
            fee,
            vec![reason::ROLLOVER_FEE.to_string()],
            units,
            self.equity,
        );
        self.timeline.record(
            quote.ts,
            TimelineKind::RolloverFeeApplied,
            vec![reason::ROLLOVER_FEE.to_string()],
            detail![("fee", fee), ("markPrice", mid)],
        );

        ManagementAction::FeeApplied { amount: fee }
    }
}
