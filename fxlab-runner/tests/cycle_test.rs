//! Live cycle integration with a scripted in-memory broker.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};

use fxlab_core::broker::{Broker, BrokerError, BrokerPosition, OrderAck, RetryPolicy};
use fxlab_core::domain::{Pair, Quote, Side};
use fxlab_core::gates::{EconomicEvent, EventGate, Impact, PairContext};
use fxlab_core::signal::EntrySignal;
use fxlab_core::store::{InMemoryContextStore, PositionContextStore};
use fxlab_runner::config::RunnerConfig;
use fxlab_runner::cycle::{CycleRunner, PairSnapshot};

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Open(String, Side, f64),
    Close(String, Option<f64>),
}

/// Scripted broker: records operations and fails opens per a plan.
#[derive(Default)]
struct ScriptedBroker {
    ops: Mutex<Vec<Op>>,
    open_failures: AtomicU32,
    fail_kind: Mutex<Option<&'static str>>,
}

impl ScriptedBroker {
    fn failing_opens(n: u32, kind: &'static str) -> Self {
        let broker = Self::default();
        broker.open_failures.store(n, Ordering::SeqCst);
        *broker.fail_kind.lock().unwrap() = Some(kind);
        broker
    }

    fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }
}

impl Broker for ScriptedBroker {
    fn open_position(
        &self,
        pair: &Pair,
        side: Side,
        notional: f64,
        _leverage: f64,
    ) -> Result<OrderAck, BrokerError> {
        if self.open_failures.load(Ordering::SeqCst) > 0 {
            self.open_failures.fetch_sub(1, Ordering::SeqCst);
            let err = match *self.fail_kind.lock().unwrap() {
                Some("transient") => BrokerError::Transient("gateway timeout".into()),
                _ => BrokerError::Rejected("insufficient margin".into()),
            };
            return Err(err);
        }
        self.ops
            .lock()
            .unwrap()
            .push(Op::Open(pair.to_string(), side, notional));
        Ok(OrderAck {
            order_id: "ok".into(),
        })
    }

    fn close_position(
        &self,
        pair: &Pair,
        partial_pct: Option<f64>,
    ) -> Result<OrderAck, BrokerError> {
        self.ops
            .lock()
            .unwrap()
            .push(Op::Close(pair.to_string(), partial_pct));
        Ok(OrderAck {
            order_id: "ok".into(),
        })
    }

    fn list_open_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        Ok(Vec::new())
    }
}

fn config() -> RunnerConfig {
    let mut cfg = RunnerConfig::default();
    cfg.replay.engine.time_stop.no_follow_through_bars = 0;
    cfg.replay.engine.time_stop.max_hold_bars = 0;
    cfg
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_backoff: Duration::from_millis(1),
    }
}

fn snapshot(pair: &str, bid: f64, ask: f64, signal: Option<EntrySignal>) -> PairSnapshot {
    let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
    PairSnapshot {
        pair: Pair::new(pair).unwrap(),
        quote: Quote::new(ts, bid, ask),
        ctx: PairContext::default(),
        signals: signal.into_iter().collect(),
    }
}

fn long_signal() -> EntrySignal {
    EntrySignal {
        ts: Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap(),
        side: Side::Buy,
        stop_price: 1.0950,
        take_profit_price: None,
        notional_usd: None,
        confidence: None,
        label: None,
    }
}

#[test]
fn entry_is_mirrored_to_broker_and_persisted() {
    let broker = Arc::new(ScriptedBroker::default());
    let store = Arc::new(InMemoryContextStore::new());
    let runner = CycleRunner::new(config(), broker.clone(), store.clone());

    let report = runner.run_cycle(
        0,
        vec![snapshot("EURUSD", 1.0999, 1.1001, Some(long_signal()))],
    );
    assert!(report.outcomes[0].entered);
    assert!(report.outcomes[0].error.is_none());

    let ops = broker.ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(&ops[0], Op::Open(pair, Side::Buy, _) if pair == "EURUSD"));

    let ctx = store
        .load(&Pair::new("EURUSD").unwrap())
        .unwrap()
        .expect("context persisted");
    assert!(ctx.position.is_some());
}

#[test]
fn rejected_open_rolls_back_and_clears_the_store() {
    let broker = Arc::new(ScriptedBroker::failing_opens(1, "rejected"));
    let store = Arc::new(InMemoryContextStore::new());
    let runner =
        CycleRunner::new(config(), broker.clone(), store.clone()).with_retry(fast_retry());

    let report = runner.run_cycle(
        0,
        vec![snapshot("EURUSD", 1.0999, 1.1001, Some(long_signal()))],
    );
    assert!(!report.outcomes[0].entered);
    assert!(report.outcomes[0].error.is_some());
    // Rejection is not retried, and the rolled-back pair leaves no context.
    assert!(broker.ops().is_empty());
    assert!(store
        .load(&Pair::new("EURUSD").unwrap())
        .unwrap()
        .is_none());
}

#[test]
fn transient_open_failures_are_retried_to_success() {
    let broker = Arc::new(ScriptedBroker::failing_opens(2, "transient"));
    let store = Arc::new(InMemoryContextStore::new());
    let runner =
        CycleRunner::new(config(), broker.clone(), store.clone()).with_retry(fast_retry());

    let report = runner.run_cycle(
        0,
        vec![snapshot("EURUSD", 1.0999, 1.1001, Some(long_signal()))],
    );
    assert!(report.outcomes[0].entered);
    assert!(report.outcomes[0].error.is_none());
    assert_eq!(broker.ops().len(), 1);
}

#[test]
fn stop_close_in_a_later_cycle_is_mirrored() {
    let broker = Arc::new(ScriptedBroker::default());
    let store = Arc::new(InMemoryContextStore::new());
    let runner = CycleRunner::new(config(), broker.clone(), store.clone());

    runner.run_cycle(
        0,
        vec![snapshot("EURUSD", 1.0999, 1.1001, Some(long_signal()))],
    );
    // Next cycle prints through the stop.
    let report = runner.run_cycle(1, vec![snapshot("EURUSD", 1.0940, 1.0942, None)]);
    assert!(!report.outcomes[0].actions.is_empty());

    let ops = broker.ops();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[1], Op::Close("EURUSD".to_string(), None));

    // The stop close leaves a reentry lock behind, so context persists.
    let ctx = store
        .load(&Pair::new("EURUSD").unwrap())
        .unwrap()
        .expect("lock context persisted");
    assert!(ctx.position.is_none());
    assert!(ctx.lock_until.is_some());
}

#[test]
fn calendar_force_close_window_flattens_open_position() {
    let mut cfg = config();
    let event_ts = Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap();
    cfg.replay.gate.events = EventGate::with_defaults(vec![EconomicEvent {
        timestamp_utc: event_ts,
        currency: "USD".into(),
        impact: Impact::High,
        event_name: "FOMC".into(),
    }]);

    let broker = Arc::new(ScriptedBroker::default());
    let store = Arc::new(InMemoryContextStore::new());
    let runner = CycleRunner::new(cfg, broker.clone(), store.clone());

    // Entry an hour ahead of the event, well outside every window.
    runner.run_cycle(
        0,
        vec![snapshot("EURUSD", 1.0999, 1.1001, Some(long_signal()))],
    );

    // Five minutes before the event, a calm quote must still flatten.
    let mut snap = snapshot("EURUSD", 1.1000, 1.1002, None);
    snap.quote.ts = event_ts - ChronoDuration::minutes(5);
    let report = runner.run_cycle(1, vec![snap]);
    assert!(report.outcomes[0]
        .actions
        .iter()
        .any(|a| a.contains("EVENT_HIGH_FORCE_CLOSE")));

    let ops = broker.ops();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[1], Op::Close("EURUSD".to_string(), None));
    // The forced close leaves a reentry lock, so context persists.
    let ctx = store
        .load(&Pair::new("EURUSD").unwrap())
        .unwrap()
        .expect("lock context persisted");
    assert!(ctx.position.is_none());
    assert!(ctx.lock_until.is_some());
}

#[test]
fn extra_signals_in_one_cycle_are_not_attempted() {
    let broker = Arc::new(ScriptedBroker::default());
    let store = Arc::new(InMemoryContextStore::new());
    let runner = CycleRunner::new(config(), broker.clone(), store.clone());

    let mut snap = snapshot("EURUSD", 1.0999, 1.1001, Some(long_signal()));
    snap.signals.push(long_signal());
    let report = runner.run_cycle(0, vec![snap]);

    assert!(report.outcomes[0].entered);
    // One order: the second signal is consumed without a broker attempt.
    assert_eq!(broker.ops().len(), 1);
}

#[test]
fn one_failing_pair_does_not_poison_the_others() {
    let broker = Arc::new(ScriptedBroker::default());
    let store = Arc::new(InMemoryContextStore::new());
    let runner = CycleRunner::new(config(), broker.clone(), store.clone());

    let report = runner.run_cycle(
        0,
        vec![
            // Crossed quote: this pair's cycle fails outright.
            snapshot("GBPUSD", 1.2700, 1.2698, Some(long_signal())),
            snapshot("EURUSD", 1.0999, 1.1001, Some(long_signal())),
        ],
    );

    let gbp = report
        .outcomes
        .iter()
        .find(|o| o.pair.as_str() == "GBPUSD")
        .unwrap();
    assert!(gbp.error.is_some());
    assert!(!gbp.entered);

    let eur = report
        .outcomes
        .iter()
        .find(|o| o.pair.as_str() == "EURUSD")
        .unwrap();
    assert!(eur.entered);
}

#[test]
fn shared_currency_budget_admits_only_one_pair() {
    let mut cfg = config();
    cfg.replay.risk.risk_per_trade_pct = 2.0;
    cfg.replay.risk.max_portfolio_risk_pct = 10.0;
    cfg.replay.risk.max_currency_risk_pct = 3.0;
    cfg.workers = 1; // deterministic admission order

    let broker = Arc::new(ScriptedBroker::default());
    let store = Arc::new(InMemoryContextStore::new());
    let runner = CycleRunner::new(cfg, broker.clone(), store.clone());

    let mut gbp_signal = long_signal();
    gbp_signal.stop_price = 1.2650;
    let report = runner.run_cycle(
        0,
        vec![
            snapshot("EURUSD", 1.0999, 1.1001, Some(long_signal())),
            snapshot("GBPUSD", 1.2699, 1.2701, Some(gbp_signal)),
        ],
    );

    let entered: usize = report.outcomes.iter().filter(|o| o.entered).count();
    assert_eq!(entered, 1);
    assert_eq!(broker.ops().len(), 1);
}
