//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Ratchet monotonicity — stops only tighten under any candidate stream
//! 2. Lock merge — the effective unlock time is non-decreasing
//! 3. Slippage — fills are always adverse and seed-deterministic
//! 4. Stress — midpoint preserved, spread never narrowed, factors floored

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use fxlab_core::domain::{EventRisk, Pair, Position, Quote, Side};
use fxlab_core::locks::{resolve_reentry_lock_minutes, LockConfig, ReentryLocks};
use fxlab_core::slippage::{FillIntent, SlippageModel};
use fxlab_core::stress::StressModel;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (0.5..2.0_f64).prop_map(|p| (p * 10_000.0).round() / 10_000.0)
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

fn arb_spread() -> impl Strategy<Value = f64> {
    0.00005..0.0050_f64
}

fn arb_event_risk() -> impl Strategy<Value = Option<EventRisk>> {
    prop_oneof![
        Just(None),
        Just(Some(EventRisk::Medium)),
        Just(Some(EventRisk::High)),
    ]
}

// ── 1. Ratchet monotonicity ──────────────────────────────────────────

proptest! {
    /// Whatever candidates arrive, a long stop never falls and a short
    /// stop never rises.
    #[test]
    fn stop_ratchet_is_monotonic(
        side in arb_side(),
        candidates in prop::collection::vec(arb_price(), 1..40),
    ) {
        let opened = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let (entry, stop) = match side {
            Side::Buy => (1.1000, 1.0950),
            Side::Sell => (1.1000, 1.1050),
        };
        let mut pos = Position::open(
            Pair::new("EURUSD").unwrap(),
            side,
            entry,
            stop,
            None,
            10_000.0,
            opened,
        );

        let mut prev = pos.current_stop;
        for candidate in candidates {
            pos.tighten_stop(candidate);
            match side {
                Side::Buy => prop_assert!(pos.current_stop >= prev),
                Side::Sell => prop_assert!(pos.current_stop <= prev),
            }
            prev = pos.current_stop;
        }
    }
}

// ── 2. Lock merge ────────────────────────────────────────────────────

proptest! {
    /// Merging any sequence of candidate locks never pulls the unlock
    /// time earlier.
    #[test]
    fn lock_merge_is_non_decreasing(offsets in prop::collection::vec(0_i64..10_000, 1..30)) {
        let pair = Pair::new("EURUSD").unwrap();
        let base = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let mut locks = ReentryLocks::new();
        let mut prev = None;
        for offset in offsets {
            let merged = locks.merge(&pair, base + Duration::minutes(offset));
            if let Some(prev) = prev {
                prop_assert!(merged >= prev);
            }
            prop_assert_eq!(Some(merged), locks.until(&pair));
            prev = Some(merged);
        }
    }

    /// The category table always picks the longest applicable duration.
    #[test]
    fn overlapping_reasons_pick_the_longest(
        pick in prop::collection::vec(0_usize..4, 1..4),
    ) {
        let cfg = LockConfig::default();
        let table = [
            ("EVENT_HIGH_FORCE_CLOSE", cfg.event_minutes),
            ("TIME_STOP_MAX_HOLD", cfg.time_stop_minutes),
            ("REGIME_FLIP_CLOSE", cfg.regime_flip_minutes),
            ("STOP_INVALIDATED_LONG", cfg.stop_invalidation_minutes),
        ];
        let reasons: Vec<String> = pick.iter().map(|&i| table[i].0.to_string()).collect();
        let expected = pick.iter().map(|&i| table[i].1).max();
        prop_assert_eq!(resolve_reentry_lock_minutes(&reasons, &cfg), expected);
    }
}

// ── 3. Slippage ──────────────────────────────────────────────────────

proptest! {
    /// Fills never improve on the stressed quote, whatever the conditions.
    #[test]
    fn slippage_is_always_adverse(
        mid in arb_price(),
        spread in arb_spread(),
        side in arb_side(),
        event_risk in arb_event_risk(),
        shock in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap();
        let mut quote = Quote::new(ts, mid - spread / 2.0, mid + spread / 2.0);
        quote.event_risk = event_risk;
        quote.shock = shock;
        let stressed = StressModel::default().apply(&quote).unwrap();

        let model = SlippageModel::default();
        let mut rng = StdRng::seed_from_u64(seed);
        for intent in [FillIntent::Entry, FillIntent::Exit] {
            let price = model.fill_price(&stressed, side, intent, &mut rng);
            let buying = matches!(
                (side, intent),
                (Side::Buy, FillIntent::Entry) | (Side::Sell, FillIntent::Exit)
            );
            if buying {
                prop_assert!(price >= stressed.ask);
            } else {
                prop_assert!(price <= stressed.bid);
            }
        }
    }

    /// The same seed reproduces the same fill bit-for-bit.
    #[test]
    fn slippage_is_seed_deterministic(
        mid in arb_price(),
        spread in arb_spread(),
        side in arb_side(),
        seed in any::<u64>(),
    ) {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap();
        let quote = Quote::new(ts, mid - spread / 2.0, mid + spread / 2.0);
        let stressed = StressModel::default().apply(&quote).unwrap();
        let model = SlippageModel::default();

        let mut a = StdRng::seed_from_u64(seed);
        let mut b = StdRng::seed_from_u64(seed);
        prop_assert_eq!(
            model.fill_price(&stressed, side, FillIntent::Entry, &mut a),
            model.fill_price(&stressed, side, FillIntent::Entry, &mut b)
        );
    }
}

// ── 4. Stress ────────────────────────────────────────────────────────

proptest! {
    /// Stress preserves the midpoint and can only widen the spread, even
    /// with a sub-unity custom multiplier trying to narrow it.
    #[test]
    fn stress_preserves_mid_and_never_narrows(
        mid in arb_price(),
        spread in arb_spread(),
        event_risk in arb_event_risk(),
        custom in proptest::option::of(0.1..5.0_f64),
        hour in 0_u32..24,
        minute in 0_u32..60,
    ) {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, hour, minute, 0).unwrap();
        let mut quote = Quote::new(ts, mid - spread / 2.0, mid + spread / 2.0);
        quote.event_risk = event_risk;
        quote.spread_multiplier = custom;

        let stressed = StressModel::default().apply(&quote).unwrap();
        prop_assert!((stressed.mid() - quote.mid()).abs() < 1e-12);
        prop_assert!(stressed.spread() >= quote.spread() - 1e-15);
        // Tags only appear when a factor actually bit.
        if stressed.stress_reasons.is_empty() {
            prop_assert!((stressed.spread() - quote.spread()).abs() < 1e-15);
        }
    }
}
