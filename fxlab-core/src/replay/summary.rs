//! Headline statistics computed from a finished replay's books.

use serde::{Deserialize, Serialize};

use crate::domain::equity::{max_drawdown_pct, EquityPoint};
use crate::domain::{Ledger, Timeline, TimelineKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub realized_pnl: f64,
    pub return_pct: f64,
    /// Fraction of closed legs (partials included) with positive PnL;
    /// absent when nothing closed.
    pub win_rate: Option<f64>,
    pub max_drawdown_pct: f64,
    pub rollover_fees: f64,
    pub ticks: usize,
    pub closed_legs: usize,
    pub blocked_entries: usize,
}

impl ReplaySummary {
    pub fn compute(
        initial_equity: f64,
        final_equity: f64,
        realized_pnl: f64,
        rollover_fees: f64,
        ticks: usize,
        ledger: &Ledger,
        timeline: &Timeline,
        curve: &[EquityPoint],
    ) -> Self {
        let closed_legs = ledger.closed_legs().count();
        let wins = ledger.closed_legs().filter(|r| r.pnl > 0.0).count();
        let win_rate = (closed_legs > 0).then(|| wins as f64 / closed_legs as f64);
        let return_pct = if initial_equity > 0.0 {
            (final_equity - initial_equity) / initial_equity * 100.0
        } else {
            0.0
        };
        Self {
            initial_equity,
            final_equity,
            realized_pnl,
            return_pct,
            win_rate,
            max_drawdown_pct: max_drawdown_pct(curve),
            rollover_fees,
            ticks,
            closed_legs,
            blocked_entries: timeline.count(TimelineKind::EntryBlocked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LedgerKind, Side};
    use chrono::{TimeZone, Utc};

    #[test]
    fn win_rate_counts_partials_and_exits() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let mut ledger = Ledger::new();
        ledger.append(ts, LedgerKind::Entry, Side::Buy, 1.1, 1.0, 0.0, 0.0, vec![], 1.0, 100.0);
        ledger.append(ts, LedgerKind::PartialExit, Side::Buy, 1.2, 0.5, 5.0, 0.0, vec![], 0.5, 105.0);
        ledger.append(ts, LedgerKind::Exit, Side::Buy, 1.0, 0.5, -5.0, 0.0, vec![], 0.0, 100.0);

        let summary = ReplaySummary::compute(
            100.0,
            100.0,
            0.0,
            0.0,
            10,
            &ledger,
            &Timeline::new(),
            &[],
        );
        assert_eq!(summary.closed_legs, 2);
        assert_eq!(summary.win_rate, Some(0.5));
        assert_eq!(summary.return_pct, 0.0);
    }

    #[test]
    fn no_closed_legs_means_no_win_rate() {
        let summary = ReplaySummary::compute(
            100.0,
            100.0,
            0.0,
            0.0,
            0,
            &Ledger::new(),
            &Timeline::new(),
            &[],
        );
        assert_eq!(summary.win_rate, None);
    }
}
