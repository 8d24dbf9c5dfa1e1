//! Equity curve points and drawdown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One mark-to-market observation, produced once per tick whether or not a
/// position is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: DateTime<Utc>,
    /// Realized equity plus current unrealized PnL.
    pub equity: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}

/// Peak-to-trough maximum drawdown as a percentage of the peak.
///
/// Returns 0.0 for curves shorter than two points or with no decline.
pub fn max_drawdown_pct(curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for point in curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > 0.0 {
            let dd = (peak - point.equity) / peak * 100.0;
            if dd > worst {
                worst = dd;
            }
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        let base = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                ts: base + chrono::Duration::minutes(i as i64),
                equity,
                realized_pnl: 0.0,
                unrealized_pnl: 0.0,
            })
            .collect()
    }

    #[test]
    fn flat_curve_has_zero_drawdown() {
        assert_eq!(max_drawdown_pct(&curve(&[100.0, 100.0, 100.0])), 0.0);
    }

    #[test]
    fn computes_peak_to_trough() {
        // Peak 120, trough 90: 25% drawdown.
        let dd = max_drawdown_pct(&curve(&[100.0, 120.0, 90.0, 110.0]));
        assert!((dd - 25.0).abs() < 1e-9);
    }

    #[test]
    fn later_deeper_trough_wins() {
        let dd = max_drawdown_pct(&curve(&[100.0, 95.0, 110.0, 77.0]));
        assert!((dd - 30.0).abs() < 1e-9);
    }
}
