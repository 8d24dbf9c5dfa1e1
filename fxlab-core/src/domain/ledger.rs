//! Ledger — append-only record of everything that moved money.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerKind {
    Entry,
    PartialExit,
    Exit,
    RolloverFee,
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerKind::Entry => write!(f, "ENTRY"),
            LedgerKind::PartialExit => write!(f, "PARTIAL_EXIT"),
            LedgerKind::Exit => write!(f, "EXIT"),
            LedgerKind::RolloverFee => write!(f, "ROLLOVER_FEE"),
        }
    }
}

/// One money-moving event. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRow {
    pub id: u64,
    pub ts: DateTime<Utc>,
    pub kind: LedgerKind,
    pub side: Side,
    /// Execution price (mark midpoint for rollover fees).
    pub price: f64,
    /// Units transacted by this row (open units for fee rows).
    pub units: f64,
    pub notional: f64,
    /// Realized PnL for this row alone.
    pub pnl: f64,
    pub fee: f64,
    pub reasons: Vec<String>,
    pub open_units_after: f64,
    pub equity_after: f64,
}

/// Append-only ledger with monotonically increasing row ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    rows: Vec<LedgerRow>,
    next_id: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row, assigning the next id. Returns a borrow of the stored row.
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        ts: DateTime<Utc>,
        kind: LedgerKind,
        side: Side,
        price: f64,
        units: f64,
        pnl: f64,
        fee: f64,
        reasons: Vec<String>,
        open_units_after: f64,
        equity_after: f64,
    ) -> &LedgerRow {
        let row = LedgerRow {
            id: self.next_id,
            ts,
            kind,
            side,
            price,
            units,
            notional: price * units,
            pnl,
            fee,
            reasons,
            open_units_after,
            equity_after,
        };
        self.next_id += 1;
        self.rows.push(row);
        self.rows.last().expect("row just pushed")
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Closed legs: partial and full exits (the denominators of win rate).
    pub fn closed_legs(&self) -> impl Iterator<Item = &LedgerRow> {
        self.rows
            .iter()
            .filter(|r| matches!(r.kind, LedgerKind::Exit | LedgerKind::PartialExit))
    }
}
