//! Domain types for FXLab.

pub mod equity;
pub mod ledger;
pub mod pair;
pub mod position;
pub mod quote;
pub mod timeline;

pub use equity::{max_drawdown_pct, EquityPoint};
pub use ledger::{Ledger, LedgerKind, LedgerRow};
pub use pair::{Pair, PairError};
pub use position::{Position, Side, TrailingMode};
pub use quote::{EventRisk, Quote, QuoteError};
pub use timeline::{Timeline, TimelineEvent, TimelineKind};
