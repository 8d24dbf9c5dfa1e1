//! Deterministic offline replay: fixtures in, reports out.

mod driver;
mod fixture;
mod summary;

pub use driver::{ReplayConfig, ReplayDriver, ReplayReport};
pub use fixture::{ReplayError, ReplayFixture};
pub use summary::ReplaySummary;
