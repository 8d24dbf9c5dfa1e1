//! Position lifecycle engine: configuration and the per-pair state machine.

mod config;
mod lifecycle;

pub use config::{EngineConfig, PreRolloverConfig, PreRolloverMode, TimeStopConfig};
pub use lifecycle::{ManagementAction, PositionEngine};
