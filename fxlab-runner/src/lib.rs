//! FXLab Runner — orchestration around the core engine.
//!
//! - Serializable run configuration with content-addressed run ids
//! - Live cycle worker pool with shared risk budget and broker mirroring
//! - Scenario matrices over seeds and severity axes
//! - Artifact export (ledger CSV, timeline JSON, equity JSON, summary JSON)

pub mod artifacts;
pub mod config;
pub mod cycle;
pub mod scenario;
