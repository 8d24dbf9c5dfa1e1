//! FXLab Core — leveraged FX position lifecycle engine and replay driver.
//!
//! This crate contains the heart of the system:
//! - Domain types (pairs, quotes, positions, ledger, timeline, equity)
//! - Spread stress model with reason-tagged multiplicative penalties
//! - Seeded, always-adverse slippage and the BLAKE3 RNG hierarchy
//! - Admission gates (market hours, economic events, pair eligibility)
//! - Risk & exposure budget with portfolio/pair/currency ceilings
//! - Reentry locks with max-merge semantics
//! - Per-pair position state machine with a fixed management priority ladder
//! - Deterministic offline replay over scripted fixtures

pub mod broker;
pub mod domain;
pub mod engine;
pub mod gates;
pub mod locks;
pub mod reason;
pub mod replay;
pub mod risk;
pub mod rng;
pub mod signal;
pub mod slippage;
pub mod store;
pub mod stress;
