//! Broker adapter contract.
//!
//! The engine never talks to a broker in replay mode; the live cycle mirrors
//! engine decisions through this trait. Retries apply only to transient
//! failures, with capped attempts and exponential backoff, and must never
//! run inside the risk-budget critical section.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::{Pair, Side};

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("transient broker failure: {0}")]
    Transient(String),
    #[error("broker session expired")]
    SessionExpired,
    #[error("rate limited")]
    RateLimited,
    #[error("order rejected: {0}")]
    Rejected(String),
}

impl BrokerError {
    /// Transient errors are the only ones worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::Transient(_) | BrokerError::SessionExpired | BrokerError::RateLimited
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub pair: Pair,
    pub side: Side,
    pub units: f64,
    pub entry_price: f64,
}

pub trait Broker: Send + Sync {
    fn open_position(
        &self,
        pair: &Pair,
        side: Side,
        notional: f64,
        leverage: f64,
    ) -> Result<OrderAck, BrokerError>;

    /// `partial_pct` closes that percentage of the position; `None` closes
    /// it in full.
    fn close_position(
        &self,
        pair: &Pair,
        partial_pct: Option<f64>,
    ) -> Result<OrderAck, BrokerError>;

    fn list_open_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;
}

/// Capped retry-with-backoff for transient collaborator failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying transient errors with doubling backoff.
    /// Non-transient errors return immediately.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, BrokerError>,
    ) -> Result<T, BrokerError> {
        let mut backoff = self.base_backoff;
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    std::thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
