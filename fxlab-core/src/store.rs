//! Position-context persistence.
//!
//! Cross-cycle state (open position, reentry lock) is explicitly owned and
//! externally persisted per pair, loaded at cycle start and saved after any
//! mutation — never kept in ambient process-wide state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::domain::{Pair, Position};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt context for {pair}: {detail}")]
    Corrupt { pair: String, detail: String },
}

/// Everything a pair's state machine needs to resume across cycles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionContext {
    pub position: Option<Position>,
    pub lock_until: Option<DateTime<Utc>>,
}

pub trait PositionContextStore: Send + Sync {
    fn load(&self, pair: &Pair) -> Result<Option<PositionContext>, StoreError>;
    fn save(&self, pair: &Pair, ctx: &PositionContext) -> Result<(), StoreError>;
    fn clear(&self, pair: &Pair) -> Result<(), StoreError>;
}

/// In-memory store for tests and single-process runs.
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    contexts: Mutex<HashMap<Pair, PositionContext>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionContextStore for InMemoryContextStore {
    fn load(&self, pair: &Pair) -> Result<Option<PositionContext>, StoreError> {
        let contexts = self
            .contexts
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(contexts.get(pair).cloned())
    }

    fn save(&self, pair: &Pair, ctx: &PositionContext) -> Result<(), StoreError> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        contexts.insert(pair.clone(), ctx.clone());
        Ok(())
    }

    fn clear(&self, pair: &Pair) -> Result<(), StoreError> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        contexts.remove(pair);
        Ok(())
    }
}
