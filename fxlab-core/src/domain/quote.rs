//! Quote — one normalized bid/ask observation.
//!
//! The engine consumes quotes that an upstream feed has already normalized;
//! a crossed or non-positive quote is a fatal input error, never something
//! to paper over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scheduled-event risk tier stamped on a quote by the calendar layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventRisk {
    Medium,
    High,
}

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("crossed or zero-width quote at {ts}: bid {bid} >= ask {ask}")]
    Crossed {
        ts: DateTime<Utc>,
        bid: f64,
        ask: f64,
    },
    #[error("non-positive quote side at {ts}: bid {bid}, ask {ask}")]
    NonPositive {
        ts: DateTime<Utc>,
        bid: f64,
        ask: f64,
    },
    #[error("quote timestamps must be non-decreasing: {prev} followed by {next}")]
    OutOfOrder {
        prev: DateTime<Utc>,
        next: DateTime<Utc>,
    },
}

/// A raw bid/ask tick, plus the optional flags a replay fixture may attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(with = "flex_ts")]
    pub ts: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_risk: Option<EventRisk>,
    /// Externally supplied force-close code, preserved verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_close_reason_code: Option<String>,
    #[serde(default)]
    pub shock: bool,
    /// Explicit rollover-boundary marker (in addition to UTC day crossings).
    #[serde(default)]
    pub rollover: bool,
    /// Fixture-injected spread multiplier, applied after all model factors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Quote {
    pub fn new(ts: DateTime<Utc>, bid: f64, ask: f64) -> Self {
        Self {
            ts,
            bid,
            ask,
            event_risk: None,
            force_close_reason_code: None,
            shock: false,
            rollover: false,
            spread_multiplier: None,
            note: None,
        }
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.bid <= 0.0 || self.ask <= 0.0 {
            return Err(QuoteError::NonPositive {
                ts: self.ts,
                bid: self.bid,
                ask: self.ask,
            });
        }
        if self.bid >= self.ask {
            return Err(QuoteError::Crossed {
                ts: self.ts,
                bid: self.bid,
                ask: self.ask,
            });
        }
        Ok(())
    }
}

/// Serde adapter: timestamps accepted as epoch milliseconds or ISO-8601
/// strings, always serialized back as epoch milliseconds.
pub mod flex_ts {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MsOrIso {
        Ms(i64),
        Iso(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match MsOrIso::deserialize(deserializer)? {
            MsOrIso::Ms(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| de::Error::custom(format!("epoch millis out of range: {ms}"))),
            MsOrIso::Iso(s) => s
                .parse::<DateTime<Utc>>()
                .map_err(|e| de::Error::custom(format!("invalid timestamp '{s}': {e}"))),
        }
    }

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(ts.timestamp_millis())
    }
}
