//! Replay fixtures — scripted quote streams plus scripted entries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Pair, Quote, QuoteError};
use crate::signal::EntrySignal;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("fixture parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error("fixture for {0} has no quotes")]
    Empty(Pair),
}

/// A self-contained replay input: one pair, its quote stream, and the entry
/// signals the driver will feed the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFixture {
    pub pair: Pair,
    pub quotes: Vec<Quote>,
    #[serde(default)]
    pub entries: Vec<EntrySignal>,
}

impl ReplayFixture {
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let fixture: Self = serde_json::from_str(json)?;
        fixture.validate()?;
        Ok(fixture)
    }

    /// Fatal-input validation: quotes must be individually sane and the
    /// stream non-decreasing in time.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.quotes.is_empty() {
            return Err(ReplayError::Empty(self.pair.clone()));
        }
        let mut prev = None;
        for quote in &self.quotes {
            quote.validate()?;
            if let Some(prev) = prev {
                if quote.ts < prev {
                    return Err(QuoteError::OutOfOrder {
                        prev,
                        next: quote.ts,
                    }
                    .into());
                }
            }
            prev = Some(quote.ts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn fixture(quotes: Vec<Quote>) -> ReplayFixture {
        ReplayFixture {
            pair: Pair::new("EURUSD").unwrap(),
            quotes,
            entries: vec![],
        }
    }

    #[test]
    fn well_formed_fixture_validates() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let quotes = (0..3)
            .map(|i| Quote::new(t0 + Duration::minutes(i), 1.1000, 1.1002))
            .collect();
        assert!(fixture(quotes).validate().is_ok());
    }

    #[test]
    fn out_of_order_quotes_are_fatal() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let quotes = vec![
            Quote::new(t0 + Duration::minutes(1), 1.1000, 1.1002),
            Quote::new(t0, 1.1000, 1.1002),
        ];
        let err = fixture(quotes).validate().unwrap_err();
        assert!(matches!(err, ReplayError::Quote(QuoteError::OutOfOrder { .. })));
    }

    #[test]
    fn equal_timestamps_are_allowed() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let quotes = vec![
            Quote::new(t0, 1.1000, 1.1002),
            Quote::new(t0, 1.1001, 1.1003),
        ];
        assert!(fixture(quotes).validate().is_ok());
    }

    #[test]
    fn empty_fixture_is_refused() {
        assert!(matches!(
            fixture(vec![]).validate().unwrap_err(),
            ReplayError::Empty(_)
        ));
    }

    #[test]
    fn parses_mixed_timestamp_formats() {
        let fixture = ReplayFixture::from_json(
            r#"{
                "pair": "EURUSD",
                "quotes": [
                    {"ts": 1709647200000, "bid": 1.0999, "ask": 1.1001},
                    {"ts": "2024-03-05T14:01:00Z", "bid": 1.1000, "ask": 1.1002}
                ],
                "entries": [
                    {"ts": 1709647200000, "side": "BUY", "stopPrice": 1.095}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(fixture.quotes.len(), 2);
        assert_eq!(fixture.entries.len(), 1);
        assert_eq!(fixture.quotes[0].ts, fixture.entries[0].ts);
    }
}
