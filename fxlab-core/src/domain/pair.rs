//! Pair — a six-letter FX currency pair.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PairError {
    #[error("invalid pair '{0}': expected six letters like EURUSD or EUR/USD")]
    Invalid(String),
}

/// A currency pair, normalized to `BASEQUOTE` form (e.g. `EURUSD`).
///
/// The base and quote currencies feed the per-currency risk buckets: one
/// open EURUSD position consumes budget in both EUR and USD.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair(String);

impl Pair {
    pub fn new(raw: &str) -> Result<Self, PairError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if cleaned.len() != 6 {
            return Err(PairError::Invalid(raw.to_string()));
        }
        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base currency (first three letters).
    pub fn base(&self) -> &str {
        &self.0[..3]
    }

    /// Quote currency (last three letters).
    pub fn quote(&self) -> &str {
        &self.0[3..]
    }

    /// True if `currency` is either side of this pair.
    pub fn involves(&self, currency: &str) -> bool {
        self.base() == currency || self.quote() == currency
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Pair {
    type Error = PairError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Pair::new(&value)
    }
}

impl From<Pair> for String {
    fn from(pair: Pair) -> String {
        pair.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_slashed_forms() {
        assert_eq!(Pair::new("EURUSD").unwrap().as_str(), "EURUSD");
        assert_eq!(Pair::new("eur/usd").unwrap().as_str(), "EURUSD");
    }

    #[test]
    fn splits_currencies() {
        let pair = Pair::new("GBPJPY").unwrap();
        assert_eq!(pair.base(), "GBP");
        assert_eq!(pair.quote(), "JPY");
        assert!(pair.involves("GBP"));
        assert!(pair.involves("JPY"));
        assert!(!pair.involves("USD"));
    }

    #[test]
    fn rejects_malformed() {
        assert!(Pair::new("EURUS").is_err());
        assert!(Pair::new("EURUSDX").is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let pair = Pair::new("EURUSD").unwrap();
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "\"EURUSD\"");
        let back: Pair = serde_json::from_str("\"eur/usd\"").unwrap();
        assert_eq!(back, pair);
    }
}
