//! Ticker symbols.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque identifier of a tradable instrument (e.g. `VCB`, `FPT`).
///
/// The core assumes no internal structure beyond "non-empty". Surrounding
/// whitespace is trimmed so list files with stray spaces still resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerSymbol(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TickerError {
    #[error("ticker symbol is empty")]
    Empty,
}

impl TickerSymbol {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, TickerError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TickerError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TickerSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for TickerSymbol {
    type Err = TickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Parse a list of raw symbols, failing on the first empty one.
pub fn parse_tickers<I, S>(raw: I) -> Result<Vec<TickerSymbol>, TickerError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(TickerSymbol::new).collect()
}
