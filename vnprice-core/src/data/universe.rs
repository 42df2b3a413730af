//! Universe configuration: industry-organized ticker lists.
//!
//! A universe is a TOML file mapping an industry name to its member tickers.
//! The industry is carried through to the summary table.

use crate::domain::{TickerError, TickerSymbol};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("industry '{industry}': {source}")]
    Ticker {
        industry: String,
        source: TickerError,
    },
}

/// The complete universe configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    /// Every ticker across all industries, validated, first occurrence kept.
    pub fn tickers(&self) -> Result<Vec<TickerSymbol>, UniverseError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (industry, tickers) in &self.sectors {
            for raw in tickers {
                let ticker = TickerSymbol::new(raw).map_err(|source| UniverseError::Ticker {
                    industry: industry.clone(),
                    source,
                })?;
                if seen.insert(ticker.clone()) {
                    out.push(ticker);
                }
            }
        }
        Ok(out)
    }

    /// Industry a ticker belongs to, if listed.
    pub fn industry_of(&self, ticker: &TickerSymbol) -> Option<&str> {
        self.sectors
            .iter()
            .find(|(_, tickers)| tickers.iter().any(|t| t.trim() == ticker.as_str()))
            .map(|(name, _)| name.as_str())
    }

    /// Tickers for a specific industry.
    pub fn sector_tickers(&self, sector: &str) -> Option<&[String]> {
        self.sectors.get(sector).map(|v| v.as_slice())
    }

    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.keys().map(|s| s.as_str()).collect()
    }

    pub fn ticker_count(&self) -> usize {
        self.sectors.values().map(|v| v.len()).sum()
    }

    /// A default universe of large HOSE listings grouped by industry.
    pub fn default_vn() -> Self {
        let mut sectors = BTreeMap::new();
        let mut add = |name: &str, tickers: &[&str]| {
            sectors.insert(
                name.to_string(),
                tickers.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            );
        };

        add("Banking", &["VCB", "BID", "CTG", "TCB", "MBB", "VPB", "ACB"]);
        add("Real Estate", &["VIC", "VHM", "VRE", "NVL", "KDH"]);
        add("Consumer", &["VNM", "MSN", "SAB", "MWG", "PNJ"]);
        add("Industrials", &["HPG", "GEX", "REE"]);
        add("Energy & Utilities", &["GAS", "PLX", "POW"]);
        add("Technology", &["FPT", "CMG"]);
        add("Securities", &["SSI", "VND", "HCM"]);

        Self { sectors }
    }

    /// Serialize the universe to TOML.
    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
