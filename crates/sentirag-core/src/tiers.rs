//! Ticker tiers: operator-defined priority groups that drive ingestion.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::{ConfigError, CoreError};

const TIER_NAMES: [&str; 4] = ["T0", "T1", "T2", "T3"];

const DEFAULT_T0: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "NVDA", "META", "NFLX", "DIS", "JPM",
];
const DEFAULT_T1: &[&str] = &[
    "BAC", "WMT", "V", "MA", "PG", "JNJ", "UNH", "HD", "PYPL", "ADBE",
];
const DEFAULT_T2: &[&str] = &[
    "CRM", "INTC", "AMD", "NKE", "SBUX", "COST", "TMO", "ABBV", "AVGO", "QCOM",
];
const DEFAULT_T3: &[&str] = &[
    "CSCO", "ORCL", "IBM", "TXN", "AMGN", "HON", "RTX", "LOW", "UPS", "CAT",
];

/// Mapping of tier name (`T0`..`T3`) to ticker symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerTiers {
    tiers: BTreeMap<String, Vec<String>>,
}

impl Default for TickerTiers {
    fn default() -> Self {
        let defaults = [DEFAULT_T0, DEFAULT_T1, DEFAULT_T2, DEFAULT_T3];
        let tiers = TIER_NAMES
            .iter()
            .zip(defaults)
            .map(|(name, tickers)| {
                (
                    (*name).to_string(),
                    tickers.iter().map(|t| (*t).to_string()).collect(),
                )
            })
            .collect();
        Self { tiers }
    }
}

impl TickerTiers {
    /// Parse the `TICKER_TIERS_JSON` value.
    ///
    /// An empty string or `{}` yields the defaults. Tiers missing from the
    /// JSON object keep their default tickers; extra tier names are kept as-is.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvVar`] if the JSON is malformed or a
    /// ticker symbol is invalid.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let mut tiers = Self::default();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "{}" {
            return Ok(tiers);
        }

        let invalid = |reason: String| ConfigError::InvalidEnvVar {
            var: "TICKER_TIERS_JSON".to_string(),
            reason,
        };

        let parsed: BTreeMap<String, Vec<String>> =
            serde_json::from_str(trimmed).map_err(|e| invalid(e.to_string()))?;

        for (tier, tickers) in parsed {
            if let Some(bad) = tickers.iter().find(|t| !is_valid_ticker(t)) {
                return Err(invalid(format!("invalid ticker '{bad}' in tier {tier}")));
            }
            tiers.tiers.insert(tier, tickers);
        }

        Ok(tiers)
    }

    /// Tickers configured for `tier`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTier`] if no such tier exists.
    pub fn tickers(&self, tier: &str) -> Result<&[String], CoreError> {
        self.tiers
            .get(tier)
            .map(Vec::as_slice)
            .ok_or_else(|| CoreError::UnknownTier {
                tier: tier.to_string(),
                valid: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Tier names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tiers.keys().map(String::as_str)
    }
}

/// Validate a ticker symbol such as `AAPL` or `BRK.B`.
#[must_use]
pub fn is_valid_ticker(ticker: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Z]{1,5}(\.[A-Z])?$").expect("static regex is valid"))
        .is_match(ticker)
}
