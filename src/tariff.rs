//! Duty rate lookup by commodity code prefix.

use crate::api::{ChosenCode, RateResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Source tag for a hit in the local tariff table.
pub const SOURCE_LOCAL: &str = "UK_GT_local";

/// Source tag for the baseline fallback.
pub const SOURCE_BASELINE: &str = "baseline";

/// Prefix lengths tried, most specific first.
const PREFIX_LENGTHS: [usize; 3] = [10, 8, 6];

/// A single tariff table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffEntry {
    /// 6, 8 or 10 digit code prefix
    pub code: String,
    /// Duty rate as a fraction (0.02 = 2%)
    pub rate: f64,
    /// Short description
    pub label: String,
}

/// Static commodity code → duty rate table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TariffTable {
    #[serde(rename = "tariff", default)]
    entries: Vec<TariffEntry>,
}

impl TariffTable {
    pub fn new(entries: Vec<TariffEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry stored under exactly this key.
    pub fn get(&self, code: &str) -> Option<&TariffEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    /// Finds the most specific table key matching the code.
    ///
    /// Non-digits are stripped, then the 10, 8 and 6 digit prefixes are tried
    /// in that order. Returns an empty string when nothing matches.
    pub fn best_prefix(&self, code: &str) -> String {
        let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();

        for len in PREFIX_LENGTHS {
            let candidate: String = digits.chars().take(len).collect();
            if candidate.is_empty() {
                continue;
            }
            if self.get(&candidate).is_some() {
                return candidate;
            }
        }

        String::new()
    }

    /// Quotes the duty for a code, falling back to the baseline rate.
    pub fn quote(&self, hs_code: &str, baseline_rate: f64) -> RateResponse {
        let key = self.best_prefix(hs_code);
        debug!("Best prefix match for {:?}: {:?}", hs_code, key);

        match self.get(&key) {
            Some(entry) => RateResponse {
                chosen: ChosenCode { hs_code: hs_code.to_string(), confidence: 1.0 },
                alternates: Vec::new(),
                duty_rate: entry.rate,
                source: SOURCE_LOCAL.to_string(),
                notes: format!("Matched {} ({})", key, entry.label),
            },
            None => RateResponse {
                chosen: ChosenCode { hs_code: hs_code.to_string(), confidence: 0.5 },
                alternates: Vec::new(),
                duty_rate: baseline_rate,
                source: SOURCE_BASELINE.to_string(),
                notes: "No table match; applied baseline".to_string(),
            },
        }
    }
}
