//! Country hints from EAN-13 / UPC-A barcode prefixes.
//!
//! The GS1 prefix says where the *registering company* is, not where the
//! item was made, so these hints sit below the brand table in the cascade.

use serde::{Deserialize, Serialize};

/// Confidence for an EAN-13 prefix hit.
pub const EAN_CONFIDENCE: f64 = 0.85;

/// Confidence for a UPC-A hit.
pub const UPC_CONFIDENCE: f64 = 0.80;

/// Confidence for each side when both an EAN and a UPC resolve.
pub const SPLIT_CONFIDENCE: f64 = 0.50;

const UPC_COUNTRIES: [&str; 2] = ["United States", "Canada"];

/// An inclusive range of two-digit EAN prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EanPrefixEntry {
    pub from: String,
    pub to: String,
    pub countries: Vec<String>,
}

impl EanPrefixEntry {
    fn contains(&self, prefix: &str) -> bool {
        self.from.as_str() <= prefix && prefix <= self.to.as_str()
    }
}

/// Two-digit prefix range table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EanPrefixTable {
    #[serde(rename = "prefix", default)]
    entries: Vec<EanPrefixEntry>,
}

/// Countries implied by one barcode.
#[derive(Debug, Clone, PartialEq)]
pub struct BarcodeHint {
    pub countries: Vec<String>,
    pub confidence: f64,
    pub reasoning: String,
}

fn all_digits(code: &str, len: usize) -> bool {
    code.len() == len && code.bytes().all(|b| b.is_ascii_digit())
}

impl EanPrefixTable {
    pub fn new(entries: Vec<EanPrefixEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Countries registered under a two-digit prefix.
    pub fn countries_for(&self, prefix: &str) -> Option<&[String]> {
        self.entries.iter().find(|e| e.contains(prefix)).map(|e| e.countries.as_slice())
    }

    /// Reads the registration country from a 13-digit EAN.
    pub fn analyze_ean(&self, ean: &str) -> Option<BarcodeHint> {
        let ean = ean.trim();
        if !all_digits(ean, 13) {
            return None;
        }

        let prefix = &ean[..2];
        let countries = self.countries_for(prefix)?;

        Some(BarcodeHint {
            countries: countries.to_vec(),
            confidence: EAN_CONFIDENCE,
            reasoning: format!(
                "EAN-13 country code prefix '{}' indicates registration in {}",
                prefix,
                countries.join(", ")
            ),
        })
    }
}

/// Any 12-digit UPC-A is read as a US/Canada registration.
pub fn analyze_upc(upc: &str) -> Option<BarcodeHint> {
    let upc = upc.trim();
    if !all_digits(upc, 12) {
        return None;
    }

    let first = &upc[..1];
    Some(BarcodeHint {
        countries: UPC_COUNTRIES.iter().map(|c| c.to_string()).collect(),
        confidence: UPC_CONFIDENCE,
        reasoning: format!(
            "UPC-A code starting with '{}' typically indicates US/Canada registration",
            first
        ),
    })
}
