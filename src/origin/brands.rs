//! Brand → manufacturing countries table and brand name matching.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Tokens shorter than this never take part in token matching.
const MIN_TOKEN_LEN: usize = 3;

/// Filler words that would otherwise match half the table.
const STOP_TOKENS: &[&str] = &["the", "and", "inc", "ltd", "llc", "company"];

/// One curated brand row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandEntry {
    /// Canonical brand name
    pub name: String,
    /// Manufacturing countries, most likely first
    pub countries: Vec<String>,
    /// Abbreviations and alternate spellings
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// How a brand string was matched against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Alias,
    Token,
    Substring,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "direct",
            MatchKind::Alias => "alias",
            MatchKind::Token => "word",
            MatchKind::Substring => "substring",
        }
    }
}

/// Result of a successful brand lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct BrandMatch<'a> {
    pub entry: &'a BrandEntry,
    pub kind: MatchKind,
}

/// Ordered brand table. Iteration order decides ties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandTable {
    #[serde(rename = "brand", default)]
    entries: Vec<BrandEntry>,
}

/// Strips a leading `Brand:` label and surrounding whitespace.
pub fn clean_brand(brand: &str) -> &str {
    let trimmed = brand.trim();
    let has_label =
        trimmed.get(..6).is_some_and(|head| head.eq_ignore_ascii_case("brand:"));
    if has_label {
        trimmed[6..].trim()
    } else {
        trimmed
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN && !STOP_TOKENS.contains(t))
        .map(String::from)
        .collect()
}

impl BrandTable {
    pub fn new(entries: Vec<BrandEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a brand: exact name, then alias, then token overlap, then
    /// substring containment. Empty brands never match.
    pub fn find(&self, brand: &str) -> Option<BrandMatch<'_>> {
        let clean = clean_brand(brand);
        if clean.is_empty() {
            return None;
        }
        let lower = clean.to_lowercase();
        debug!("Looking up origin for brand {:?} among {} brands", clean, self.entries.len());

        if let Some(entry) = self.entries.iter().find(|e| e.name.to_lowercase() == lower) {
            return Some(BrandMatch { entry, kind: MatchKind::Exact });
        }

        if let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.aliases.iter().any(|alias| alias.to_lowercase() == lower))
        {
            trace!("Alias match: {} -> {}", clean, entry.name);
            return Some(BrandMatch { entry, kind: MatchKind::Alias });
        }

        let brand_tokens = tokens(&lower);
        if !brand_tokens.is_empty() {
            let hit = self.entries.iter().find(|e| {
                let known = tokens(&e.name);
                brand_tokens.iter().any(|word| {
                    known.iter().any(|k| word.contains(k.as_str()) || k.contains(word.as_str()))
                })
            });
            if let Some(entry) = hit {
                trace!("Word match: {} -> {}", clean, entry.name);
                return Some(BrandMatch { entry, kind: MatchKind::Token });
            }
        }

        let hit = self.entries.iter().find(|e| {
            let known = e.name.to_lowercase();
            lower.contains(&known) || known.contains(&lower)
        });
        if let Some(entry) = hit {
            trace!("Substring match: {} -> {}", clean, entry.name);
            return Some(BrandMatch { entry, kind: MatchKind::Substring });
        }

        debug!("No brand match for {:?}", clean);
        None
    }
}
