//! Reference tables (brands, tariffs, EAN prefixes) loaded once at startup.
//!
//! The built-in tables are compiled into the binary from `data/*.toml`.
//! Any of them can be replaced by a file named in the config, which is how
//! tests and deployments substitute their own fixtures.

use crate::origin::barcode::EanPrefixTable;
use crate::origin::brands::BrandTable;
use crate::tariff::TariffTable;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const BUILTIN_BRANDS: &str = include_str!("../data/brands.toml");
const BUILTIN_TARIFFS: &str = include_str!("../data/tariffs.toml");
const BUILTIN_EAN_PREFIXES: &str = include_str!("../data/ean_prefixes.toml");

/// Optional file overrides for the reference tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPaths {
    /// Replacement brand table
    #[serde(default)]
    pub brands: Option<PathBuf>,

    /// Replacement tariff table
    #[serde(default)]
    pub tariffs: Option<PathBuf>,

    /// Replacement EAN prefix table
    #[serde(default)]
    pub ean_prefixes: Option<PathBuf>,
}

/// All immutable lookup tables used by the resolver and rate lookup.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub brands: Arc<BrandTable>,
    pub tariffs: Arc<TariffTable>,
    pub ean_prefixes: Arc<EanPrefixTable>,
}

impl ReferenceData {
    /// Loads the tables compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::load(&DataPaths::default())
    }

    /// Loads each table from its override path, or the built-in copy.
    pub fn load(paths: &DataPaths) -> Result<Self> {
        let brands: BrandTable = load_table(paths.brands.as_deref(), BUILTIN_BRANDS, "brands")?;
        let tariffs: TariffTable =
            load_table(paths.tariffs.as_deref(), BUILTIN_TARIFFS, "tariffs")?;
        let ean_prefixes: EanPrefixTable =
            load_table(paths.ean_prefixes.as_deref(), BUILTIN_EAN_PREFIXES, "ean_prefixes")?;

        debug!(
            "Reference data: {} brands, {} tariff codes, {} EAN prefix ranges",
            brands.len(),
            tariffs.len(),
            ean_prefixes.len()
        );

        Ok(Self {
            brands: Arc::new(brands),
            tariffs: Arc::new(tariffs),
            ean_prefixes: Arc::new(ean_prefixes),
        })
    }
}

fn load_table<T: DeserializeOwned>(path: Option<&Path>, builtin: &str, name: &str) -> Result<T> {
    match path {
        Some(path) => {
            debug!("Loading {} table from: {}", name, path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {} table: {}", name, path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse {} table: {}", name, path.display()))
        }
        None => toml::from_str(builtin)
            .with_context(|| format!("Built-in {} table is invalid", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_tables_parse() {
        let data = ReferenceData::builtin().unwrap();
        assert!(data.brands.len() > 50);
        assert_eq!(data.tariffs.len(), 6);
        assert!(!data.ean_prefixes.is_empty());
    }

    #[test]
    fn test_override_tariffs() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[tariff]]
            code = "847130"
            rate = 0.0
            label = "Laptops"
            "#
        )
        .unwrap();

        let paths = DataPaths { tariffs: Some(file.path().to_path_buf()), ..Default::default() };
        let data = ReferenceData::load(&paths).unwrap();
        assert_eq!(data.tariffs.len(), 1);
        assert_eq!(data.tariffs.best_prefix("8471300000"), "847130");
        // Other tables keep their built-in copies
        assert!(data.brands.len() > 50);
    }

    #[test]
    fn test_override_missing_file() {
        let paths = DataPaths {
            brands: Some(PathBuf::from("/nonexistent/brands.toml")),
            ..Default::default()
        };
        let err = ReferenceData::load(&paths).unwrap_err().to_string();
        assert!(err.contains("Failed to read brands table"));
    }

    #[test]
    fn test_override_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[[prefix]\nbroken").unwrap();

        let paths =
            DataPaths { ean_prefixes: Some(file.path().to_path_buf()), ..Default::default() };
        let err = ReferenceData::load(&paths).unwrap_err().to_string();
        assert!(err.contains("Failed to parse ean_prefixes table"));
    }
}
