//! Serve command implementation: runs the HTTP worker.

use crate::config::Config;
use crate::data::ReferenceData;
use crate::llm::ChatClient;
use crate::worker::{self, AppState};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Loads reference data and serves `/classify`, `/rate` and `/origin`.
pub struct ServeCommand {
    config: Config,
}

impl ServeCommand {
    /// Creates a new serve command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Builds the shared worker state from config.
    pub fn state(&self) -> Result<AppState> {
        let data = ReferenceData::load(&self.config.data).context("Failed to load reference data")?;

        if self.config.llm.api_key.is_none() {
            warn!("No API key configured; classification and model fallbacks will fail");
        }

        let chat = Arc::new(
            ChatClient::new(&self.config.llm).context("Failed to create completion client")?,
        );
        info!(
            "Using model {} (vision: {}) at {}",
            self.config.llm.model, self.config.llm.vision_model, self.config.llm.base_url
        );

        let state = AppState::new(&data, chat.clone(), chat, self.config.worker.baseline_rate);
        info!("Origin stages: {}", state.origin.names().join(" -> "));
        Ok(state)
    }

    /// Serves until the process exits.
    pub async fn execute(&self) -> Result<()> {
        let state = Arc::new(self.state()?);
        worker::serve(&self.config.worker.bind, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_state_from_defaults() {
        let state = ServeCommand::new(Config::default()).state().unwrap();
        assert_eq!(state.baseline_rate, 0.10);
        assert_eq!(state.origin.names(), vec!["brand_table", "barcode_prefix", "model"]);
    }

    #[test]
    fn test_state_bad_data_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml {{{{").unwrap();

        let mut config = Config::default();
        config.data.tariffs = Some(file.path().to_path_buf());

        let err = ServeCommand::new(config).state().err().unwrap();
        assert!(format!("{:#}", err).contains("Failed to load reference data"));
    }
}
