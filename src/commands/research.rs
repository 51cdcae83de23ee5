//! Brand research command implementation.

use crate::config::{Config, OutputFormat};
use crate::llm::{ChatClient, TextGenerator};
use crate::research::{BrandResearch, BrandResearcher};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Asks the text model where a brand currently manufactures.
///
/// Results are cached by the command's researcher, so repeated lookups of
/// the same brand within one command's lifetime reuse the first answer.
pub struct ResearchCommand {
    config: Config,
    researcher: BrandResearcher,
}

impl ResearchCommand {
    /// Creates a research command backed by the configured completion endpoint.
    pub fn new(config: Config) -> Result<Self> {
        let client = ChatClient::new(&config.llm).context("Failed to create completion client")?;
        Ok(Self::with_generator(config, Arc::new(client)))
    }

    /// Creates a research command with a provided generator (for testing).
    pub fn with_generator(config: Config, generator: Arc<dyn TextGenerator>) -> Self {
        let researcher = BrandResearcher::new(generator, config.llm.model.clone());
        Self { config, researcher }
    }

    /// Researches a brand and returns formatted output.
    pub async fn execute(&self, brand: &str, product_type: Option<&str>) -> Result<String> {
        let brand = brand.trim();
        if brand.is_empty() {
            anyhow::bail!("Brand name must not be empty");
        }

        info!("Researching brand: {}", brand);
        let result = self.researcher.research(brand, product_type).await;

        Ok(match self.config.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&result).unwrap_or_else(|_| "{}".to_string())
            }
            OutputFormat::Table | OutputFormat::Html => format_table(brand, &result),
        })
    }
}

fn format_table(brand: &str, result: &BrandResearch) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Brand:  {}", brand));
    lines.push(format!("Method: {} ({})", result.analysis_method, result.ai_model));
    lines.push(String::new());

    for estimate in &result.countries {
        lines.push(format!(
            "  {:<20}  {:>3}%  {}",
            estimate.country,
            (estimate.confidence * 100.0).round() as i64,
            estimate.reasoning
        ));
        if let Some(facilities) = estimate.facilities.as_ref().filter(|f| !f.is_empty()) {
            lines.push(format!("  {:<20}  Facilities: {}", "", facilities.join(", ")));
        }
    }

    if !result.notes.is_empty() {
        lines.push(String::new());
        lines.push(format!("Notes:   {}", result.notes));
    }
    if !result.sources.is_empty() {
        lines.push(format!("Sources: {}", result.sources.join(", ")));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    const REPLY: &str = r#"{"countries": [
        {"country": "Japan", "confidence": 0.8, "reasoning": "Shizuoka plant", "sources": ["press"], "facilities": ["Shizuoka"]}
    ], "notes": "stable", "sources": ["company site"]}"#;

    fn command(format: OutputFormat, model: ScriptedModel) -> ResearchCommand {
        ResearchCommand::with_generator(Config { format, ..Default::default() }, Arc::new(model))
    }

    #[tokio::test]
    async fn test_research_table() {
        let cmd = command(OutputFormat::Table, ScriptedModel::replying(REPLY));
        let output = cmd.execute(" Tamiya ", None).await.unwrap();

        assert!(output.contains("Brand:  Tamiya"));
        assert!(output.contains("Method: AI_research (gpt-4o-mini)"));
        assert!(output.contains("Japan"));
        assert!(output.contains(" 80%"));
        assert!(output.contains("Facilities: Shizuoka"));
        assert!(output.contains("Sources: company site"));
    }

    #[tokio::test]
    async fn test_research_json() {
        let cmd = command(OutputFormat::Json, ScriptedModel::replying(REPLY));
        let output = cmd.execute("Tamiya", Some("kits")).await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["countries"][0]["country"], "Japan");
        assert_eq!(value["ai_model"], "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_research_upstream_failure_still_renders() {
        let cmd = command(OutputFormat::Table, ScriptedModel::failing());
        let output = cmd.execute("Tamiya", None).await.unwrap();
        assert!(output.contains("Research Required"));
    }

    #[tokio::test]
    async fn test_research_empty_brand() {
        let cmd = command(OutputFormat::Table, ScriptedModel::replying(REPLY));
        let err = cmd.execute("  ", None).await.unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[tokio::test]
    async fn test_repeated_research_uses_cache() {
        let model = Arc::new(ScriptedModel::replying(REPLY));
        let config = Config { format: OutputFormat::Json, ..Default::default() };
        let cmd = ResearchCommand::with_generator(config, model.clone());

        let first = cmd.execute("Tamiya", None).await.unwrap();
        let second = cmd.execute(" Tamiya ", None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(model.calls(), 1);
    }
}
