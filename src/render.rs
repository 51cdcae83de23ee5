//! Output rendering for duty reports (HTML panel, JSON, text table).

use crate::amazon::Product;
use crate::api::{DutyReport, OriginEstimate, OriginResponse};
use crate::config::OutputFormat;
use serde_json::json;

const MISSING: &str = "—";

/// Visual rank of an origin estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Primary,
    Secondary,
    Other,
}

impl Rank {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Rank::Primary,
            1 => Rank::Secondary,
            _ => Rank::Other,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Rank::Primary => "Primary",
            Rank::Secondary => "Secondary",
            Rank::Other => "Additional",
        }
    }

    fn class(&self) -> &'static str {
        match self {
            Rank::Primary => "origin-primary",
            Rank::Secondary => "origin-secondary",
            Rank::Other => "origin-other",
        }
    }

    /// (background, border, text) colours.
    fn colours(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            Rank::Primary => ("#e8f5e8", "#28a745", "#155724"),
            Rank::Secondary => ("#f0f8ff", "#007bff", "#004085"),
            Rank::Other => ("#f0f8ff", "#6c757d", "#495057"),
        }
    }
}

/// Escapes text for interpolation into HTML, quotes included.
pub fn escape_html(text: &str) -> String {
    html_escape::encode_quoted_attribute(text).into_owned()
}

fn percent(confidence: f64) -> i64 {
    (confidence * 100.0).round() as i64
}

fn code_or_missing(code: &str) -> &str {
    if code.trim().is_empty() {
        MISSING
    } else {
        code
    }
}

/// Formats reports for output.
pub struct Renderer {
    format: OutputFormat,
}

impl Renderer {
    /// Creates a new renderer.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Renders a full classify-and-rate report.
    pub fn render_report(&self, product: &Product, report: &DutyReport) -> String {
        match self.format {
            OutputFormat::Html => self.html_report(report),
            OutputFormat::Json => {
                let mut value = serde_json::to_value(report).unwrap_or_else(|_| json!({}));
                if let Some(object) = value.as_object_mut() {
                    object.insert("product".to_string(), json!(product));
                }
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
            }
            OutputFormat::Table => self.table_report(product, report),
        }
    }

    /// Renders an origin-only lookup.
    pub fn render_origin(&self, product: &Product, origin: &OriginResponse) -> String {
        match self.format {
            OutputFormat::Html => format!(
                r#"<div style="font-family: system-ui; border:1px solid #ddd; border-radius:10px; padding:12px;">{}</div>"#,
                self.html_origin(origin)
            ),
            OutputFormat::Json => serde_json::to_string_pretty(&json!({
                "product": product,
                "origin": origin,
            }))
            .unwrap_or_else(|_| "{}".to_string()),
            OutputFormat::Table => {
                let mut lines = product_lines(product);
                lines.push(String::new());
                lines.extend(table_origin(origin));
                lines.join("\n")
            }
        }
    }

    // HTML formatting

    fn html_report(&self, report: &DutyReport) -> String {
        let rate = &report.rate;
        let error = report
            .error
            .as_deref()
            .map(|e| format!(r#"<div class="duty-error" style="color:#b00020;">{}</div>"#, escape_html(e)))
            .unwrap_or_default();
        let origin = report.origin.as_ref().map(|o| self.html_origin(o)).unwrap_or_default();

        format!(
            r#"<div style="font-family: system-ui; border:1px solid #ddd; border-radius:10px; padding:12px;">
  <div style="font-weight:600; margin-bottom:4px;">Estimated UK Duty</div>
  <div>HS: {} ({}% conf.)</div>
  <div>Rate: {:.1}%</div>
  <small>Source: {}</small>
  {}{}
</div>"#,
            escape_html(code_or_missing(&rate.chosen.hs_code)),
            percent(rate.chosen.confidence),
            rate.duty_rate * 100.0,
            escape_html(if rate.source.is_empty() { "local table" } else { &rate.source }),
            error,
            origin
        )
    }

    fn html_origin(&self, origin: &OriginResponse) -> String {
        if origin.countries.is_empty() {
            return match &origin.error {
                Some(e) => format!(
                    r#"<div class="origin-error" style="margin-top:12px; color:#b00020;">{}</div>"#,
                    escape_html(e)
                ),
                None => String::new(),
            };
        }

        let breakdown: String =
            origin.countries.iter().enumerate().map(|(i, c)| html_estimate(Rank::from_index(i), c)).collect();

        let source = origin
            .primary()
            .and_then(|c| c.sources.first())
            .map(String::as_str)
            .unwrap_or("analysis");

        let barcodes = origin
            .ean_upc_info
            .as_ref()
            .map(|info| {
                let parts: Vec<String> = [("EAN", &info.ean), ("UPC", &info.upc)]
                    .iter()
                    .filter_map(|(name, code)| {
                        code.as_deref().map(|c| format!("{}: {}", name, escape_html(c)))
                    })
                    .collect();
                parts.join(" | ")
            })
            .filter(|line| !line.is_empty())
            .map(|line| {
                format!(r#"<div style="margin-top:4px; font-size:0.9em; color:#666;">{}</div>"#, line)
            })
            .unwrap_or_default();

        let explanation = origin
            .analysis_explanation
            .as_deref()
            .map(|text| {
                format!(
                    r#"<div style="margin-top:8px; padding:8px; background:#f8f9fa; border-radius:6px; font-size:0.85em; color:#555;"><strong>Analysis:</strong> {}</div>"#,
                    escape_html(text)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<div style="margin-top:12px; padding-top:12px; border-top:1px solid #eee;">
    <div style="font-weight:600; margin-bottom:4px;">Country of Origin</div>
    {}<small>Source: {}</small>{}{}
  </div>"#,
            breakdown,
            escape_html(source),
            barcodes,
            explanation
        )
    }

    // Table formatting

    fn table_report(&self, product: &Product, report: &DutyReport) -> String {
        let rate = &report.rate;
        let mut lines = product_lines(product);
        lines.push(String::new());

        lines.push(format!(
            "HS code: {} ({}% conf.)",
            code_or_missing(&rate.chosen.hs_code),
            percent(rate.chosen.confidence)
        ));
        lines.push(format!("Rate:    {:.1}%", rate.duty_rate * 100.0));
        lines.push(format!("Source:  {}", rate.source));
        if !rate.notes.is_empty() {
            lines.push(format!("Notes:   {}", rate.notes));
        }
        if let Some(error) = &report.error {
            lines.push(format!("Error:   {}", error));
        }

        if let Some(origin) = &report.origin {
            lines.push(String::new());
            lines.extend(table_origin(origin));
        }

        lines.join("\n")
    }
}

fn html_estimate(rank: Rank, estimate: &OriginEstimate) -> String {
    let (background, border, text) = rank.colours();
    let reasoning = if estimate.reasoning.is_empty() {
        format!("{} manufacturing location", rank.label())
    } else {
        estimate.reasoning.clone()
    };

    format!(
        r#"<div class="{}" style="margin-bottom:8px; padding:8px; background:{}; border-radius:6px; border-left:4px solid {};">
      <div style="font-weight:600; color:{};">{} ({}% confidence)</div>
      <div style="font-size:0.85em; color:{}; margin-top:2px;">{}</div>
    </div>"#,
        rank.class(),
        background,
        border,
        text,
        escape_html(&estimate.country),
        percent(estimate.confidence),
        text,
        escape_html(&reasoning)
    )
}

fn product_lines(product: &Product) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("ASIN:    {}", if product.asin.is_empty() { MISSING } else { &product.asin }));
    lines.push(format!("Title:   {}", product.title));
    if !product.brand.is_empty() {
        lines.push(format!("Brand:   {}", product.brand));
    }
    if let Some(ean) = &product.ean {
        lines.push(format!("EAN:     {}", ean));
    }
    if let Some(upc) = &product.upc {
        lines.push(format!("UPC:     {}", upc));
    }
    if !product.url.is_empty() {
        lines.push(format!("URL:     {}", product.url));
    }
    lines
}

fn table_origin(origin: &OriginResponse) -> Vec<String> {
    let country_width = 20;
    let mut lines = vec!["Country of origin:".to_string()];

    if let Some(error) = &origin.error {
        lines.push(format!("  Error: {}", error));
    }

    for (i, estimate) in origin.countries.iter().enumerate() {
        lines.push(format!(
            "  {:<9}  {:<country_width$}  {:>3}%  {}",
            Rank::from_index(i).label(),
            estimate.country,
            percent(estimate.confidence),
            estimate.reasoning
        ));
    }

    if let Some(method) = &origin.analysis_method {
        lines.push(format!("  Method: {}", method));
    }
    if !origin.notes.is_empty() {
        lines.push(format!("  Notes:  {}", origin.notes));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BarcodeInfo, ChosenCode, RateResponse};

    fn report() -> DutyReport {
        DutyReport {
            rate: RateResponse {
                chosen: ChosenCode { hs_code: "9503.00".to_string(), confidence: 0.874 },
                alternates: Vec::new(),
                duty_rate: 0.025,
                source: "UK_GT_local".to_string(),
                notes: "Matched 950300 (Toys)".to_string(),
            },
            origin: Some(OriginResponse {
                countries: vec![
                    OriginEstimate::new("Denmark", 0.85, "Known <b>maker</b>", "brand_mapping"),
                    OriginEstimate::new("Hungary", 0.10, "", "brand_mapping"),
                    OriginEstimate::new("China", 0.05, "r", "brand_mapping"),
                ],
                search_query: "LEGO brand origin".to_string(),
                ean_upc_info: Some(BarcodeInfo {
                    ean: Some("5702017155555".to_string()),
                    upc: None,
                    analysis_method: "EAN-13".to_string(),
                }),
                analysis_explanation: Some("Matched 'LEGO' & co".to_string()),
                ..Default::default()
            }),
            error: None,
        }
    }

    fn product() -> Product {
        Product {
            asin: "B0BBSFBN5Y".to_string(),
            title: "LEGO <Falcon>".to_string(),
            brand: "LEGO".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;");
    }

    #[test]
    fn test_html_panel() {
        let html = Renderer::new(OutputFormat::Html).render_report(&product(), &report());

        assert!(html.contains("Estimated UK Duty"));
        assert!(html.contains("HS: 9503.00 (87% conf.)"));
        assert!(html.contains("Rate: 2.5%"));
        assert!(html.contains("Source: UK_GT_local"));
        assert!(html.contains("Country of Origin"));
        assert!(html.contains("Denmark (85% confidence)"));
        assert!(html.contains(r#"class="origin-primary""#));
        assert!(html.contains(r#"class="origin-secondary""#));
        assert!(html.contains(r#"class="origin-other""#));
        assert!(html.contains("Secondary manufacturing location"));
        assert!(html.contains("EAN: 5702017155555"));
        assert!(!html.contains("UPC:"));
        assert!(html.contains("Matched &#x27;LEGO&#x27; &amp; co"));
        assert!(html.contains("Known &lt;b&gt;maker&lt;/b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_html_missing_data() {
        let html = Renderer::new(OutputFormat::Html)
            .render_report(&product(), &DutyReport::failed("Failed to fetch duty information"));

        assert!(html.contains("HS: — (0% conf.)"));
        assert!(html.contains("Rate: 0.0%"));
        assert!(html.contains("Source: error"));
        assert!(html.contains("Failed to fetch duty information"));
        assert!(!html.contains("Country of Origin"));
    }

    #[test]
    fn test_html_origin_only_error() {
        let origin = OriginResponse {
            error: Some("Failed to fetch origin information".to_string()),
            notes: "Error occurred during analysis".to_string(),
            ..Default::default()
        };
        let html = Renderer::new(OutputFormat::Html).render_origin(&product(), &origin);
        assert!(html.contains("Failed to fetch origin information"));
    }

    #[test]
    fn test_json_includes_product() {
        let out = Renderer::new(OutputFormat::Json).render_report(&product(), &report());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["product"]["asin"], "B0BBSFBN5Y");
        assert_eq!(value["duty_rate"], 0.025);
        assert_eq!(value["origin"]["countries"][0]["country"], "Denmark");
    }

    #[test]
    fn test_table() {
        let out = Renderer::new(OutputFormat::Table).render_report(&product(), &report());

        assert!(out.contains("ASIN:    B0BBSFBN5Y"));
        assert!(out.contains("HS code: 9503.00 (87% conf.)"));
        assert!(out.contains("Rate:    2.5%"));
        assert!(out.contains("Primary"));
        assert!(out.contains("Denmark"));
        assert!(out.contains(" 85%"));
    }

    #[test]
    fn test_rank_from_index() {
        assert_eq!(Rank::from_index(0), Rank::Primary);
        assert_eq!(Rank::from_index(1), Rank::Secondary);
        assert_eq!(Rank::from_index(7), Rank::Other);
    }
}
