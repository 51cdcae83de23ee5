//! HTML scraper for Amazon product pages.

use crate::amazon::models::Product;
use crate::amazon::regions::Region;
use crate::amazon::selectors::{errors, product};
use anyhow::Result;
use regex_lite::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;
use tracing::{debug, trace};

static ASIN_IN_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:dp|gp/product)/([A-Z0-9]{10})").unwrap());

static LABELED_EAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bEAN\b[^0-9]{0,10}(\d{13})\b").unwrap());

static LABELED_UPC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bUPC\b[^0-9]{0,10}(\d{12})\b").unwrap());

static BARE_EAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{13})\b").unwrap());

static BARE_UPC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{12})\b").unwrap());

/// Scraper for Amazon product pages.
pub struct Parser {
    region: Region,
}

impl Parser {
    /// Creates a new parser for the given region.
    pub fn new(region: Region) -> Self {
        Self { region }
    }

    /// Scrapes a product page.
    ///
    /// A page whose title has not rendered yet yields a product with an
    /// empty title rather than an error, so callers can poll until it shows.
    /// Only CAPTCHA and error pages fail.
    pub fn parse_product_page(&self, html: &str, url: &str) -> Result<Product> {
        let document = Html::parse_document(html);

        // Check for error pages first
        self.check_for_errors(&document)?;

        let title = first_text(&document, &product::TITLE).unwrap_or_default();

        let brand = first_text(&document, &product::BRAND).map(|text| clean_byline(&text)).unwrap_or_default();

        let breadcrumbs = all_texts(&document, &product::BREADCRUMBS);
        let bullets = all_texts(&document, &product::BULLETS);

        let asin = self.parse_asin(&document, url);

        let details = document
            .select(&product::DETAILS)
            .map(|e| normalize_ws(&e.text().collect::<String>()))
            .collect::<Vec<_>>()
            .join(" ");
        let haystack =
            format!("{} {} {} {} {}", title, brand, bullets.join(" "), breadcrumbs.join(" "), details);
        let (ean, upc) = extract_barcodes(&haystack);

        let url = if url.is_empty() && !asin.is_empty() {
            self.region.product_url(&asin)
        } else {
            url.to_string()
        };

        let mut scraped = Product {
            asin,
            title,
            brand,
            breadcrumbs,
            bullets,
            image_url: None,
            ean,
            upc,
            url,
        };

        // The image is only worth sending when the text is too thin to classify
        if scraped.has_limited_description() {
            scraped.image_url = document.select(&product::IMAGE).next().and_then(|e| {
                e.value()
                    .attr("src")
                    .or_else(|| e.value().attr("data-old-hires"))
                    .filter(|src| !src.is_empty())
                    .map(String::from)
            });
            debug!("Limited description, image captured: {}", scraped.image_url.is_some());
        }

        trace!("Scraped product {:?}: {}", scraped.asin, scraped.title);
        Ok(scraped)
    }

    /// Checks for CAPTCHA, error pages, or rate limiting.
    fn check_for_errors(&self, document: &Html) -> Result<()> {
        if document.select(&errors::CAPTCHA).next().is_some() {
            anyhow::bail!(
                "CAPTCHA detected. Amazon is blocking requests. \
                Try using a proxy or waiting before retrying."
            );
        }

        if document.select(&errors::DOG_PAGE).next().is_some() {
            anyhow::bail!(
                "Amazon error page detected (503). \
                The service may be temporarily unavailable."
            );
        }

        Ok(())
    }

    /// Reads the ASIN from the hidden input, falling back to the URL.
    fn parse_asin(&self, document: &Html, url: &str) -> String {
        document
            .select(&product::ASIN)
            .next()
            .and_then(|e| e.value().attr("value"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| asin_from_url(url))
            .unwrap_or_default()
    }
}

/// Extracts a 10-character ASIN from a `/dp/` or `/gp/product/` URL.
pub fn asin_from_url(url: &str) -> Option<String> {
    ASIN_IN_URL.captures(url).map(|c| c[1].to_string())
}

/// Finds EAN-13 and UPC-A digits in free text.
///
/// A labeled match ("EAN: ...", "UPC ...") wins over a bare digit run.
pub fn extract_barcodes(text: &str) -> (Option<String>, Option<String>) {
    let ean = LABELED_EAN
        .captures(text)
        .or_else(|| BARE_EAN.captures(text))
        .map(|c| c[1].to_string());

    let upc = LABELED_UPC
        .captures(text)
        .or_else(|| BARE_UPC.captures(text))
        .map(|c| c[1].to_string());

    (ean, upc)
}

/// Strips byline decoration: "Visit the LEGO Store" / "Brand: LEGO" → "LEGO".
fn clean_byline(text: &str) -> String {
    text.trim()
        .trim_start_matches("Brand:")
        .trim_start_matches("Visit the")
        .trim_end_matches("Store")
        .trim()
        .to_string()
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef) -> String {
    normalize_ws(&element.text().collect::<String>())
}

fn first_text(document: &Html, selector: &scraper::Selector) -> Option<String> {
    document.select(selector).next().map(element_text).filter(|t| !t.is_empty())
}

fn all_texts(document: &Html, selector: &scraper::Selector) -> Vec<String> {
    document.select(selector).map(element_text).filter(|t| !t.is_empty()).collect()
}
