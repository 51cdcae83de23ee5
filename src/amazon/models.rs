//! Data model for a scraped Amazon product page.

use serde::{Deserialize, Serialize};

/// Product attributes read from one page visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Amazon Standard Identification Number
    #[serde(default)]
    pub asin: String,
    /// Product title
    #[serde(default)]
    pub title: String,
    /// Brand / byline text, already stripped of "Visit the ... Store"
    #[serde(default)]
    pub brand: String,
    /// Category breadcrumb trail
    #[serde(default)]
    pub breadcrumbs: Vec<String>,
    /// "About this item" bullet points
    #[serde(default)]
    pub bullets: Vec<String>,
    /// Main image, only captured when the text description is thin
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// EAN-13 barcode digits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ean: Option<String>,
    /// UPC-A barcode digits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upc: Option<String>,
    /// Page URL
    #[serde(default)]
    pub url: String,
}

impl Product {
    /// True when the title has at most three words or there is at most one
    /// bullet, i.e. the text alone is unlikely to classify well.
    pub fn has_limited_description(&self) -> bool {
        self.title.split_whitespace().count() <= 3 || self.bullets.len() <= 1
    }

    /// Returns true if a barcode was found on the page.
    pub fn has_barcode(&self) -> bool {
        self.ean.is_some() || self.upc.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_product(title: &str, bullets: usize) -> Product {
        Product {
            asin: "B0BBSFBN5Y".to_string(),
            title: title.to_string(),
            bullets: (0..bullets).map(|i| format!("Bullet {}", i)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_limited_description_short_title() {
        assert!(make_product("Dice Set", 5).has_limited_description());
        assert!(make_product("", 5).has_limited_description());
    }

    #[test]
    fn test_limited_description_few_bullets() {
        assert!(make_product("LEGO Star Wars Millennium Falcon Building Set", 1)
            .has_limited_description());
    }

    #[test]
    fn test_rich_description() {
        assert!(!make_product("LEGO Star Wars Millennium Falcon Building Set", 4)
            .has_limited_description());
    }

    #[test]
    fn test_serde_field_names() {
        let product = Product {
            image_url: Some("https://example.com/a.jpg".to_string()),
            ean: Some("5702017155555".to_string()),
            ..make_product("LEGO Set", 0)
        };
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["imageUrl"], "https://example.com/a.jpg");
        assert_eq!(json["ean"], "5702017155555");
        assert!(json.get("upc").is_none());
        assert!(product.has_barcode());
    }
}
