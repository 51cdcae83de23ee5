//! Amazon-specific modules for page fetching, scraping, and data models.

pub mod client;
pub mod models;
pub mod parser;
pub mod regions;
pub mod selectors;

pub use client::{scrape_product, AmazonClient, ProductPages};
pub use models::Product;
pub use parser::Parser;
pub use regions::Region;
