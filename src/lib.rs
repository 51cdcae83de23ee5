//! duty-finder - Import duty and country-of-origin estimates for Amazon products
//!
//! Scrapes a product page, classifies it to an HS code, quotes a duty rate
//! from a local tariff table and estimates where the product was made.

pub mod amazon;
pub mod api;
pub mod classify;
pub mod commands;
pub mod config;
pub mod data;
pub mod llm;
pub mod origin;
pub mod relay;
pub mod render;
pub mod research;
pub mod tariff;
pub mod worker;

pub use amazon::models::Product;
pub use amazon::regions::Region;
pub use api::{DutyReport, OriginEstimate, OriginResponse, RateResponse};
pub use config::Config;
pub use data::ReferenceData;
