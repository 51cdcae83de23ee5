//! CSS selectors for Amazon product pages.
//!
//! Amazon reshuffles its markup often. When a field stops scraping, save the
//! page under `tests/fixtures/`, fix the selector here and assert on the
//! fixture in `tests/scraper_integration.rs`.

use scraper::Selector;
use std::sync::LazyLock;

/// Selectors for individual product pages.
pub mod product {
    use super::*;

    /// Product title.
    pub static TITLE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "#productTitle, \
             #title span, \
             .product-title-word-break",
        )
        .unwrap()
    });

    /// Brand byline ("Visit the LEGO Store", "Brand: LEGO").
    pub static BRAND: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "#bylineInfo, \
             .po-brand .po-break-word",
        )
        .unwrap()
    });

    /// Category breadcrumb links.
    pub static BREADCRUMBS: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("#wayfinding-breadcrumbs_feature_div a").unwrap());

    /// "About this item" bullet points.
    pub static BULLETS: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("#feature-bullets li").unwrap());

    /// Main product image.
    pub static IMAGE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "#landingImage, \
             #imgTagWrapperId img",
        )
        .unwrap()
    });

    /// Hidden ASIN input.
    pub static ASIN: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("input#ASIN, input[name='ASIN']").unwrap());

    /// Product detail tables, where EAN/UPC rows usually live.
    pub static DETAILS: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "#productDetails_techSpec_section_1, \
             #productDetails_detailBullets_sections1, \
             #detailBullets_feature_div",
        )
        .unwrap()
    });
}

/// Selectors for detecting error/captcha pages.
pub mod errors {
    use super::*;

    /// CAPTCHA form.
    pub static CAPTCHA: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "form[action*='validateCaptcha'], \
             img[src*='captcha']",
        )
        .unwrap()
    });

    /// Dog page (Amazon's error page).
    pub static DOG_PAGE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "img[alt*='dog'], \
             .a-box-inner a[href='/ref=cs_503_link']",
        )
        .unwrap()
    });
}
