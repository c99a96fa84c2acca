//! Pure HTML field extraction.
//!
//! Every function here takes page HTML and returns plain data, so the
//! extractor's field logic is testable against fixtures. Selector lists
//! are ordered by reliability; the first hit wins.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// All scrape-time fields of a product page except the size table.
#[derive(Debug, Clone, Default)]
pub struct ProductFields {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub image_urls: Vec<String>,
    pub features: Vec<String>,
    pub current_price: Option<f64>,
    pub currency: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub available_sizes: Vec<String>,
}

/// Parse all product fields from page HTML.
#[must_use]
pub fn parse_product_fields(html: &str) -> ProductFields {
    let document = Html::parse_document(html);

    let (current_price, currency) = match extract_price(&document) {
        Some(price) => (Some(price), Some("EUR".to_string())),
        None => (None, None),
    };

    ProductFields {
        title: extract_title(&document),
        brand: extract_brand(&document),
        category: extract_category(&document),
        image_urls: extract_images(&document),
        features: extract_features(&document),
        current_price,
        currency,
        rating: extract_rating(&document),
        review_count: extract_review_count(&document),
        available_sizes: extract_available_sizes(&document),
    }
}

fn sel(pattern: &'static str, cell: &'static OnceLock<Selector>) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(pattern).expect("valid selector"))
}

fn text_of(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_title(document: &Html) -> Option<String> {
    static TITLE: OnceLock<Selector> = OnceLock::new();
    text_of(document, sel("#productTitle", &TITLE))
}

fn extract_brand(document: &Html) -> Option<String> {
    static BYLINE: OnceLock<Selector> = OnceLock::new();
    static PO_BRAND: OnceLock<Selector> = OnceLock::new();

    let raw = text_of(document, sel("a#bylineInfo", &BYLINE))
        .or_else(|| text_of(document, sel("span.a-size-base.po-break-word", &PO_BRAND)))?;

    // Strip the locale's store-link decorations around the brand name
    let brand = raw
        .trim_start_matches("Marke: ")
        .trim_start_matches("Brand: ")
        .trim_start_matches("Besuchen Sie den ")
        .trim_end_matches("-Store")
        .trim();

    (!brand.is_empty()).then(|| brand.to_string())
}

fn extract_category(document: &Html) -> Option<String> {
    static BREADCRUMB: OnceLock<Selector> = OnceLock::new();
    let selector = sel(
        "#wayfinding-breadcrumbs_feature_div .a-list-item a",
        &BREADCRUMB,
    );

    // Deepest breadcrumb wins
    document
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .last()
}

fn extract_images(document: &Html) -> Vec<String> {
    static THUMBS: OnceLock<Selector> = OnceLock::new();
    static LANDING: OnceLock<Selector> = OnceLock::new();

    let mut images: Vec<String> = document
        .select(sel("#altImages img", &THUMBS))
        .filter_map(|el| el.value().attr("src"))
        .map(|src| {
            // Rewrite thumbnail size variants to the high-resolution variant
            src.replace("_AC_US40_", "_AC_SL1500_")
                .replace("_AC_SR38,50_", "_AC_SL1500_")
        })
        .collect();

    if images.is_empty() {
        if let Some(src) = document
            .select(sel("#landingImage", &LANDING))
            .next()
            .and_then(|el| el.value().attr("src"))
        {
            images.push(src.to_string());
        }
    }

    images
}

fn extract_features(document: &Html) -> Vec<String> {
    static BULLETS: OnceLock<Selector> = OnceLock::new();

    document
        .select(sel("#feature-bullets span.a-list-item", &BULLETS))
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty() && !text.contains("Weitere Informationen"))
        .collect()
}

/// Prioritized price selectors; deal price beats list price.
const PRICE_SELECTORS: [&str; 5] = [
    "span.a-price-whole",
    "span#priceblock_dealprice",
    "span#priceblock_ourprice",
    "span.a-price.a-text-price.a-size-medium.apexPriceToPay",
    "span.a-price-range",
];

fn extract_price(document: &Html) -> Option<f64> {
    for pattern in PRICE_SELECTORS {
        let Ok(selector) = Selector::parse(pattern) else {
            continue;
        };
        if let Some(text) = document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
        {
            if let Some(price) = parse_price(&text) {
                return Some(price);
            }
        }
    }
    None
}

/// Parse a locale-formatted price like `1.299,95 €`.
///
/// Dots are thousand separators, the comma is the decimal separator.
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    static PRICE_RE: OnceLock<Regex> = OnceLock::new();
    let re = PRICE_RE.get_or_init(|| Regex::new(r"\d+\.?\d*").expect("valid regex"));

    let cleaned = text
        .replace('€', "")
        .replace("EUR", "")
        .trim()
        .replace('.', "")
        .replace(',', ".");

    let matched = re.find(&cleaned)?;
    match matched.as_str().parse::<f64>() {
        Ok(price) if price > 0.0 => Some(price),
        _ => None,
    }
}

fn extract_rating(document: &Html) -> Option<f64> {
    static RATING: OnceLock<Selector> = OnceLock::new();
    let text = text_of(document, sel("span.a-icon-alt", &RATING))?;
    parse_rating(&text)
}

/// Parse a rating like `4,5 von 5 Sternen`.
#[must_use]
pub fn parse_rating(text: &str) -> Option<f64> {
    static RATING_RE: OnceLock<Regex> = OnceLock::new();
    let re = RATING_RE.get_or_init(|| Regex::new(r"(\d+[,.]?\d*)\s*von\s*5").expect("valid regex"));

    let captures = re.captures(text)?;
    let rating = captures.get(1)?.as_str().replace(',', ".");
    match rating.parse::<f64>() {
        Ok(value) if value > 0.0 => Some(value),
        _ => None,
    }
}

fn extract_review_count(document: &Html) -> Option<i32> {
    static REVIEWS: OnceLock<Selector> = OnceLock::new();
    let text = text_of(document, sel("#acrCustomerReviewText", &REVIEWS))?;
    parse_review_count(&text)
}

/// Parse a review count like `1.234 Bewertungen`.
#[must_use]
pub fn parse_review_count(text: &str) -> Option<i32> {
    static COUNT_RE: OnceLock<Regex> = OnceLock::new();
    let re = COUNT_RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"));

    let cleaned = text.replace('.', "");
    let matched = re.find(&cleaned)?;
    match matched.as_str().parse::<i32>() {
        Ok(count) if count > 0 => Some(count),
        _ => None,
    }
}

fn extract_available_sizes(document: &Html) -> Vec<String> {
    static DROPDOWN: OnceLock<Selector> = OnceLock::new();
    static BUTTONS: OnceLock<Selector> = OnceLock::new();

    let from_dropdown: Vec<String> = document
        .select(sel(
            "select#native_dropdown_selected_size_name option",
            &DROPDOWN,
        ))
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|size| !size.is_empty() && size != "Größe auswählen")
        .collect();

    if !from_dropdown.is_empty() {
        return from_dropdown;
    }

    document
        .select(sel("div#variation_size_name span.a-button-text", &BUTTONS))
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|size| !size.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_PAGE: &str = r##"
        <html><body>
        <div id="wayfinding-breadcrumbs_feature_div">
            <span class="a-list-item"><a href="/fashion">Fashion</a></span>
            <span class="a-list-item"><a href="/herren">Herren</a></span>
            <span class="a-list-item"><a href="/tshirts">T-Shirts</a></span>
        </div>
        <span id="productTitle">  Herren Longline T-Shirt Extra Lang  </span>
        <a id="bylineInfo" href="/stores/x">Besuchen Sie den Tallmark-Store</a>
        <div id="altImages">
            <ul>
                <li><img src="https://img.example.com/I/41x._AC_US40_.jpg"></li>
                <li><img src="https://img.example.com/I/42y._AC_SR38,50_.jpg"></li>
            </ul>
        </div>
        <div id="feature-bullets">
            <span class="a-list-item">Extra lang geschnitten</span>
            <span class="a-list-item">100% Baumwolle</span>
            <span class="a-list-item">› Weitere Informationen</span>
        </div>
        <span class="a-price-whole">29,95</span>
        <span class="a-icon-alt">4,4 von 5 Sternen</span>
        <span id="acrCustomerReviewText">1.234 Bewertungen</span>
        <select id="native_dropdown_selected_size_name">
            <option>Größe auswählen</option>
            <option>M</option>
            <option>L</option>
            <option>XL</option>
        </select>
        </body></html>
    "##;

    #[test]
    fn test_full_product_page() {
        let fields = parse_product_fields(PRODUCT_PAGE);

        assert_eq!(
            fields.title.as_deref(),
            Some("Herren Longline T-Shirt Extra Lang")
        );
        assert_eq!(fields.brand.as_deref(), Some("Tallmark"));
        assert_eq!(fields.category.as_deref(), Some("T-Shirts"));
        assert_eq!(fields.current_price, Some(29.95));
        assert_eq!(fields.currency.as_deref(), Some("EUR"));
        assert_eq!(fields.rating, Some(4.4));
        assert_eq!(fields.review_count, Some(1234));
        assert_eq!(fields.available_sizes, vec!["M", "L", "XL"]);
        assert_eq!(fields.features.len(), 2);
    }

    #[test]
    fn test_image_rewrite_to_high_resolution() {
        let fields = parse_product_fields(PRODUCT_PAGE);
        assert_eq!(
            fields.image_urls,
            vec![
                "https://img.example.com/I/41x._AC_SL1500_.jpg",
                "https://img.example.com/I/42y._AC_SL1500_.jpg",
            ]
        );
    }

    #[test]
    fn test_image_fallback_to_landing() {
        let html = r#"<img id="landingImage" src="https://img.example.com/I/main.jpg">"#;
        let fields = parse_product_fields(html);
        assert_eq!(fields.image_urls, vec!["https://img.example.com/I/main.jpg"]);
    }

    #[test]
    fn test_size_button_fallback() {
        let html = r#"
            <div id="variation_size_name">
                <span class="a-button-text">S</span>
                <span class="a-button-text">M</span>
            </div>
        "#;
        let fields = parse_product_fields(html);
        assert_eq!(fields.available_sizes, vec!["S", "M"]);
    }

    #[test]
    fn test_parse_price_locale() {
        assert_eq!(parse_price("29,95 €"), Some(29.95));
        assert_eq!(parse_price("1.299,00 €"), Some(1299.0));
        assert_eq!(parse_price("EUR 15"), Some(15.0));
        assert_eq!(parse_price("kostenlos"), None);
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("4,5 von 5 Sternen"), Some(4.5));
        assert_eq!(parse_rating("3 von 5"), Some(3.0));
        assert_eq!(parse_rating("Bestseller"), None);
    }

    #[test]
    fn test_parse_review_count() {
        assert_eq!(parse_review_count("1.234 Bewertungen"), Some(1234));
        assert_eq!(parse_review_count("17 Bewertungen"), Some(17));
        assert_eq!(parse_review_count("Keine Bewertungen"), None);
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let fields = parse_product_fields("<html><body><p>leer</p></body></html>");
        assert!(fields.title.is_none());
        assert!(fields.brand.is_none());
        assert!(fields.current_price.is_none());
        assert!(fields.image_urls.is_empty());
    }
}
