use crate::error::PreviewError;
use crate::utils;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

const FALLBACK_TITLE: &str = "Untitled";

/// Leading currency symbol followed by an amount with optional thousands
/// separators and up to two decimals, e.g. `$499.00`, `€ 199`, `£1,200`.
static PRICE_SYMBOL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([£€$])\s?([\d,]+(?:\.\d{1,2})?)").unwrap());

/// Metadata extracted from a single page. `source_url` is filled in by the
/// caller, which knows where the markup came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductMetadata {
    pub title: String,
    pub image: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub site_name: String,
}

struct PriceInfo {
    price: String,
    currency: Option<String>,
}

type PriceStrategy = fn(&Html, &str) -> Result<Option<PriceInfo>, PreviewError>;

/// Pure multi-strategy metadata extractor: no I/O, deterministic for
/// identical markup and base URL.
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts title, image, price/currency and site name from `html`,
    /// resolving relative links against `base_url` (may be empty when the
    /// markup arrived without a URL).
    pub fn extract(&self, html: &str, base_url: &str) -> Result<ProductMetadata, PreviewError> {
        let document = Html::parse_document(html);

        let title = self.extract_title(&document)?;
        let image = self.extract_image(&document, base_url)?;

        // Ordered chain, first hit wins; reordering strategies is a local
        // change to this array.
        let strategies: [PriceStrategy; 3] = [
            Self::price_from_meta_tags,
            Self::price_from_json_ld,
            Self::price_from_symbol_scan,
        ];
        let mut found = None;
        for strategy in strategies {
            if let Some(info) = strategy(&document, html)? {
                found = Some(info);
                break;
            }
        }
        let (price, currency) = match found {
            Some(info) => (Some(info.price), info.currency),
            None => (None, None),
        };

        let site_name = self.extract_site_name(&document, base_url)?;

        debug!(
            title = %title,
            has_image = image.is_some(),
            has_price = price.is_some(),
            "Extracted product metadata"
        );
        Ok(ProductMetadata {
            title,
            image,
            price,
            currency,
            site_name,
        })
    }

    fn extract_title(&self, document: &Html) -> Result<String, PreviewError> {
        if let Some(title) = meta_content(document, "og:title")? {
            return Ok(title);
        }
        if let Some(title) = meta_content(document, "twitter:title")? {
            return Ok(title);
        }

        let title_selector = selector("title")?;
        if let Some(element) = document.select(&title_selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Ok(text);
            }
        }

        Ok(FALLBACK_TITLE.to_string())
    }

    fn extract_image(
        &self,
        document: &Html,
        base_url: &str,
    ) -> Result<Option<String>, PreviewError> {
        let raw = match meta_content(document, "og:image")? {
            Some(value) => Some(value),
            None => match meta_content(document, "twitter:image")? {
                Some(value) => Some(value),
                None => {
                    let img_selector = selector("img")?;
                    document
                        .select(&img_selector)
                        .next()
                        .and_then(|el| el.value().attr("src"))
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                }
            },
        };

        Ok(raw.and_then(|value| absolutize(&value, base_url)))
    }

    /// Strategy 1: Open Graph product tags.
    fn price_from_meta_tags(
        document: &Html,
        _html: &str,
    ) -> Result<Option<PriceInfo>, PreviewError> {
        let amount = meta_content(document, "product:price:amount")?;
        let currency = meta_content(document, "product:price:currency")?;

        Ok(amount.map(|amount| PriceInfo {
            price: format_price(&amount, currency.as_deref()),
            currency,
        }))
    }

    /// Strategy 2: schema.org Product offers in JSON-LD script blocks.
    /// Blocks that fail to parse are skipped silently.
    fn price_from_json_ld(document: &Html, _html: &str) -> Result<Option<PriceInfo>, PreviewError> {
        let script_selector = selector("script[type='application/ld+json']")?;

        for script in document.select(&script_selector) {
            let text = script.text().collect::<String>();
            let Ok(data) = serde_json::from_str::<Value>(&text) else {
                continue;
            };

            let items = match data {
                Value::Array(items) => items,
                other => vec![other],
            };
            for item in items {
                if item.get("@type").and_then(Value::as_str) != Some("Product") {
                    continue;
                }
                let Some(offers) = item.get("offers") else {
                    continue;
                };
                let offer = match offers {
                    Value::Array(arr) => match arr.first() {
                        Some(first) => first,
                        None => continue,
                    },
                    other => other,
                };
                let Some(price) = json_scalar(offer.get("price")) else {
                    continue;
                };
                let currency = offer
                    .get("priceCurrency")
                    .and_then(Value::as_str)
                    .map(String::from);

                return Ok(Some(PriceInfo {
                    price: format_price(&price, currency.as_deref()),
                    currency,
                }));
            }
        }

        Ok(None)
    }

    /// Strategy 3: first currency-symbol amount anywhere in the raw markup.
    fn price_from_symbol_scan(
        _document: &Html,
        html: &str,
    ) -> Result<Option<PriceInfo>, PreviewError> {
        Ok(PRICE_SYMBOL_PATTERN.captures(html).map(|caps| PriceInfo {
            price: format!("{}{}", &caps[1], &caps[2]),
            currency: Some(caps[1].to_string()),
        }))
    }

    fn extract_site_name(&self, document: &Html, base_url: &str) -> Result<String, PreviewError> {
        if let Some(name) = meta_content(document, "og:site_name")? {
            return Ok(name);
        }
        Ok(utils::site_name_from_base(base_url))
    }
}

fn selector(css: &str) -> Result<Selector, PreviewError> {
    Selector::parse(css)
        .map_err(|e| PreviewError::ParseFailed(format!("invalid selector {css}: {e}")))
}

/// Looks a meta tag up by `property` first, then by `name` — OG tags use
/// the former convention, Twitter tags the latter.
fn meta_content(document: &Html, name: &str) -> Result<Option<String>, PreviewError> {
    for attr in ["property", "name"] {
        let meta_selector = selector(&format!("meta[{attr}='{name}']"))?;
        if let Some(content) = document
            .select(&meta_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
        {
            let content = content.trim();
            if !content.is_empty() {
                return Ok(Some(content.to_string()));
            }
        }
    }
    Ok(None)
}

fn format_price(amount: &str, currency: Option<&str>) -> String {
    match currency {
        Some(currency) => format!("{currency} {amount}"),
        None => amount.to_string(),
    }
}

fn json_scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Passes absolute URLs through; resolves relative ones against the base.
/// Anything unresolvable is dropped rather than surfaced relative.
fn absolutize(value: &str, base_url: &str) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(value.to_string());
    }
    Url::parse(base_url)
        .ok()?
        .join(value)
        .ok()
        .map(|resolved| resolved.to_string())
}
