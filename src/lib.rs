use async_trait::async_trait;

mod error;
mod extractor;
mod fetcher;
mod limiter;
mod logging;
mod preview_service;
mod security;
mod utils;

pub use error::PreviewError;
pub use extractor::{MetadataExtractor, ProductMetadata};
pub use fetcher::{FetchedPage, Fetcher, FetcherConfig};
pub use limiter::{FixedWindowLimiter, RateLimiter, RateLimiterConfig};
pub use logging::{log_error_card, log_preview_card, setup_logging, LogConfig};
pub use preview_service::{PreviewService, PreviewServiceConfig};
pub use security::{HostGuard, HostGuardConfig};

/// Input to the preview pipeline. At least one of `url` and `raw_html` must
/// be present; validation happens in [`PreviewService`].
///
/// When both are given, `raw_html` is extracted directly and `url` only
/// serves as the base for relative link resolution and as the echoed
/// `sourceUrl`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub raw_html: Option<String>,
}

impl PreviewRequest {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            raw_html: None,
        }
    }

    pub fn from_raw_html(raw_html: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            url: base_url,
            raw_html: Some(raw_html.into()),
        }
    }
}

/// Normalized product metadata returned to the wishlist client.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Preview {
    /// Never empty; falls back to `"Untitled"`.
    pub title: String,
    /// Absolute URL when present.
    pub image: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
    #[serde(rename = "siteName")]
    pub site_name: String,
    /// Final (post-redirect) URL for fetched pages, echoed request URL for
    /// raw markup, `None` when only markup was supplied.
    #[serde(rename = "sourceUrl")]
    pub source_url: Option<String>,
}

#[async_trait]
pub trait PreviewGenerator {
    async fn generate_preview(&self, request: &PreviewRequest)
        -> Result<Preview, PreviewError>;
}
