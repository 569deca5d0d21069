use thiserror::Error;
use tracing::{error, warn};

/// Classified failure modes of the preview pipeline.
///
/// Every failure is caught at the service boundary and returned as a value;
/// [`PreviewError::status_code`] gives the HTTP-style category for transport
/// layers that need one.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("either url or raw_html is required")]
    MissingInput,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid URL protocol: {0}")]
    InvalidProtocol(String),

    #[error("URL resolves to a private/loopback address (blocked): {0}")]
    PrivateAddressBlocked(String),

    #[error("DNS lookup failed: {0}")]
    DnsLookupFailed(String),

    #[error("Content-Type is not HTML: {0:?}")]
    UnsupportedContentType(String),

    #[error("Empty response body")]
    EmptyBody,

    #[error("Fetch timed out after {0} ms")]
    FetchTimeout(u64),

    #[error("Response exceeded the {0} byte limit")]
    PayloadTooLarge(usize),

    #[error("Too many redirects (limit: {0})")]
    TooManyRedirects(usize),

    #[error("Failed to parse page: {0}")]
    ParseFailed(String),

    #[error("Failed to fetch content: {0}")]
    FetchError(String),

    #[error("Rate limit exceeded for {0}")]
    RateLimitExceeded(String),
}

impl PreviewError {
    /// HTTP status category for the error taxonomy.
    pub fn status_code(&self) -> u16 {
        match self {
            PreviewError::FetchTimeout(_) => 504,
            PreviewError::PayloadTooLarge(_) => 413,
            PreviewError::RateLimitExceeded(_) => 429,
            _ => 400,
        }
    }

    pub fn log(&self) {
        match self {
            PreviewError::MissingInput => {
                warn!("Request carried neither url nor raw_html");
            }
            PreviewError::InvalidUrl(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            PreviewError::InvalidProtocol(scheme) => {
                warn!(scheme = %scheme, "Rejected non-http(s) scheme");
            }
            PreviewError::PrivateAddressBlocked(addr) => {
                warn!(address = %addr, "Blocked private address");
            }
            PreviewError::DnsLookupFailed(e) => {
                warn!(error = %e, "DNS lookup failed");
            }
            PreviewError::UnsupportedContentType(ct) => {
                warn!(content_type = %ct, "Unsupported content type received");
            }
            PreviewError::EmptyBody => {
                warn!("Upstream returned an empty body");
            }
            PreviewError::FetchTimeout(ms) => {
                warn!(timeout_ms = ms, "Fetch timed out");
            }
            PreviewError::PayloadTooLarge(cap) => {
                warn!(cap_bytes = cap, "Response body exceeded size cap");
            }
            PreviewError::TooManyRedirects(limit) => {
                warn!(limit, "Redirect chain exceeded limit");
            }
            PreviewError::ParseFailed(e) => {
                error!(error = %e, "Metadata extraction failed");
            }
            PreviewError::FetchError(e) => {
                error!(error = %e, "Content fetch failed");
            }
            PreviewError::RateLimitExceeded(caller) => {
                warn!(caller = %caller, "Rate limit exceeded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(PreviewError::MissingInput.status_code(), 400);
        assert_eq!(PreviewError::FetchTimeout(5000).status_code(), 504);
        assert_eq!(PreviewError::PayloadTooLarge(512 * 1024).status_code(), 413);
        assert_eq!(
            PreviewError::RateLimitExceeded("10.1.2.3".into()).status_code(),
            429
        );
        assert_eq!(PreviewError::TooManyRedirects(3).status_code(), 400);
    }
}
