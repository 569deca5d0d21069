use crate::error::PreviewError;
use crate::security::HostGuard;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::Client;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, instrument, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_REDIRECTS: usize = 3;
/// 512 KiB hard cap on buffered body bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 512 * 1024;
pub const DEFAULT_USER_AGENT: &str = "wishlist-preview-bot/0.1";

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    /// Covers the whole fetch: every redirect hop, guard re-check and body
    /// chunk shares one deadline.
    pub timeout: Duration,
    pub max_redirects: usize,
    pub max_body_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// A successfully fetched document together with the URL it ultimately
/// came from after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub final_url: Url,
}

/// Retrieves remote documents with a hard timeout, bounded redirects, a
/// content-type gate and an incrementally enforced body size cap.
///
/// Redirects are followed manually so the [`HostGuard`] runs against every
/// hop's host, not just the first.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self::new_with_config(FetcherConfig::default())
    }

    pub fn new_with_config(config: FetcherConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            // redirects are handled by the fetch loop
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to create HTTP client");
                panic!("Failed to initialize HTTP client: {}", e);
            });

        Self { client, config }
    }

    /// Fetches `url` and returns its body as text plus the final URL.
    ///
    /// Fails with the classified error for the first guard, transport,
    /// content-type, size or timeout violation encountered.
    #[instrument(level = "debug", skip(self, guard), err)]
    pub async fn fetch(&self, url: &Url, guard: &HostGuard) -> Result<FetchedPage, PreviewError> {
        guard.validate_scheme(url)?;

        let deadline = Instant::now() + self.config.timeout;
        let mut current = url.clone();
        let mut hops = 0usize;

        loop {
            self.bounded(deadline, guard.ensure_public(&current))
                .await??;

            let response = self
                .bounded(deadline, self.client.get(current.clone()).send())
                .await?
                .map_err(|e| self.classify_transport(e))?;

            if response.status().is_redirection() {
                hops += 1;
                if hops > self.config.max_redirects {
                    return Err(PreviewError::TooManyRedirects(self.config.max_redirects));
                }
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        PreviewError::FetchError("redirect without a Location header".to_string())
                    })?;
                current = current.join(location)?;
                debug!(hop = hops, target = %current, "Following redirect");
                continue;
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_ascii_lowercase();
            if !is_html_content_type(&content_type) {
                return Err(PreviewError::UnsupportedContentType(content_type));
            }

            let final_url = response.url().clone();
            let body = self.read_capped(response, deadline).await?;
            if body.is_empty() {
                return Err(PreviewError::EmptyBody);
            }

            debug!(url = %final_url, bytes = body.len(), "Fetched page");
            return Ok(FetchedPage {
                html: String::from_utf8_lossy(&body).into_owned(),
                final_url,
            });
        }
    }

    /// Streams the body, enforcing the size cap on every chunk. Dropping
    /// the response mid-stream tears down the connection.
    async fn read_capped(
        &self,
        response: reqwest::Response,
        deadline: Instant,
    ) -> Result<Vec<u8>, PreviewError> {
        let cap = self.config.max_body_bytes;
        let mut body: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();

        loop {
            let Some(next) = self.bounded(deadline, stream.next()).await? else {
                break;
            };
            let chunk = next.map_err(|e| self.classify_transport(e))?;
            if body.len() + chunk.len() > cap {
                warn!(cap_bytes = cap, "Aborting oversized response");
                return Err(PreviewError::PayloadTooLarge(cap));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }

    /// Awaits `fut` for whatever time remains before the deadline.
    async fn bounded<T, F>(&self, deadline: Instant, fut: F) -> Result<T, PreviewError>
    where
        F: Future<Output = T>,
    {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(self.timeout_error());
        }
        timeout(remaining, fut)
            .await
            .map_err(|_| self.timeout_error())
    }

    fn timeout_error(&self) -> PreviewError {
        PreviewError::FetchTimeout(self.config.timeout.as_millis() as u64)
    }

    fn classify_transport(&self, e: reqwest::Error) -> PreviewError {
        if e.is_timeout() {
            self.timeout_error()
        } else {
            PreviewError::FetchError(e.to_string())
        }
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}
