use crate::extractor::ProductMetadata;
use crate::{
    Fetcher, FetcherConfig, HostGuard, HostGuardConfig, MetadataExtractor, Preview, PreviewError,
    PreviewGenerator, PreviewRequest, RateLimiter,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

/// Orchestrates the preview pipeline: validates input, routes between the
/// raw-markup and fetch paths, and maps every failure to the error
/// taxonomy. One instance serves many concurrent requests; all state is
/// request-scoped.
#[derive(Clone)]
pub struct PreviewService {
    fetcher: Fetcher,
    extractor: MetadataExtractor,
    guard: HostGuard,
    limiter: Option<Arc<dyn RateLimiter>>,
}

impl Default for PreviewService {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewService {
    pub fn new() -> Self {
        Self::new_with_config(PreviewServiceConfig::default())
    }

    pub fn new_with_config(config: PreviewServiceConfig) -> Self {
        Self {
            fetcher: Fetcher::new_with_config(config.fetcher),
            extractor: MetadataExtractor::new(),
            guard: HostGuard::new(config.guard),
            limiter: config.limiter,
        }
    }

    /// Single entry point: produces a preview or a classified error.
    #[instrument(level = "debug", skip(self, request))]
    pub async fn preview(&self, request: &PreviewRequest) -> Result<Preview, PreviewError> {
        let result = self.preview_inner(request).await;
        if let Err(e) = &result {
            e.log();
        }
        result
    }

    /// Like [`preview`](Self::preview), but consults the injected rate
    /// limiter for `caller` before doing any work.
    pub async fn preview_for_caller(
        &self,
        caller: &str,
        request: &PreviewRequest,
    ) -> Result<Preview, PreviewError> {
        if let Some(limiter) = &self.limiter {
            limiter.check(caller)?;
        }
        self.preview(request).await
    }

    async fn preview_inner(&self, request: &PreviewRequest) -> Result<Preview, PreviewError> {
        // Empty strings count as absent, matching how clients omit fields.
        let url = request.url.as_deref().filter(|s| !s.is_empty());
        let raw_html = request.raw_html.as_deref().filter(|s| !s.is_empty());

        match (url, raw_html) {
            (None, None) => Err(PreviewError::MissingInput),

            // Raw markup wins; a URL alongside it is only the resolution
            // base and the echoed source.
            (base, Some(markup)) => {
                debug!(has_base = base.is_some(), "Extracting from raw markup");
                let metadata = self.extractor.extract(markup, base.unwrap_or(""))?;
                Ok(assemble(metadata, base.map(str::to_string)))
            }

            (Some(url), None) => {
                let parsed = Url::parse(url)?;
                self.guard.validate_scheme(&parsed)?;
                // Reject private targets before the fetcher opens anything;
                // the fetcher re-checks each redirect hop.
                self.guard.ensure_public(&parsed).await?;

                let page = self.fetcher.fetch(&parsed, &self.guard).await?;
                let metadata = self.extractor.extract(&page.html, page.final_url.as_str())?;
                Ok(assemble(metadata, Some(page.final_url.to_string())))
            }
        }
    }
}

fn assemble(metadata: ProductMetadata, source_url: Option<String>) -> Preview {
    Preview {
        title: metadata.title,
        image: metadata.image,
        price: metadata.price,
        currency: metadata.currency,
        site_name: metadata.site_name,
        source_url,
    }
}

#[async_trait]
impl PreviewGenerator for PreviewService {
    async fn generate_preview(
        &self,
        request: &PreviewRequest,
    ) -> Result<Preview, PreviewError> {
        self.preview(request).await
    }
}

/// Configuration for [`PreviewService`]; defaults match production
/// hardening (guard enabled, 5 s timeout, 3 redirects, 512 KiB cap).
#[derive(Default)]
pub struct PreviewServiceConfig {
    pub fetcher: FetcherConfig,
    pub guard: HostGuardConfig,
    pub limiter: Option<Arc<dyn RateLimiter>>,
}

impl PreviewServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetcher_config(mut self, fetcher: FetcherConfig) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_guard_config(mut self, guard: HostGuardConfig) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }
}
