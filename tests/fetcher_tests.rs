use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wishlist_preview::{
    FetcherConfig, HostGuardConfig, PreviewError, PreviewRequest, PreviewService,
    PreviewServiceConfig,
};

/// Service wired to talk to a loopback mock server: the private-address
/// guard is disabled and the timeout shortened so failure cases resolve
/// quickly.
fn loopback_service(timeout_ms: u64) -> PreviewService {
    PreviewService::new_with_config(
        PreviewServiceConfig::new()
            .with_guard_config(HostGuardConfig {
                block_private_addresses: false,
                ..HostGuardConfig::default()
            })
            .with_fetcher_config(FetcherConfig {
                timeout: Duration::from_millis(timeout_ms),
                ..FetcherConfig::default()
            }),
    )
}

#[tokio::test]
async fn test_fetches_and_extracts_product_page() {
    let server = MockServer::start().await;
    let html = r#"
        <meta property="og:title" content="Trail Shoe">
        <meta property="og:site_name" content="Mock Shop">
        <meta property="og:image" content="/shoe.jpg">
        <meta property="product:price:amount" content="89.90">
        <meta property="product:price:currency" content="EUR">
    "#;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(&server)
        .await;

    let service = loopback_service(5000);
    let url = format!("{}/p/1", server.uri());
    let preview = service.preview(&PreviewRequest::from_url(&url)).await.unwrap();

    assert_eq!(preview.title, "Trail Shoe");
    assert_eq!(preview.site_name, "Mock Shop");
    assert_eq!(preview.price.as_deref(), Some("EUR 89.90"));
    assert_eq!(preview.currency.as_deref(), Some("EUR"));
    // relative image resolved against the fetched URL
    assert_eq!(
        preview.image.as_deref(),
        Some(format!("{}/shoe.jpg", server.uri()).as_str())
    );
    assert_eq!(preview.source_url.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn test_redirects_update_source_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<title>Moved Product</title>", "text/html"),
        )
        .mount(&server)
        .await;

    let service = loopback_service(5000);
    let preview = service
        .preview(&PreviewRequest::from_url(format!("{}/old", server.uri())))
        .await
        .unwrap();

    assert_eq!(preview.title, "Moved Product");
    assert_eq!(
        preview.source_url.as_deref(),
        Some(format!("{}/new", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_redirect_chain_past_bound_fails() {
    let server = MockServer::start().await;
    for hop in 0..4 {
        Mock::given(method("GET"))
            .and(path(format!("/r{hop}")))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("/r{}", hop + 1)),
            )
            .mount(&server)
            .await;
    }

    let service = loopback_service(5000);
    let result = service
        .preview(&PreviewRequest::from_url(format!("{}/r0", server.uri())))
        .await;

    assert!(matches!(result, Err(PreviewError::TooManyRedirects(3))));
}

#[tokio::test]
async fn test_non_html_content_type_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"title": "nope"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let service = loopback_service(5000);
    let result = service
        .preview(&PreviewRequest::from_url(format!("{}/api", server.uri())))
        .await;

    assert!(matches!(result, Err(PreviewError::UnsupportedContentType(_))));
}

#[tokio::test]
async fn test_empty_body_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/html"))
        .mount(&server)
        .await;

    let service = loopback_service(5000);
    let result = service
        .preview(&PreviewRequest::from_url(format!("{}/empty", server.uri())))
        .await;

    assert!(matches!(result, Err(PreviewError::EmptyBody)));
}

#[tokio::test]
async fn test_oversized_body_fails_within_bounded_time() {
    let server = MockServer::start().await;
    // comfortably past the 512 KiB cap
    let body = "a".repeat(600 * 1024);
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let service = loopback_service(5000);
    let started = Instant::now();
    let result = service
        .preview(&PreviewRequest::from_url(format!("{}/huge", server.uri())))
        .await;

    assert!(matches!(result, Err(PreviewError::PayloadTooLarge(_))));
    assert!(started.elapsed() < Duration::from_secs(5), "must not hang");
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<title>late</title>", "text/html")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let service = loopback_service(200);
    let started = Instant::now();
    let result = service
        .preview(&PreviewRequest::from_url(format!("{}/slow", server.uri())))
        .await;

    assert!(matches!(result, Err(PreviewError::FetchTimeout(200))));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_loopback_target_blocked_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<title>hi</title>", "text/html"))
        .mount(&server)
        .await;

    // default config keeps the private-address guard on
    let service = PreviewService::new();
    let result = service
        .preview(&PreviewRequest::from_url(format!("{}/p", server.uri())))
        .await;

    assert!(matches!(result, Err(PreviewError::PrivateAddressBlocked(_))));
    assert!(
        server.received_requests().await.unwrap().is_empty(),
        "no HTTP request may reach a blocked target"
    );
}
