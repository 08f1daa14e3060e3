//! Retrieval tests against local mock servers.
//!
//! Fetching is blocking, so each fetch runs on a `spawn_blocking` thread while
//! the wiremock servers run on the test's tokio runtime.

mod common;

use std::io::Cursor;
use std::net::TcpListener;
use std::time::{Duration, Instant};

use common::{CrawlError, page_locations, sitemap_index, urlset};
use rand::SeedableRng;
use rand::rngs::StdRng;
use sitemap_stream::{FetchConfig, IndexEntry, PageEntry, SitemapError, SitemapFetcher, parse};
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "sitemap-stream-test/1.0";

fn short_timeouts() -> FetchConfig {
    FetchConfig {
        tls_handshake_timeout_seconds: 1,
        page_timeout_seconds: 1,
        index_timeout_seconds: 1,
        direct_timeout_seconds: 5,
        accept_invalid_certs: false,
    }
}

async fn serve_xml(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("user-agent", USER_AGENT))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml")
                .set_body_string(body),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn fetch_locations(
    url: String,
    proxies: Vec<String>,
    config: FetchConfig,
) -> Result<Vec<String>, SitemapError> {
    let fetcher = SitemapFetcher::with_rng(config, StdRng::seed_from_u64(42));
    let mut locations = Vec::new();
    fetcher.fetch(&url, &proxies, USER_AGENT, |entry: PageEntry| {
        locations.push(entry.location().to_string());
        Ok::<(), SitemapError>(())
    })?;
    Ok(locations)
}

/// Address nothing is listening on, so connecting is refused quickly.
fn refused_proxy() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_direct_fetch_without_proxies() {
    let server = MockServer::start().await;
    let locations = page_locations(5);
    serve_xml(&server, "/sitemap.xml", urlset(&locations)).await;

    let url = format!("{}/sitemap.xml", server.uri());
    let fetched = tokio::task::spawn_blocking(move || {
        fetch_locations(url, Vec::new(), FetchConfig::default())
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(fetched, locations);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_through_proxy() {
    let proxy = MockServer::start().await;
    let body = urlset(&page_locations(2));
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&proxy)
        .await;

    let proxies = vec![proxy.uri()];
    let fetched = tokio::task::spawn_blocking(move || {
        fetch_locations(
            "http://sitemaps.invalid/sitemap.xml".to_string(),
            proxies,
            FetchConfig::default(),
        )
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(fetched, page_locations(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_proxy_timeout_falls_back_to_direct() {
    let slow_proxy = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(4)))
        .mount(&slow_proxy)
        .await;

    let origin = MockServer::start().await;
    let locations = page_locations(4);
    let document = urlset(&locations);
    serve_xml(&origin, "/sitemap.xml", document.clone()).await;

    let url = format!("{}/sitemap.xml", origin.uri());
    let proxies = vec![slow_proxy.uri()];
    let fetched = tokio::task::spawn_blocking(move || fetch_locations(url, proxies, short_timeouts()))
        .await
        .unwrap()
        .unwrap();

    let mut direct = Vec::new();
    parse(Cursor::new(document), |entry: PageEntry| {
        direct.push(entry.location().to_string());
        Ok::<(), SitemapError>(())
    })
    .unwrap();

    assert_eq!(fetched, direct);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_proxy_url_does_not_fall_back() {
    let origin = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&origin)
        .await;

    let url = format!("{}/sitemap.xml", origin.uri());
    let proxies = vec!["not a proxy url".to_string()];
    let result = tokio::task::spawn_blocking(move || fetch_locations(url, proxies, short_timeouts()))
        .await
        .unwrap();

    assert!(matches!(result, Err(SitemapError::ProxyUrl { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refused_proxy_connection_does_not_fall_back() {
    let origin = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&origin)
        .await;

    let url = format!("{}/sitemap.xml", origin.uri());
    let proxies = vec![refused_proxy()];
    let result = tokio::task::spawn_blocking(move || fetch_locations(url, proxies, short_timeouts()))
        .await
        .unwrap();

    match result {
        Err(err @ SitemapError::Network(_)) => assert!(!err.is_timeout()),
        other => panic!("Expected network error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_status_error() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&origin)
        .await;

    let url = format!("{}/missing.xml", origin.uri());
    let result = tokio::task::spawn_blocking(move || fetch_locations(url, Vec::new(), short_timeouts()))
        .await
        .unwrap();

    assert!(matches!(result, Err(SitemapError::HttpStatus { status: 404, .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_direct_timeout_is_reported() {
    let origin = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(4)))
        .mount(&origin)
        .await;

    let url = format!("{}/sitemap.xml", origin.uri());
    let config = FetchConfig {
        direct_timeout_seconds: 1,
        ..short_timeouts()
    };
    let result = tokio::task::spawn_blocking(move || fetch_locations(url, Vec::new(), config))
        .await
        .unwrap();

    match result {
        Err(err) => assert!(err.is_timeout(), "unexpected error: {err:?}"),
        Ok(locations) => panic!("Expected timeout, fetched {locations:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_index() {
    let origin = MockServer::start().await;
    let children = ["https://example.com/a.xml", "https://example.com/b.xml"];
    serve_xml(&origin, "/sitemap_index.xml", sitemap_index(&children)).await;

    let url = format!("{}/sitemap_index.xml", origin.uri());
    let fetched = tokio::task::spawn_blocking(move || {
        let fetcher = SitemapFetcher::new(FetchConfig::default());
        let mut entries = Vec::new();
        fetcher
            .fetch_index(&url, &[], USER_AGENT, |entry: IndexEntry| {
                entries.push(entry);
                Ok::<(), SitemapError>(())
            })
            .map(|_| entries)
    })
    .await
    .unwrap()
    .unwrap();

    let locations: Vec<&str> = fetched.iter().map(IndexEntry::location).collect();
    assert_eq!(locations, children);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_index_proxy_timeout_uses_index_timeout() {
    let slow_proxy = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(6)))
        .mount(&slow_proxy)
        .await;

    let origin = MockServer::start().await;
    let children = ["https://example.com/a.xml"];
    serve_xml(&origin, "/sitemap_index.xml", sitemap_index(&children)).await;

    let url = format!("{}/sitemap_index.xml", origin.uri());
    let proxies = vec![slow_proxy.uri()];
    let config = FetchConfig {
        page_timeout_seconds: 30,
        index_timeout_seconds: 1,
        ..short_timeouts()
    };
    let (fetched, elapsed) = tokio::task::spawn_blocking(move || {
        let fetcher = SitemapFetcher::with_rng(config, StdRng::seed_from_u64(42));
        let started = Instant::now();
        let mut locations = Vec::new();
        let result = fetcher.fetch_index(&url, &proxies, USER_AGENT, |entry: IndexEntry| {
            locations.push(entry.location().to_string());
            Ok::<(), SitemapError>(())
        });
        (result.map(|_| locations), started.elapsed())
    })
    .await
    .unwrap();

    assert_eq!(fetched.unwrap(), children);
    assert!(elapsed < Duration::from_secs(6), "took {elapsed:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_consumer_abort_during_fetch() {
    let origin = MockServer::start().await;
    serve_xml(&origin, "/sitemap.xml", urlset(&page_locations(10))).await;

    let url = format!("{}/sitemap.xml", origin.uri());
    let (result, calls) = tokio::task::spawn_blocking(move || {
        let fetcher = SitemapFetcher::new(FetchConfig::default());
        let mut calls = 0;
        let result = fetcher.fetch(&url, &[], USER_AGENT, |_entry| {
            calls += 1;
            if calls == 3 {
                Err(CrawlError::Stop(calls))
            } else {
                Ok(())
            }
        });
        (result, calls)
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(CrawlError::Stop(3))));
    assert_eq!(calls, 3);
}
