//! The URL fetch chain against mock proxy and origin servers.

use std::time::Duration;

use grc_import_core::{
    Config, SourceError,
    source::{
        PageContent,
        web::{DirectFetch, Fetcher, ReaderProxy, http_client},
    },
};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(proxy: &MockServer, timeout: Duration) -> Fetcher {
    let client = http_client(timeout).unwrap();
    Fetcher::new(vec![
        Box::new(ReaderProxy::new(client.clone(), format!("{}/proxy/", proxy.uri()))),
        Box::new(DirectFetch::new(client)),
    ])
}

#[tokio::test]
async fn proxy_text_is_preferred() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/proxy/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("Title: Data Law\n\nArticle 1. Scope"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/law"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>direct</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let page = fetcher(&server, Duration::from_secs(5))
        .fetch(&format!("{}/law", server.uri()))
        .await
        .unwrap();

    assert_eq!(page.strategy, "reader-proxy");
    assert_eq!(page.title.as_deref(), Some("Data Law"));
    assert!(matches!(page.content, PageContent::Text(_)));
}

#[tokio::test]
async fn falls_back_to_direct_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/proxy/"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/law"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    "<html><head><title>Data Law</title></head><body><p>Article 1. Scope</p></body></html>",
                    "text/html; charset=utf-8",
                ),
        )
        .mount(&server)
        .await;

    let page = fetcher(&server, Duration::from_secs(5))
        .fetch(&format!("{}/law", server.uri()))
        .await
        .unwrap();

    assert_eq!(page.strategy, "direct");
    assert_eq!(page.title.as_deref(), Some("Data Law"));
    assert!(matches!(page.content, PageContent::Html(_)));
}

#[tokio::test]
async fn every_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/proxy/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("   "))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/law"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let error = fetcher(&server, Duration::from_secs(5))
        .fetch(&format!("{}/law", server.uri()))
        .await
        .unwrap_err();

    match &error {
        SourceError::FetchFailed { attempts, .. } => {
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].strategy, "reader-proxy");
            assert_eq!(attempts[0].error, "empty response");
            assert_eq!(attempts[1].error, "HTTP 404");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(error.to_string().contains("reader-proxy: empty response; direct: HTTP 404"));
}

#[tokio::test]
async fn slow_servers_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let error = fetcher(&server, Duration::from_millis(200))
        .fetch(&format!("{}/law", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(error, SourceError::FetchFailed { ref attempts, .. } if attempts.len() == 2));
}

#[tokio::test]
async fn default_chain_uses_configured_proxy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/reader/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("MADDE 1 – Amaç"))
        .expect(1)
        .mount(&server)
        .await;
    let mut config = Config::default();
    config
        .set("reader_proxy_url", &format!("{}/reader/", server.uri()))
        .unwrap();

    let page = Fetcher::from_config(&config)
        .unwrap()
        .fetch("example.com/kanun")
        .await
        .unwrap();

    assert_eq!(page.url.as_str(), "https://example.com/kanun");
    assert_eq!(page.strategy, "reader-proxy");
}
