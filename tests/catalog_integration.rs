//! Integration tests for catalog fetching and the poll cycle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use onleihe_watch::models::{Credentials, HttpConfig, MediaFormat};
use onleihe_watch::pipeline::{KeywordFilter, WatchOptions, Watcher};
use onleihe_watch::services::{CatalogCrawler, CatalogSource, LibrarySession, LogNotifier};
use onleihe_watch::utils::http;

const FIXTURE: &str = include_str!("fixtures/catalog.html");

async fn mount_catalog(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("POST"))
        .and(path(route))
        .and(body_string_contains("elementsPerPage=100"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn crawler() -> CatalogCrawler {
    let config = HttpConfig::default();
    let client = http::create_async_client(&config).unwrap();
    CatalogCrawler::new(client, &config).unwrap()
}

fn watcher(server: &MockServer, urls: BTreeMap<String, String>) -> Watcher {
    let config = HttpConfig::default();
    let client = http::create_async_client(&config).unwrap();
    let session = LibrarySession::new(
        client.clone(),
        &server.uri(),
        Credentials {
            username: "reader".into(),
            password: "secret".into(),
            library: "berlin".into(),
            library_id: 1,
        },
    )
    .unwrap();

    let options = WatchOptions {
        urls,
        poll_interval: Duration::from_millis(10),
        max_concurrent: 2,
        lend_period_days: 2,
        reservation_enabled: false,
        notify_email: None,
        test_notification: false,
        notification_title: "Onleihe: New media".into(),
        base_url: server.uri(),
    };
    Watcher::new(
        options,
        KeywordFilter::default(),
        Arc::new(CatalogCrawler::new(client, &config).unwrap()),
        Arc::new(session),
        Arc::new(LogNotifier),
    )
}

#[tokio::test]
async fn test_fetch_extracts_fixture() {
    let server = MockServer::start().await;
    mount_catalog(&server, "/berlin/frontend/new.html", FIXTURE).await;

    let url = format!("{}/berlin/frontend/new.html", server.uri());
    let media = crawler().fetch(&url).await.unwrap();

    assert_eq!(media.len(), 4);
    assert!(media.iter().all(|m| m.library == "berlin"));
    assert_eq!(
        media.iter().filter(|m| m.format == MediaFormat::Emagazine).count(),
        2
    );
}

#[tokio::test]
async fn test_fetch_server_error_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/berlin/frontend/new.html"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = format!("{}/berlin/frontend/new.html", server.uri());
    let err = crawler().fetch(&url).await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_failing_url_does_not_hide_other_catalog() {
    let server = MockServer::start().await;
    mount_catalog(&server, "/berlin/frontend/new.html", FIXTURE).await;
    Mock::given(method("POST"))
        .and(path("/berlin/frontend/broken.html"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let urls = BTreeMap::from([
        (
            "broken".to_string(),
            format!("{}/berlin/frontend/broken.html", server.uri()),
        ),
        (
            "new".to_string(),
            format!("{}/berlin/frontend/new.html", server.uri()),
        ),
    ]);
    let mut watcher = watcher(&server, urls);

    let report = watcher.poll_once().await.unwrap();
    assert!(report.primed);
    assert_eq!(report.failed_urls, 1);
    assert_eq!(report.fetched, 4);
    assert_eq!(watcher.known().len(), 4);

    let report = watcher.poll_once().await.unwrap();
    assert!(!report.primed);
    assert_eq!(report.new_items, 0);
}
