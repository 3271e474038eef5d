//! Integration tests for the feed pipeline using wiremock
//!
//! These tests validate fetch, parse, dedup, import and bookkeeping against
//! a mock upstream server.

mod common;

use common::{rss_document, TestEngine};
use newsdesk::error::Error;
use newsdesk::models::{FeedStatus, NewsStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Import every new item from an RSS 2.0 feed as drafts
#[tokio::test]
async fn test_import_creates_draft_articles() {
    let mock_server = MockServer::start().await;
    let body = rss_document(&[
        ("First story", "https://upstream.example/1"),
        ("Second story", "https://upstream.example/2"),
    ]);

    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let engine = TestEngine::new();
    let feed = engine.feed(&format!("{}/rss", mock_server.uri()), 10, false);

    let outcome = engine.importer().fetch_one(feed.id).await.unwrap();
    assert_eq!(outcome.items_found, 2);
    assert_eq!(outcome.items_imported, 2);

    let imported = engine
        .news
        .get_by_slug("first-story")
        .expect("imported article exists");
    assert_eq!(imported.status, NewsStatus::Draft);
    assert_eq!(imported.published_at, None);
    assert_eq!(imported.source_url.as_deref(), Some("https://upstream.example/1"));
    assert_eq!(imported.source_name.as_deref(), Some("Upstream Wire"));
    assert!(imported.excerpt.is_some());
}

/// Re-fetching the same feed must not create duplicate articles
#[tokio::test]
async fn test_refetch_is_idempotent() {
    let mock_server = MockServer::start().await;
    let body = rss_document(&[("Repeated story", "https://upstream.example/same")]);

    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let engine = TestEngine::new();
    let feed = engine.feed(&format!("{}/rss", mock_server.uri()), 10, false);
    let importer = engine.importer();

    let first = importer.fetch_one(feed.id).await.unwrap();
    assert_eq!(first.items_imported, 1);

    let second = importer.fetch_one(feed.id).await.unwrap();
    assert_eq!(second.items_found, 1);
    assert_eq!(second.items_imported, 0);

    // Exactly one article carries the dedup key
    assert!(engine
        .news
        .exists_by_source_url("https://upstream.example/same")
        .unwrap());
    assert_eq!(
        engine
            .news
            .list(&newsdesk::content::NewsQuery::default())
            .unwrap()
            .len(),
        1
    );
}

/// HTTP failure: error status, counter up, last_fetched_at untouched,
/// error surfaced to the caller
#[tokio::test]
async fn test_http_error_bookkeeping() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let engine = TestEngine::new();
    let feed = engine.feed(&format!("{}/rss", mock_server.uri()), 10, false);

    let result = engine.importer().fetch_one(feed.id).await;
    assert!(matches!(result, Err(Error::Fetch(_))));

    let feed = engine.feeds.get(feed.id).unwrap();
    assert_eq!(feed.status, FeedStatus::Error);
    assert_eq!(feed.error_count, 1);
    assert!(feed.last_error.is_some());
    assert_eq!(feed.last_fetched_at, None);
}

/// Malformed XML: recorded as a format error, feed stays eligible for retry
#[tokio::test]
async fn test_malformed_xml_recovers_on_next_fetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss><channel><item></rss>"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_document(&[("Fixed", "https://upstream.example/fixed")])),
        )
        .mount(&mock_server)
        .await;

    let engine = TestEngine::new();
    let feed = engine.feed(&format!("{}/rss", mock_server.uri()), 10, false);
    let importer = engine.importer();

    let result = importer.fetch_one(feed.id).await;
    assert!(matches!(result, Err(Error::Parse(_))));
    assert_eq!(engine.feeds.get(feed.id).unwrap().status, FeedStatus::Error);

    // Manual retry succeeds and the feed returns to active
    let outcome = importer.fetch_one(feed.id).await.unwrap();
    assert_eq!(outcome.items_imported, 1);

    let feed = engine.feeds.get(feed.id).unwrap();
    assert_eq!(feed.status, FeedStatus::Active);
    assert_eq!(feed.last_error, None);
    assert!(feed.last_fetched_at.is_some());
}

/// The item list is capped at max_items before dedup and import
#[tokio::test]
async fn test_max_items_truncation() {
    let mock_server = MockServer::start().await;
    let body = rss_document(&[
        ("One", "https://upstream.example/1"),
        ("Two", "https://upstream.example/2"),
        ("Three", "https://upstream.example/3"),
        ("Four", "https://upstream.example/4"),
    ]);

    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let engine = TestEngine::new();
    let feed = engine.feed(&format!("{}/rss", mock_server.uri()), 2, false);

    let outcome = engine.importer().fetch_one(feed.id).await.unwrap();
    assert_eq!(outcome.items_found, 2);
    assert_eq!(outcome.items_imported, 2);

    // Items are taken in source order
    assert!(engine.news.exists_by_source_url("https://upstream.example/1").unwrap());
    assert!(engine.news.exists_by_source_url("https://upstream.example/2").unwrap());
    assert!(!engine.news.exists_by_source_url("https://upstream.example/3").unwrap());
}

/// auto_publish imports land effectively published with a timestamp
#[tokio::test]
async fn test_auto_publish_import()  {
    let mock_server = MockServer::start().await;
    let body = rss_document(&[("Live story", "https://upstream.example/live")]);

    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let engine = TestEngine::new();
    let feed = engine.feed(&format!("{}/rss", mock_server.uri()), 10, true);
    engine.importer().fetch_one(feed.id).await.unwrap();

    let article = engine.news.get_by_slug("live-story").unwrap();
    assert_eq!(article.status, NewsStatus::Published);
    assert!(article.is_effectively_published(chrono::Utc::now()));

    let feed = engine.feeds.get(feed.id).unwrap();
    assert_eq!(feed.total_items_fetched, 1);
}

/// Atom feeds import through the same path
#[tokio::test]
async fn test_atom_import() {
    let mock_server = MockServer::start().await;
    let body = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Upstream</title>
  <entry>
    <title>Atom entry</title>
    <summary>Entry summary</summary>
    <link href="https://upstream.example/atom/1"/>
    <published>2024-08-06T10:30:00Z</published>
  </entry>
</feed>"#;

    Mock::given(method("GET"))
        .and(path("/atom"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let engine = TestEngine::new();
    let feed = engine.feed(&format!("{}/atom", mock_server.uri()), 10, false);

    let outcome = engine.importer().fetch_one(feed.id).await.unwrap();
    assert_eq!(outcome.items_imported, 1);
    assert!(engine
        .news
        .exists_by_source_url("https://upstream.example/atom/1")
        .unwrap());
}

/// Probe a URL without importing
#[tokio::test]
async fn test_url_probe() {
    let mock_server = MockServer::start().await;
    let body = rss_document(&[
        ("One", "https://upstream.example/1"),
        ("Two", "https://upstream.example/2"),
    ]);

    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let engine = TestEngine::new();
    let probe = engine
        .importer()
        .test_url(&format!("{}/rss", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(probe.kind, "rss");
    assert_eq!(probe.title, "Upstream Wire");
    assert_eq!(probe.items_found, 2);

    // Nothing was imported
    assert!(engine
        .news
        .list(&newsdesk::content::NewsQuery::default())
        .unwrap()
        .is_empty());
}

/// Bulk fetch isolates failures: the bad feed errors, the good one imports
#[tokio::test]
async fn test_bulk_fetch_isolates_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_document(&[("Good", "https://upstream.example/good")])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let engine = TestEngine::new();
    engine.feed(&format!("{}/bad", mock_server.uri()), 10, false);

    let good = engine
        .feeds
        .create(newsdesk::feed::NewFeed {
            name: "Good Wire".to_string(),
            url: format!("{}/good", mock_server.uri()),
            description: None,
            category_id: None,
            language: None,
            fetch_frequency: None,
            max_items: None,
            auto_publish: false,
            status: None,
        })
        .unwrap();

    let results = engine.importer().fetch_all().await.unwrap();
    assert_eq!(results.len(), 2);

    let failures = results.iter().filter(|r| r.outcome.is_err()).count();
    assert_eq!(failures, 1);

    let good_result = results.iter().find(|r| r.feed_id == good.id).unwrap();
    assert!(good_result.outcome.is_ok());
    assert!(engine
        .news
        .exists_by_source_url("https://upstream.example/good")
        .unwrap());
}
