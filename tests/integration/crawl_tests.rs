//! End-to-end crawls against a mock site
//!
//! Each test wires an engine from a TOML configuration pointing at a
//! temporary directory, so the filesystem object store and the SQLite
//! metadata database are exercised together.

use crawline::config::{parse_config, Config};
use crawline::crawler::{DispatchTable, LinkParser};
use crawline::{Engine, UrlState};
use futures::StreamExt;
use regex::Regex;
use std::collections::BTreeSet;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(dir: &TempDir, extra_engine: &str) -> Config {
    let root = dir.path().join("objects");
    let database = dir.path().join("crawline.db");
    parse_config(&format!(
        r#"
[downloader]
user-agent = "crawline-test/1.0"
timeout-secs = 5

[engine]
download-interval-ms = 0
{}

[storage]
root = "{}"
suffix = "site"

[metadata]
database-path = "{}"
"#,
        extra_engine,
        root.display(),
        database.display()
    ))
    .unwrap()
}

fn engine(config: &Config, server: &MockServer) -> Engine {
    let follow = Regex::new(&format!("^{}/", regex::escape(&server.uri()))).unwrap();
    let dispatch = DispatchTable::builder()
        .route(
            format!("^{}/", regex::escape(&server.uri())),
            LinkParser::factory(follow, None),
        )
        .build()
        .unwrap();
    Engine::from_config(config, dispatch).unwrap()
}

fn html(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<a href="{}">{}</a>"#, link, link))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body>{}</body></html>",
        title, anchors
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .expect(expected_fetches)
        .mount(server)
        .await;
}

/// Mounts a small site:
///
/// `/` links to `/a`, `/missing`, `/feed.json` and an external page;
/// `/a` links back to `/` and to itself.
async fn mount_site(server: &MockServer, expected_fetches: u64) {
    mount_page(
        server,
        "/",
        html(
            "Home",
            &["/a", "/missing", "/feed.json", "https://external.test/x"],
        ),
        expected_fetches,
    )
    .await;
    mount_page(server, "/a", html("Page A", &["/", "/a"]), expected_fetches).await;
    Mock::given(method("GET"))
        .and(path("/feed.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_isolates_failures() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;
    let dir = TempDir::new().unwrap();
    let engine = engine(&test_config(&dir, ""), &server);
    let base = server.uri();

    let report = engine.crawl(&format!("{}/", base)).await.unwrap();

    let succeeded: BTreeSet<String> = [format!("{}/", base), format!("{}/a", base)].into();
    let failed: BTreeSet<String> = [format!("{}/missing", base), format!("{}/feed.json", base)].into();
    assert_eq!(report.succeeded, succeeded);
    assert_eq!(report.failed, failed);
    assert_eq!(report.failures[&format!("{}/missing", base)].stage, UrlState::Fetching);
    assert_eq!(report.failures[&format!("{}/feed.json", base)].stage, UrlState::Extracting);
    assert_eq!(report.fetches, 4);

    let home = &report.context[&format!("{}/", base)];
    assert_eq!(home["title"], "Home");
    assert_eq!(report.context[&format!("{}/a", base)]["title"], "Page A");
    assert!(!report.context.contains_key(&format!("{}/feed.json", base)));
}

#[tokio::test]
async fn test_second_crawl_is_served_from_cache() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, "");
    let seed = format!("{}/", server.uri());

    let first = engine(&config, &server).crawl(&seed).await.unwrap();
    // A fresh engine over the same directory sees the persisted cache
    let second = engine(&config, &server).crawl(&seed).await.unwrap();

    assert_eq!(first.succeeded, second.succeeded);
    assert_eq!(first.context, second.context);
    // Only the two failed URLs are retried
    assert_eq!(second.fetches, 2);
}

#[tokio::test]
async fn test_metadata_and_listing() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;
    let dir = TempDir::new().unwrap();
    let engine = engine(&test_config(&dir, ""), &server);
    let base = server.uri();

    engine.crawl(&format!("{}/", base)).await.unwrap();

    let entry = engine.index_entry(&format!("{}/", base)).unwrap().unwrap();
    assert_eq!(entry.record.request_method, "GET");
    let links: Vec<String> = entry.links.iter().map(|link| link.url.clone()).collect();
    assert_eq!(
        links,
        vec![
            format!("{}/a", base),
            format!("{}/missing", base),
            format!("{}/feed.json", base),
        ]
    );
    assert!(engine.index_entry(&format!("{}/missing", base)).unwrap().is_none());

    let mut urls: Vec<String> = engine
        .cache()
        .list_objects()
        .map(|object| object.unwrap().url)
        .collect()
        .await;
    urls.sort();
    assert_eq!(urls, vec![format!("{}/", base), format!("{}/a", base)]);

    // Objects live under the configured namespace
    assert!(dir.path().join("objects").join("site").is_dir());
}

#[tokio::test]
async fn test_parse_replays_cache_without_network() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;
    let dir = TempDir::new().unwrap();
    let engine = engine(&test_config(&dir, ""), &server);
    let seed = format!("{}/", server.uri());

    let report = engine.crawl(&seed).await.unwrap();
    let context = engine.parse(&seed).await.unwrap();

    assert_eq!(context, report.context);
}

#[tokio::test]
async fn test_parse_strict_requires_cache() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let engine = engine(&test_config(&dir, r#"missing-cache = "strict""#), &server);

    let result = engine.parse(&format!("{}/", server.uri())).await;
    assert!(matches!(result, Err(crawline::CrawlineError::Parse { .. })));
}

#[tokio::test]
async fn test_max_urls_bounds_the_crawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("Home", &["/a", "/b"]), 1).await;
    let dir = TempDir::new().unwrap();
    let engine = engine(&test_config(&dir, "max-urls = 1"), &server);
    let base = server.uri();

    let report = engine.crawl(&format!("{}/", base)).await.unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.pending, vec![format!("{}/a", base), format!("{}/b", base)]);
    assert!(!report.is_complete());
}

#[tokio::test]
async fn test_purge_all_empties_cache_and_index() {
    let server = MockServer::start().await;
    mount_site(&server, 2).await;
    let dir = TempDir::new().unwrap();
    let engine = engine(&test_config(&dir, ""), &server);
    let seed = format!("{}/", server.uri());

    engine.crawl(&seed).await.unwrap();
    // Latest and one snapshot for each of the two pages
    assert_eq!(engine.purge_all().await.unwrap(), 4);
    assert!(engine.index_entry(&seed).unwrap().is_none());

    // Everything is fetched again after a purge
    let report = engine.crawl(&seed).await.unwrap();
    assert_eq!(report.fetches, 4);
}
