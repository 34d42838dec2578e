//! HTTP downloader behaviour against a mock server

use crawline::config::DownloaderConfig;
use crawline::crawler::{DownloadError, Downloader, HttpDownloader};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn downloader() -> HttpDownloader {
    let mut config = DownloaderConfig::new("crawline-test/1.0");
    config.accept = "text/html".to_string();
    config.timeout_secs = 1;
    config.max_redirects = 3;
    HttpDownloader::new(&config).unwrap()
}

#[tokio::test]
async fn test_success_captures_both_header_sets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", "crawline-test/1.0"))
        .and(header("accept", "text/html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<p>hello</p>", "text/html")
                .insert_header("x-served-by", "mock"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/page", server.uri());
    let resource = downloader().fetch(&url).await.unwrap();

    assert_eq!(resource.url, url);
    assert_eq!(resource.request_method, "GET");
    assert_eq!(resource.request_headers["user-agent"], "crawline-test/1.0");
    assert_eq!(resource.request_headers["accept"], "text/html");
    assert_eq!(resource.response_headers["x-served-by"], "mock");
    assert_eq!(resource.body, b"<p>hello</p>");
}

#[tokio::test]
async fn test_absolute_redirect_is_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("moved", "text/html"))
        .mount(&server)
        .await;

    let url = format!("{}/old", server.uri());
    let resource = downloader().fetch(&url).await.unwrap();

    // The resource is recorded under the requested URL
    assert_eq!(resource.url, url);
    assert_eq!(resource.body, b"moved");
}

#[tokio::test]
async fn test_relative_redirect_resolves_against_current_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/race/list/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "20181010/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/race/list/20181010/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("day", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/race/list/", server.uri());
    let resource = downloader().fetch(&url).await.unwrap();

    assert_eq!(resource.url, url);
    assert_eq!(resource.body, b"day");
}

#[tokio::test]
async fn test_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/unchanged"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;

    let downloader = downloader();
    for (route, expected) in [("/missing", 404), ("/broken", 500), ("/unchanged", 304)] {
        let error = downloader
            .fetch(&format!("{}{}", server.uri(), route))
            .await
            .unwrap_err();
        assert!(
            matches!(error, DownloadError::Status { .. }),
            "{} gave {:?}",
            route,
            error
        );
        assert_eq!(error.status(), Some(expected));
    }
}

#[tokio::test]
async fn test_redirect_loop_is_detected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/b"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/a"))
        .mount(&server)
        .await;

    let error = downloader()
        .fetch(&format!("{}/a", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(error, DownloadError::RedirectLoop { .. }));
}

#[tokio::test]
async fn test_redirect_limit() {
    let server = MockServer::start().await;
    for hop in 0..5 {
        Mock::given(method("GET"))
            .and(path(format!("/hop{}", hop)))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", format!("/hop{}", hop + 1).as_str()),
            )
            .mount(&server)
            .await;
    }

    let error = downloader()
        .fetch(&format!("{}/hop0", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(error, DownloadError::RedirectLimit { .. }));
}

#[tokio::test]
async fn test_slow_response_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("late", "text/html")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let error = downloader()
        .fetch(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();
    assert!(error.is_timeout(), "expected timeout, got {:?}", error);
}

#[tokio::test]
async fn test_invalid_url() {
    let error = downloader().fetch("not a url").await.unwrap_err();
    assert!(matches!(error, DownloadError::InvalidUrl { .. }));
}
