//! HTTP downloader
//!
//! This module fetches single resources for the engine:
//! - Building the HTTP client from the `[downloader]` config
//! - Sending every request with a fixed User-Agent/Accept pair
//! - Following redirects manually, reporting the originally requested URL
//! - Classifying failures into status, timeout and transport errors

use crate::cache::CachedObject;
use crate::config::DownloaderConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, LOCATION, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// A fully described fetch, produced by a [`Downloader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    /// The originally requested URL, even when redirects were followed
    pub url: String,
    pub request_method: String,
    pub request_headers: BTreeMap<String, String>,
    pub response_headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl From<FetchedResource> for CachedObject {
    fn from(resource: FetchedResource) -> Self {
        CachedObject {
            url: resource.url,
            request_method: resource.request_method,
            request_headers: resource.request_headers,
            response_headers: resource.response_headers,
            response_body: resource.body,
            fetched_at: resource.fetched_at,
        }
    }
}

/// Errors that can occur while downloading one URL
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Too many redirects fetching {url}")]
    RedirectLimit { url: String },

    #[error("Redirect loop fetching {url}")]
    RedirectLoop { url: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl DownloadError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The HTTP status, for status failures
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Fetches one URL
///
/// Implementations perform no retries; retrying is the caller's policy.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, DownloadError>;
}

/// Builds the HTTP client used by [`HttpDownloader`]
///
/// Redirects are disabled at the client level; the downloader follows them
/// itself so it can detect loops and keep the original URL.
///
/// # Example
///
/// ```no_run
/// use crawline::config::DownloaderConfig;
/// use crawline::crawler::build_http_client;
///
/// let config = DownloaderConfig::new("crawline/1.0 (+https://example.com/about)");
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &DownloaderConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`Downloader`]
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    user_agent: String,
    accept: String,
    max_redirects: usize,
}

impl HttpDownloader {
    pub fn new(config: &DownloaderConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?, config))
    }

    /// Wraps an existing client; it must not follow redirects itself
    pub fn with_client(client: Client, config: &DownloaderConfig) -> Self {
        Self {
            client,
            user_agent: config.user_agent.clone(),
            accept: config.accept.clone(),
            max_redirects: config.max_redirects,
        }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    /// Fetches a URL, following up to `max-redirects` hops
    ///
    /// # Outcome Mapping
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | 2xx | `FetchedResource` for the original URL |
    /// | 3xx with `Location` | Resolve against the current URL and repeat |
    /// | 3xx without `Location` (e.g. 304) | `Status` |
    /// | Any other status | `Status` |
    /// | Connect/read timeout | `Timeout` |
    /// | Revisited redirect target | `RedirectLoop` |
    /// | More hops than allowed | `RedirectLimit` |
    async fn fetch(&self, url: &str) -> Result<FetchedResource, DownloadError> {
        let mut current = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut visited = HashSet::from([current.to_string()]);
        let mut hops = 0;

        loop {
            let request = self
                .client
                .get(current.clone())
                .header(USER_AGENT, &self.user_agent)
                .header(ACCEPT, &self.accept)
                .build()
                .map_err(|e| classify(url, e))?;
            let request_method = request.method().to_string();
            let request_headers = header_map(request.headers());

            let response = self
                .client
                .execute(request)
                .await
                .map_err(|e| classify(url, e))?;
            let status = response.status();

            if status.is_redirection() {
                let location = match response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                {
                    Some(location) => location,
                    None => {
                        return Err(DownloadError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        })
                    }
                };

                let next = current
                    .join(location)
                    .map_err(|e| DownloadError::InvalidUrl {
                        url: location.to_string(),
                        reason: e.to_string(),
                    })?;

                hops += 1;
                if hops > self.max_redirects {
                    return Err(DownloadError::RedirectLimit {
                        url: url.to_string(),
                    });
                }
                if !visited.insert(next.to_string()) {
                    return Err(DownloadError::RedirectLoop {
                        url: url.to_string(),
                    });
                }

                debug!(from = %current, to = %next, status = status.as_u16(), "Following redirect");
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(DownloadError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let response_headers = header_map(response.headers());
            let body = response.bytes().await.map_err(|e| classify(url, e))?;

            return Ok(FetchedResource {
                url: url.to_string(),
                request_method,
                request_headers,
                response_headers,
                body: body.to_vec(),
                fetched_at: Utc::now(),
            });
        }
    }
}

fn classify(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::Timeout {
            url: url.to_string(),
        }
    } else {
        DownloadError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

/// Flattens a header map, joining repeated values with ", "
///
/// Names are lowercase; values that are not visible ASCII are decoded lossily.
fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    map
}
