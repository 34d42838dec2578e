use crate::cache::Compression;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Crawline
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
}

/// HTTP downloader configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DownloaderConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Accept header sent with every request
    #[serde(default = "default_accept")]
    pub accept: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum number of redirect hops followed for one fetch
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl DownloaderConfig {
    /// Builds a downloader configuration with default timeouts and limits
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            accept: default_accept(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// How the engine reacts to a per-URL problem that is not a network failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Abort the whole call
    Strict,
    /// Record the URL as failed (or skipped) and keep traversing
    #[default]
    Lenient,
}

/// Traversal engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Minimum delay between two consecutive network fetches (milliseconds)
    #[serde(rename = "download-interval-ms", default = "default_download_interval_ms")]
    pub download_interval_ms: u64,

    /// Behaviour of the read-only `parse` traversal when a URL has no cached data
    #[serde(rename = "missing-cache", default)]
    pub missing_cache: Strictness,

    /// Behaviour when no parser route matches a URL
    #[serde(default)]
    pub dispatch: Strictness,

    /// Upper bound on URLs taken from the frontier in one call
    #[serde(rename = "max-urls", default)]
    pub max_urls: Option<usize>,
}

impl EngineConfig {
    pub fn download_interval(&self) -> Duration {
        Duration::from_millis(self.download_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            download_interval_ms: default_download_interval_ms(),
            missing_cache: Strictness::default(),
            dispatch: Strictness::default(),
            max_urls: None,
        }
    }
}

/// Retry policy for timed-out fetches
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first timeout (0 disables retries)
    #[serde(rename = "max-retries", default)]
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(rename = "backoff-ms", default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Factor applied to the delay after every retry
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound on any single retry delay (milliseconds)
    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: default_backoff_ms(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Object store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the filesystem object store
    pub root: String,

    /// Optional namespace segment prepended to every object key
    #[serde(default)]
    pub suffix: Option<String>,

    /// Compression envelope for stored objects
    #[serde(default)]
    pub compression: Compression,

    /// Number of keys requested per listing page
    #[serde(rename = "list-page-size", default = "default_list_page_size")]
    pub list_page_size: usize,
}

/// Relational metadata store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_accept() -> String {
    "*/*".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    10
}

fn default_download_interval_ms() -> u64 {
    1000
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_list_page_size() -> usize {
    1000
}
