//! Crawline: a polite, resumable web harvester
//!
//! This crate implements a breadth-first link-following engine that keeps a
//! versioned, compressed, content-addressed cache of every fetched resource,
//! asks pluggable site-specific parsers whether a cached copy is stale, and
//! records header and link metadata in a relational store.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Crawline operations
#[derive(Debug, Error)]
pub enum CrawlineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Download error: {0}")]
    Download(#[from] crawler::DownloadError),

    #[error("Cache storage error: {0}")]
    Storage(#[from] cache::StorageError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] storage::MetadataError),

    #[error("No parser registered for {url}")]
    ParserNotFound { url: String },

    #[error("Parse error: {reason}")]
    Parse { reason: String },

    #[error("Extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("Extraction result for {url} is invalid")]
    InvalidExtraction { url: String },

    #[error("Invalid dispatch pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Dispatch table has no routes")]
    EmptyDispatch,

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Metadata store lock poisoned")]
    LockPoisoned,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Crawline operations
pub type Result<T> = std::result::Result<T, CrawlineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::{cache_key, CacheStore, CachedObject, Compression};
pub use config::Config;
pub use crawler::{
    Context, CrawlReport, DispatchTable, Downloader, Engine, FetchedResource, HttpDownloader,
    Parser,
};
pub use state::UrlState;
pub use storage::{MetadataStore, SqliteMetadataStore};
