//! Configuration module for Crawline
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use crawline::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawline.toml")).unwrap();
//! println!("Pause between fetches: {}ms", config.engine.download_interval_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DownloaderConfig, EngineConfig, MetadataConfig, RetryConfig, StorageConfig,
    Strictness,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};

pub(crate) use validation::validate_suffix;
