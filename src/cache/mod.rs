//! Versioned, compressed, content-addressed object cache
//!
//! This module stores every fetched resource as a JSON envelope, wrapped in a
//! compression envelope, under a key derived from the SHA-256 of its URL:
//! - `key.rs`: key derivation and the object path layout
//! - `codec.rs`: the compression envelope
//! - `envelope.rs`: the `CachedObject` JSON envelope
//! - `store.rs`: `CacheStore` (latest + immutable snapshot writes, paged listing)
//! - `backend/`: the `ObjectStore` trait and its filesystem/in-memory backends

pub mod backend;
mod codec;
mod envelope;
mod key;
mod store;

pub use backend::{FsObjectStore, ListPage, MemoryObjectStore, ObjectStore};
pub use codec::Compression;
pub use envelope::CachedObject;
pub use key::{cache_key, ObjectLayout};
pub use store::{CacheStore, ObjectStream, PutOutcome};

use thiserror::Error;

/// Errors that can occur during cache storage operations
///
/// A missing object is never an error; reads report it as `None`.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Corrupt object at {path}: {reason}")]
    Corruption { path: String, reason: String },

    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("Invalid object path: {0:?}")]
    InvalidPath(String),

    #[error("Envelope encoding error: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache storage operations
pub type StorageResult<T> = Result<T, StorageError>;
