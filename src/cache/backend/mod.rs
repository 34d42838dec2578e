//! Object store backends
//!
//! `ObjectStore` is the narrow key/value contract the cache needs from a
//! blob store: get, put, delete and paged listing by prefix. Paths are
//! `/`-separated keys relative to the store root.

mod fs;
mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

use crate::cache::{StorageError, StorageResult};
use async_trait::async_trait;

/// One page of a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Matching paths in ascending lexicographic order
    pub paths: Vec<String>,
    /// Pass as `start_after` to fetch the following page; `None` on the last page
    pub next: Option<String>,
}

/// Unified interface for blob storage backends
///
/// Absence is not an error: `get` returns `Ok(None)` and `delete` of a
/// missing path succeeds.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the backend (for logging only)
    fn name(&self) -> &str;

    /// Reads an object
    async fn get(&self, path: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Creates or overwrites an object
    async fn put(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Checks whether an object exists
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.get(path).await?.is_some())
    }

    /// Lists at most `limit` paths starting with `prefix` and sorting after
    /// `start_after`
    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StorageResult<ListPage>;

    /// Deletes an object
    async fn delete(&self, path: &str) -> StorageResult<()>;
}

/// Validates an object path
///
/// Rejects empty paths, absolute paths, and empty or relative segments so a
/// path can never escape the store root.
pub fn validate_path(path: &str) -> StorageResult<&str> {
    if path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(path)
}

/// Builds a page from an ascending iterator of candidate paths
pub(crate) fn page_from_sorted<I>(candidates: I, limit: usize) -> ListPage
where
    I: IntoIterator<Item = String>,
{
    let limit = limit.max(1);
    let mut paths: Vec<String> = candidates.into_iter().take(limit + 1).collect();
    let next = if paths.len() > limit {
        paths.truncate(limit);
        paths.last().cloned()
    } else {
        None
    };
    ListPage { paths, next }
}
