//! Versioned cache store over an object store backend

use crate::cache::{
    cache_key, CachedObject, Compression, ObjectLayout, ObjectStore, StorageError, StorageResult,
};
use crate::config::{validate_suffix, StorageConfig};
use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of paths requested per listing page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Lazily decoded sequence of latest objects
pub type ObjectStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<Vec<u8>>> + Send + 'a>>;

/// Paths written by a successful `put`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    /// The overwritten `<key>.latest.<ext>` object
    pub latest: String,
    /// The new immutable `<key>.<version>.<ext>` snapshot
    pub snapshot: String,
    /// Unix seconds recorded in the snapshot name
    pub version: i64,
}

/// Content-addressed, compressed, versioned object cache
///
/// Every write produces an overwritten latest object and a new immutable
/// snapshot. Reads only ever see the latest object; a missing latest object
/// means the key was never cached.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn ObjectStore>,
    layout: ObjectLayout,
    compression: Compression,
    page_size: usize,
}

impl CacheStore {
    /// Creates a store without a namespace
    pub fn new(backend: Arc<dyn ObjectStore>, compression: Compression) -> Self {
        Self {
            backend,
            layout: ObjectLayout::new(None, compression),
            compression,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Creates a store from the `[storage]` config section
    pub fn from_config(backend: Arc<dyn ObjectStore>, config: &StorageConfig) -> StorageResult<Self> {
        let store = Self::new(backend, config.compression).with_page_size(config.list_page_size);
        match &config.suffix {
            Some(suffix) => store.with_suffix(suffix),
            None => Ok(store),
        }
    }

    /// Isolates every key of this store below `suffix/`
    pub fn with_suffix(mut self, suffix: &str) -> StorageResult<Self> {
        validate_suffix(suffix).map_err(|_| StorageError::InvalidPath(suffix.to_string()))?;
        self.layout = ObjectLayout::new(Some(suffix.to_string()), self.compression);
        Ok(self)
    }

    /// Sets how many paths are requested from the backend per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn layout(&self) -> &ObjectLayout {
        &self.layout
    }

    /// Stores a new version of `key`, stamped with the current time
    pub async fn put(&self, key: &str, bytes: &[u8]) -> StorageResult<PutOutcome> {
        self.put_at(key, bytes, Utc::now()).await
    }

    /// Stores a new version of `key`, stamped with `at`
    ///
    /// The compressed payload is verified before anything is written. If a
    /// snapshot already exists for the second of `at`, the version is bumped
    /// until a free one is found, so snapshots are never overwritten.
    pub async fn put_at(
        &self,
        key: &str,
        bytes: &[u8],
        at: DateTime<Utc>,
    ) -> StorageResult<PutOutcome> {
        let latest = self.layout.latest_path(key)?;
        let wrapped = self.wrap_verified(key, &latest, bytes)?;

        let mut version = at.timestamp();
        let mut snapshot = self.layout.snapshot_path(key, version)?;
        while self.backend.exists(&snapshot).await? {
            version += 1;
            snapshot = self.layout.snapshot_path(key, version)?;
        }

        self.backend.put(&snapshot, &wrapped).await?;
        self.backend.put(&latest, &wrapped).await?;
        debug!(
            backend = self.backend.name(),
            key,
            snapshot = %snapshot,
            "Stored cache object"
        );

        Ok(PutOutcome {
            latest,
            snapshot,
            version,
        })
    }

    fn wrap_verified(&self, key: &str, path: &str, bytes: &[u8]) -> StorageResult<Vec<u8>> {
        let wrapped = self
            .compression
            .wrap(key, bytes)
            .map_err(|e| corruption(path, format!("compression failed: {}", e)))?;
        let restored = self
            .compression
            .unwrap(&wrapped)
            .map_err(|e| corruption(path, format!("verification failed: {}", e)))?;
        if restored != bytes {
            return Err(corruption(path, "compressed payload does not round-trip"));
        }
        Ok(wrapped)
    }

    /// Reads the latest version of `key`
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let latest = self.layout.latest_path(key)?;
        self.read(&latest).await
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn read(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        match self.backend.get(path).await? {
            Some(wrapped) => self
                .compression
                .unwrap(&wrapped)
                .map(Some)
                .map_err(|e| corruption(path, e.to_string())),
            None => Ok(None),
        }
    }

    /// Streams the latest version of every key in the namespace
    ///
    /// The backend is paged in batches of the configured page size; snapshots
    /// are skipped.
    pub fn list(&self) -> ObjectStream<'_> {
        Box::pin(stream! {
            let prefix = self.layout.namespace();
            let mut start_after: Option<String> = None;

            loop {
                let page = match self
                    .backend
                    .list_page(&prefix, start_after.as_deref(), self.page_size)
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                for path in page.paths.iter().filter(|p| self.layout.is_latest(p)) {
                    match self.read(path).await {
                        Ok(Some(bytes)) => {
                            yield Ok(bytes);
                        }
                        // Deleted between listing and reading
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                        }
                    }
                }

                match page.next {
                    Some(next) => start_after = Some(next),
                    None => break,
                }
            }
        })
    }

    /// Snapshot versions of `key`, oldest first
    pub async fn versions(&self, key: &str) -> StorageResult<Vec<i64>> {
        let mut versions = Vec::new();
        for path in self.paths_with_prefix(&self.layout.key_prefix(key)?).await? {
            if let Some(version) = self.layout.snapshot_timestamp(key, &path) {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Deletes the latest object and every snapshot of `key`
    ///
    /// Returns the number of objects removed.
    pub async fn remove(&self, key: &str) -> StorageResult<usize> {
        let paths = self.paths_with_prefix(&self.layout.key_prefix(key)?).await?;
        self.delete_all(paths).await
    }

    /// Deletes every object in this store's namespace
    ///
    /// Objects of nested namespaces sharing the prefix are left alone.
    pub async fn remove_all(&self) -> StorageResult<usize> {
        let mut paths = self.paths_with_prefix(&self.layout.namespace()).await?;
        paths.retain(|path| self.layout.owns(path));
        self.delete_all(paths).await
    }

    async fn paths_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut paths = Vec::new();
        let mut start_after: Option<String> = None;
        loop {
            let page = self
                .backend
                .list_page(prefix, start_after.as_deref(), self.page_size)
                .await?;
            paths.extend(page.paths);
            match page.next {
                Some(next) => start_after = Some(next),
                None => return Ok(paths),
            }
        }
    }

    async fn delete_all(&self, paths: Vec<String>) -> StorageResult<usize> {
        for path in &paths {
            self.backend.delete(path).await?;
        }
        Ok(paths.len())
    }

    /// Reads the cached envelope for `url`
    ///
    /// An envelope that can no longer be decoded is reported as corruption.
    pub async fn get_object(&self, url: &str) -> StorageResult<Option<CachedObject>> {
        let key = cache_key(url);
        match self.get(&key).await? {
            Some(bytes) => CachedObject::from_json(&bytes).map(Some).map_err(|e| {
                warn!(url, error = %e, "Undecodable cache envelope");
                corruption(&key, e.to_string())
            }),
            None => Ok(None),
        }
    }

    /// Stores `object` as a new version, stamped with its fetch time
    pub async fn put_object(&self, object: &CachedObject) -> StorageResult<PutOutcome> {
        let bytes = object.to_json()?;
        self.put_at(&cache_key(&object.url), &bytes, object.fetched_at)
            .await
    }

    /// Streams every latest envelope in the namespace
    pub fn list_objects(&self) -> impl Stream<Item = StorageResult<CachedObject>> + Send + '_ {
        self.list()
            .map(|item| item.and_then(|bytes| CachedObject::from_json(&bytes)))
    }
}

fn corruption(path: &str, reason: impl Into<String>) -> StorageError {
    StorageError::Corruption {
        path: path.to_string(),
        reason: reason.into(),
    }
}
