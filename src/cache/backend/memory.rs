//! In-memory object store

use super::{page_from_sorted, validate_path, ListPage, ObjectStore};
use crate::cache::StorageResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use tokio::sync::RwLock;

/// In-memory object store
///
/// Objects are kept in a `BTreeMap` behind a [`RwLock`], so listing is
/// naturally ordered and all trait methods work on `&self`. Used by tests
/// and for throwaway runs that need no persistence.
///
/// # Examples
///
/// ```
/// use crawline::cache::{MemoryObjectStore, ObjectStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryObjectStore::default();
/// store.put("ab/abc.latest.gz", b"data").await?;
/// assert!(store.exists("ab/abc.latest.gz").await?);
/// # Ok(())
/// # }
/// ```
pub struct MemoryObjectStore {
    name: String,
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// All stored paths, in order
    pub async fn paths(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = validate_path(path)?;
        Ok(self.objects.read().await.get(path).cloned())
    }

    async fn put(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let path = validate_path(path)?;
        self.objects
            .write()
            .await
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let path = validate_path(path)?;
        Ok(self.objects.read().await.contains_key(path))
    }

    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StorageResult<ListPage> {
        let objects = self.objects.read().await;
        let lower = match start_after {
            Some(after) => Bound::Excluded(after.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        let candidates = objects
            .range((lower, Bound::Unbounded))
            .map(|(path, _)| path)
            .skip_while(|path| path.as_str() < prefix)
            .take_while(|path| path.starts_with(prefix))
            .cloned();
        Ok(page_from_sorted(candidates, limit))
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let path = validate_path(path)?;
        self.objects.write().await.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryObjectStore::default();
        assert_eq!(store.get("ab/missing.latest.gz").await.unwrap(), None);
        assert!(!store.exists("ab/missing.latest.gz").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryObjectStore::default();
        store.put("ab/k.latest.gz", b"one").await.unwrap();
        store.put("ab/k.latest.gz", b"two").await.unwrap();

        assert_eq!(
            store.get("ab/k.latest.gz").await.unwrap(),
            Some(b"two".to_vec())
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_pages_through_prefix() {
        let store = MemoryObjectStore::default();
        for path in ["a/1", "b/1", "b/2", "b/3", "c/1"] {
            store.put(path, b"x").await.unwrap();
        }

        let first = store.list_page("b/", None, 2).await.unwrap();
        assert_eq!(first.paths, vec!["b/1", "b/2"]);
        assert_eq!(first.next.as_deref(), Some("b/2"));

        let second = store
            .list_page("b/", first.next.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(second.paths, vec!["b/3"]);
        assert_eq!(second.next, None);
    }

    #[tokio::test]
    async fn test_list_without_prefix_returns_everything() {
        let store = MemoryObjectStore::default();
        for path in ["a/1", "b/1", "c/1"] {
            store.put(path, b"x").await.unwrap();
        }

        let page = store.list_page("", None, 10).await.unwrap();
        assert_eq!(page.paths, vec!["a/1", "b/1", "c/1"]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryObjectStore::default();
        store.put("ab/k.latest.gz", b"one").await.unwrap();

        store.delete("ab/k.latest.gz").await.unwrap();
        store.delete("ab/k.latest.gz").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let store = MemoryObjectStore::default();
        assert!(store.put("../outside", b"x").await.is_err());
    }
}
