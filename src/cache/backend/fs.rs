//! Local filesystem object store

use super::{page_from_sorted, validate_path, ListPage, ObjectStore};
use crate::cache::StorageResult;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

const TEMP_MARKER: &str = ".tmp-";

/// Object store rooted at a local directory
///
/// Each object path maps to a file below the root. Writes land in a sibling
/// temporary file first and are renamed into place, so readers never see a
/// partially written object.
pub struct FsObjectStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl FsObjectStore {
    /// Creates a store rooted at `root`
    ///
    /// The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp_counter: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let path = validate_path(path)?;
        Ok(path.split('/').fold(self.root.clone(), |acc, s| acc.join(s)))
    }

    fn temp_path(&self, target: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        target.with_file_name(format!(
            "{}{}{}-{}",
            name,
            TEMP_MARKER,
            std::process::id(),
            n
        ))
    }

    /// Collects, in ascending order, the first `wanted` object paths that
    /// start with `prefix` and sort after `start_after`
    ///
    /// Directories are visited depth-first in path order and skipped when
    /// none of their paths can qualify, so a page costs a walk of the
    /// directories it touches instead of the whole tree.
    async fn walk_from(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        wanted: usize,
    ) -> StorageResult<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![Entry::Dir(self.root.clone(), String::new())];

        while let Some(entry) = pending.pop() {
            let (dir, relative) = match entry {
                Entry::File(path) => {
                    let after_ok = start_after.map_or(true, |after| path.as_str() > after);
                    if path.starts_with(prefix) && after_ok {
                        found.push(path);
                        if found.len() >= wanted {
                            break;
                        }
                    }
                    continue;
                }
                Entry::Dir(dir, relative) => (dir, relative),
            };

            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let mut children = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child = if relative.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", relative, name)
                };

                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    let subtree = format!("{}/", child);
                    if may_contain(&subtree, prefix, start_after) {
                        children.push(Entry::Dir(entry.path(), child));
                    }
                } else if file_type.is_file() && !name.contains(TEMP_MARKER) {
                    children.push(Entry::File(child));
                }
            }

            // Reverse order so the smallest child is popped first
            children.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
            pending.extend(children);
        }

        Ok(found)
    }
}

/// A pending step of the ordered walk
enum Entry {
    Dir(PathBuf, String),
    File(String),
}

impl Entry {
    /// Every path below a directory starts with `<dir>/`, so sorting
    /// directories by that string keeps the walk in full-path order
    fn sort_key(&self) -> String {
        match self {
            Entry::Dir(_, relative) => format!("{}/", relative),
            Entry::File(path) => path.clone(),
        }
    }
}

/// Whether any path starting with `subtree` can match `prefix` and sort
/// after `start_after`
fn may_contain(subtree: &str, prefix: &str, start_after: Option<&str>) -> bool {
    let prefix_ok = subtree.starts_with(prefix) || prefix.starts_with(subtree);
    let after_ok = match start_after {
        Some(after) => after.starts_with(subtree) || subtree > after,
        None => true,
    };
    prefix_ok && after_ok
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "fs"
    }

    async fn get(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        let file = self.resolve(path)?;
        match fs::read(&file).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path(&file);
        if let Err(e) = fs::write(&temp, data).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &file).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let file = self.resolve(path)?;
        match fs::metadata(&file).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StorageResult<ListPage> {
        let wanted = limit.max(1).saturating_add(1);
        let candidates = self.walk_from(prefix, start_after, wanted).await?;
        Ok(page_from_sorted(candidates, limit))
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let file = self.resolve(path)?;
        match fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
