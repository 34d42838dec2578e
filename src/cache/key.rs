//! Content-addressed keys and object path layout
//!
//! Objects live at `[suffix/]<shard>/<key>.latest.<ext>` and
//! `[suffix/]<shard>/<key>.<unix_seconds>.<ext>`, where `<shard>` is the first
//! two characters of the key.

use crate::cache::{Compression, StorageError, StorageResult};
use sha2::{Digest, Sha256};

const LATEST_MARKER: &str = "latest";

/// Derives the content-addressed cache key for a URL
///
/// The key is the lowercase hex SHA-256 digest of the URL bytes.
///
/// # Examples
///
/// ```
/// use crawline::cache::cache_key;
///
/// let key = cache_key("https://example.com/");
/// assert_eq!(key.len(), 64);
/// assert_eq!(key, cache_key("https://example.com/"));
/// ```
pub fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// Maps cache keys to object store paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLayout {
    suffix: Option<String>,
    extension: &'static str,
}

impl ObjectLayout {
    pub fn new(suffix: Option<String>, compression: Compression) -> Self {
        Self {
            suffix,
            extension: compression.extension(),
        }
    }

    /// The namespace prefix shared by every object of this layout
    pub fn namespace(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}/", suffix),
            None => String::new(),
        }
    }

    /// Prefix shared by the latest object and all snapshots of `key`
    pub fn key_prefix(&self, key: &str) -> StorageResult<String> {
        let shard = shard(key)?;
        Ok(format!("{}{}/{}.", self.namespace(), shard, key))
    }

    pub fn latest_path(&self, key: &str) -> StorageResult<String> {
        Ok(format!(
            "{}{}.{}",
            self.key_prefix(key)?,
            LATEST_MARKER,
            self.extension
        ))
    }

    pub fn snapshot_path(&self, key: &str, timestamp: i64) -> StorageResult<String> {
        Ok(format!(
            "{}{}.{}",
            self.key_prefix(key)?,
            timestamp,
            self.extension
        ))
    }

    /// Returns true if `path` is `<namespace><shard>/<key>.<version>.<ext>`
    /// for this layout
    ///
    /// Paths of other namespaces never match, even when this layout's
    /// namespace is a prefix of theirs (the unsuffixed namespace is empty).
    pub fn owns(&self, path: &str) -> bool {
        let Some(rest) = path.strip_prefix(&self.namespace()) else {
            return false;
        };
        let Some((dir, file)) = rest.split_once('/') else {
            return false;
        };
        let Some((key, _version)) = file
            .strip_suffix(&format!(".{}", self.extension))
            .and_then(|stem| stem.split_once('.'))
        else {
            return false;
        };
        !file.contains('/') && shard(key).map_or(false, |shard| shard == dir)
    }

    /// Returns true if `path` names a latest object of this layout
    pub fn is_latest(&self, path: &str) -> bool {
        self.owns(path) && path.ends_with(&format!(".{}.{}", LATEST_MARKER, self.extension))
    }

    /// Extracts the snapshot timestamp from a path produced by `snapshot_path`
    pub fn snapshot_timestamp(&self, key: &str, path: &str) -> Option<i64> {
        let prefix = self.key_prefix(key).ok()?;
        path.strip_prefix(&prefix)?
            .strip_suffix(&format!(".{}", self.extension))?
            .parse()
            .ok()
    }
}

/// First two characters of a key, validating the key in the process
fn shard(key: &str) -> StorageResult<&str> {
    if key.len() < 2
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(&key[..2])
}
