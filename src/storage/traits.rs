//! Metadata store trait and error types

use crate::storage::{CacheIndexRecord, HeaderRecord, RelatedLinkRecord};
use thiserror::Error;

/// Errors that can occur during metadata operations
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid stored value: {0}")]
    Invalid(String),
}

/// Result type for metadata operations
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Relational mirror of the cache
///
/// Implementations own their connection, so mutating calls take `&mut self`
/// and callers serialize access.
pub trait MetadataStore: Send {
    /// Replaces every row describing `record.url`
    ///
    /// The index row is inserted or updated in place, its previous header and
    /// link rows are deleted, and the new rows are inserted, all in one
    /// transaction.
    ///
    /// # Returns
    ///
    /// The id of the index row
    fn replace_cache_record(
        &mut self,
        record: &CacheIndexRecord,
        headers: &[HeaderRecord],
        links: &[RelatedLinkRecord],
    ) -> MetadataResult<i64>;

    /// Gets the index row for a URL with its id
    fn get_cache_record(&self, url: &str) -> MetadataResult<Option<(i64, CacheIndexRecord)>>;

    /// Gets the header rows of an index row in insertion order
    fn get_headers(&self, cache_id: i64) -> MetadataResult<Vec<HeaderRecord>>;

    /// Gets the related link rows of an index row in insertion order
    fn get_related_links(&self, cache_id: i64) -> MetadataResult<Vec<RelatedLinkRecord>>;

    /// Counts index rows
    fn count_cache_records(&self) -> MetadataResult<u64>;

    /// Deletes every row of every table
    fn purge_all(&mut self) -> MetadataResult<()>;
}
