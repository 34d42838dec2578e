//! SQLite metadata store implementation

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{MetadataError, MetadataResult, MetadataStore};
use crate::storage::{CacheIndexRecord, HeaderRecord, MessageType, RelatedLinkRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite metadata backend
pub struct SqliteMetadataStore {
    conn: Connection,
}

impl SqliteMetadataStore {
    /// Opens or creates the metadata database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteMetadataStore)` - Database opened and schema initialized
    /// * `Err(MetadataError)` - Failed to open database
    pub fn new(path: &Path) -> MetadataResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> MetadataResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn replace_cache_record(
        &mut self,
        record: &CacheIndexRecord,
        headers: &[HeaderRecord],
        links: &[RelatedLinkRecord],
    ) -> MetadataResult<i64> {
        let tx = self.conn.transaction()?;
        let fetched_at = record.fetched_at.to_rfc3339();

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM cache_index WHERE url = ?1",
                params![record.url],
                |row| row.get(0),
            )
            .optional()?;

        let cache_id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE cache_index SET request_method = ?1, fetched_at = ?2, storage_path = ?3
                     WHERE id = ?4",
                    params![record.request_method, fetched_at, record.storage_path, id],
                )?;
                tx.execute("DELETE FROM cache_headers WHERE cache_id = ?1", params![id])?;
                tx.execute(
                    "DELETE FROM cache_related_links WHERE cache_id = ?1",
                    params![id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO cache_index (url, request_method, fetched_at, storage_path)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        record.url,
                        record.request_method,
                        fetched_at,
                        record.storage_path
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        {
            let mut stmt = tx.prepare(
                "INSERT INTO cache_headers (cache_id, message_type, header_name, header_value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for header in headers {
                stmt.execute(params![
                    cache_id,
                    header.message_type.to_db_string(),
                    header.header_name,
                    header.header_value
                ])?;
            }

            let mut stmt =
                tx.prepare("INSERT INTO cache_related_links (cache_id, url) VALUES (?1, ?2)")?;
            for link in links {
                stmt.execute(params![cache_id, link.url])?;
            }
        }

        tx.commit()?;
        Ok(cache_id)
    }

    fn get_cache_record(&self, url: &str) -> MetadataResult<Option<(i64, CacheIndexRecord)>> {
        let row: Option<(i64, String, String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, url, request_method, fetched_at, storage_path
                 FROM cache_index WHERE url = ?1",
                params![url],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        match row {
            Some((id, url, request_method, fetched_at, storage_path)) => Ok(Some((
                id,
                CacheIndexRecord {
                    url,
                    request_method,
                    fetched_at: parse_timestamp(&fetched_at)?,
                    storage_path,
                },
            ))),
            None => Ok(None),
        }
    }

    fn get_headers(&self, cache_id: i64) -> MetadataResult<Vec<HeaderRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT message_type, header_name, header_value
             FROM cache_headers WHERE cache_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![cache_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(message_type, header_name, header_value)| -> MetadataResult<HeaderRecord> {
                let message_type = MessageType::from_db_string(&message_type).ok_or_else(|| {
                    MetadataError::Invalid(format!("message type {:?}", message_type))
                })?;
                Ok(HeaderRecord {
                    message_type,
                    header_name,
                    header_value,
                })
            })
            .collect()
    }

    fn get_related_links(&self, cache_id: i64) -> MetadataResult<Vec<RelatedLinkRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM cache_related_links WHERE cache_id = ?1 ORDER BY id")?;

        let links = stmt
            .query_map(params![cache_id], |row| {
                Ok(RelatedLinkRecord { url: row.get(0)? })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    fn count_cache_records(&self) -> MetadataResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache_index", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn purge_all(&mut self) -> MetadataResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM cache_related_links", [])?;
        tx.execute("DELETE FROM cache_headers", [])?;
        tx.execute("DELETE FROM cache_index", [])?;
        tx.commit()?;
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> MetadataResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MetadataError::Invalid(format!("fetched_at {:?}: {}", value, e)))
}
