//! Database schema definitions

/// SQL schema for the metadata database
pub const SCHEMA_SQL: &str = r#"
-- One row per cached URL, mirroring its latest version
CREATE TABLE IF NOT EXISTS cache_index (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    request_method TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    storage_path TEXT NOT NULL
);

-- Request and response headers of the latest version
CREATE TABLE IF NOT EXISTS cache_headers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cache_id INTEGER NOT NULL REFERENCES cache_index(id) ON DELETE CASCADE,
    message_type TEXT NOT NULL,
    header_name TEXT NOT NULL,
    header_value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_headers_cache ON cache_headers(cache_id);

-- Outgoing links reported for the latest version
CREATE TABLE IF NOT EXISTS cache_related_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cache_id INTEGER NOT NULL REFERENCES cache_index(id) ON DELETE CASCADE,
    url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_related_links_cache ON cache_related_links(cache_id);
"#;

/// Initializes the database schema
///
/// Safe to run against an already initialized database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
