//! Relational metadata for cached resources
//!
//! Every successful fetch mirrors its most recent cached version into three
//! tables:
//! - `cache_index`: one row per URL (method, fetch time, content key)
//! - `cache_headers`: request and response headers of that version
//! - `cache_related_links`: outgoing links reported by the parser
//!
//! The rows of a URL are replaced wholesale inside one transaction.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteMetadataStore;
pub use traits::{MetadataError, MetadataResult, MetadataStore};

use crate::cache::CachedObject;
use chrono::{DateTime, Utc};

/// Index row mirroring the latest cached version of a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheIndexRecord {
    pub url: String,
    pub request_method: String,
    pub fetched_at: DateTime<Utc>,
    /// Content-addressed key of the cached object
    pub storage_path: String,
}

/// Which half of the HTTP exchange a header belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Request,
    Response,
}

impl MessageType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "request" => Some(Self::Request),
            "response" => Some(Self::Response),
            _ => None,
        }
    }
}

/// One header of a cached exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub message_type: MessageType,
    pub header_name: String,
    pub header_value: String,
}

/// An outgoing link discovered in a cached resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedLinkRecord {
    pub url: String,
}

/// Builds the index, header and link rows describing `object`
///
/// # Arguments
///
/// * `object` - The cached envelope just written
/// * `storage_path` - Content-addressed key the envelope was stored under
/// * `links` - Related links reported by the parser, possibly empty
pub fn index_rows(
    object: &CachedObject,
    storage_path: &str,
    links: &[String],
) -> (CacheIndexRecord, Vec<HeaderRecord>, Vec<RelatedLinkRecord>) {
    let record = CacheIndexRecord {
        url: object.url.clone(),
        request_method: object.request_method.clone(),
        fetched_at: object.fetched_at,
        storage_path: storage_path.to_string(),
    };

    let request = object
        .request_headers
        .iter()
        .map(|(name, value)| (MessageType::Request, name, value));
    let response = object
        .response_headers
        .iter()
        .map(|(name, value)| (MessageType::Response, name, value));
    let headers = request
        .chain(response)
        .map(|(message_type, name, value)| HeaderRecord {
            message_type,
            header_name: name.clone(),
            header_value: value.clone(),
        })
        .collect();

    let links = links
        .iter()
        .map(|url| RelatedLinkRecord { url: url.clone() })
        .collect();

    (record, headers, links)
}
