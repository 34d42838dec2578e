//! The pluggable extraction contract
//!
//! A [`Parser`] is built fresh for every visited URL by the route that
//! matched it. The engine asks it whether the cached copy is stale, runs it
//! over the resource, checks validity and then follows its related links.

use crate::cache::CachedObject;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Shared result of one traversal, keyed by an extraction-defined id
pub type Context = BTreeMap<String, Value>;

/// Errors a parser reports while extracting
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Body of {url} is not valid UTF-8")]
    NotUtf8 { url: String },

    #[error("Malformed resource: {0}")]
    Malformed(String),
}

/// Site-specific extraction unit
///
/// # Contract
///
/// - `redownload` is only consulted when a cached copy exists; the engine
///   always fetches URLs that were never cached.
/// - `parse` must not touch the network. It writes its facts into the
///   context it is handed.
/// - `related_links` reports absolute URLs found by the most recent `parse`.
/// - `is_valid` is checked after `parse`; an invalid result fails the URL,
///   discards its facts and its links, and persists nothing.
pub trait Parser: Send {
    /// Whether the cached copy is stale enough to fetch again
    fn redownload(&self, cached: Option<&CachedObject>) -> bool;

    /// Extracts facts from `resource` into `context`
    fn parse(&mut self, resource: &CachedObject, context: &mut Context) -> Result<(), ParserError>;

    /// URLs to add to the frontier
    fn related_links(&self) -> Vec<String>;

    /// Whether the last `parse` produced an acceptable result
    fn is_valid(&self) -> bool {
        true
    }
}

/// Deep-merges `source` into `target`
///
/// Nested JSON objects are merged key by key; any other value in `source`
/// replaces the value in `target`.
pub fn merge_context(target: &mut Context, source: Context) {
    for (key, value) in source {
        match target.get_mut(&key) {
            Some(existing) => merge_value(existing, value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

fn merge_value(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
