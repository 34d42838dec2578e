//! Integration tests for crawline
//!
//! These tests use wiremock to stand up mock HTTP servers and tempfile for the
//! on-disk object store and SQLite database.

mod crawl_tests;
mod downloader_tests;
