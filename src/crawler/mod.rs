//! Crawler module: fetching, extraction and traversal
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with manual redirect handling (`fetcher.rs`)
//! - Fetch pacing and timeout retries (`pacer.rs`, `retry.rs`)
//! - The parser contract and URL-pattern dispatch (`parser.rs`, `dispatch.rs`)
//! - HTML summarizing and the generic link parser (`html.rs`, `link_parser.rs`)
//! - The breadth-first traversal engine (`frontier.rs`, `engine.rs`)

mod dispatch;
mod engine;
mod fetcher;
mod frontier;
mod html;
mod link_parser;
mod pacer;
mod parser;
mod retry;

pub use dispatch::{DispatchTable, DispatchTableBuilder, ParserFactory};
pub use engine::{Engine, IndexEntry};
pub use fetcher::{build_http_client, DownloadError, Downloader, FetchedResource, HttpDownloader};
pub use frontier::{CrawlReport, Failure, Traversal};
pub use html::{summarize_html, PageSummary};
pub use link_parser::LinkParser;
pub use pacer::Pacer;
pub use parser::{merge_context, Context, Parser, ParserError};
pub use retry::RetryPolicy;
