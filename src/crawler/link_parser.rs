//! Generic HTML parser used by the CLI

use crate::cache::CachedObject;
use crate::crawler::dispatch::ParserFactory;
use crate::crawler::html::{summarize_html, PageSummary};
use crate::crawler::parser::{Context, Parser, ParserError};
use chrono::{Duration, Utc};
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use url::Url;

/// Records each page's title and follows links matching a pattern
///
/// Facts are stored under the page URL as
/// `{"title": ..., "links": [...], "fetched_at": <epoch seconds>}`.
/// A cached copy is refetched once it is older than `max_age`; without a
/// max age a cached copy is always reused.
#[derive(Debug, Clone)]
pub struct LinkParser {
    follow: Regex,
    max_age: Option<Duration>,
    summary: Option<PageSummary>,
    is_html: bool,
}

impl LinkParser {
    pub fn new(follow: Regex) -> Self {
        Self {
            follow,
            max_age: None,
            summary: None,
            is_html: false,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// A route factory producing a fresh `LinkParser` per URL
    pub fn factory(follow: Regex, max_age: Option<Duration>) -> ParserFactory {
        Arc::new(move |_url: &str| {
            let parser = LinkParser::new(follow.clone());
            let parser = match max_age {
                Some(max_age) => parser.with_max_age(max_age),
                None => parser,
            };
            Box::new(parser) as Box<dyn Parser>
        })
    }
}

impl Parser for LinkParser {
    fn redownload(&self, cached: Option<&CachedObject>) -> bool {
        match (cached, self.max_age) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(cached), Some(max_age)) => Utc::now() - cached.fetched_at > max_age,
        }
    }

    fn parse(&mut self, resource: &CachedObject, context: &mut Context) -> Result<(), ParserError> {
        self.is_html = resource
            .response_header("content-type")
            .map_or(true, |content_type| {
                content_type.to_ascii_lowercase().contains("html")
            });

        let text = resource.body_text().ok_or_else(|| ParserError::NotUtf8 {
            url: resource.url.clone(),
        })?;
        let base = Url::parse(&resource.url)
            .map_err(|e| ParserError::Malformed(format!("{}: {}", resource.url, e)))?;

        let mut summary = summarize_html(text, &base);
        summary.links.retain(|link| self.follow.is_match(link));

        context.insert(
            resource.url.clone(),
            json!({
                "title": summary.title,
                "links": summary.links,
                "fetched_at": resource.fetched_at.timestamp(),
            }),
        );
        self.summary = Some(summary);
        Ok(())
    }

    fn related_links(&self) -> Vec<String> {
        self.summary
            .as_ref()
            .map(|summary| summary.links.clone())
            .unwrap_or_default()
    }

    fn is_valid(&self) -> bool {
        self.summary.is_some() && self.is_html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn page(url: &str, content_type: Option<&str>, body: &[u8]) -> CachedObject {
        let mut response_headers = BTreeMap::new();
        if let Some(content_type) = content_type {
            response_headers.insert("content-type".to_string(), content_type.to_string());
        }
        CachedObject {
            url: url.to_string(),
            request_method: "GET".to_string(),
            request_headers: BTreeMap::new(),
            response_headers,
            response_body: body.to_vec(),
            fetched_at: Utc.timestamp_opt(1_539_054_231, 0).unwrap(),
        }
    }

    fn follow_example() -> Regex {
        Regex::new(r"^https://example\.com/").unwrap()
    }

    #[test]
    fn test_redownload_policy() {
        let cached = page("https://example.com/", None, b"");
        let fresh = CachedObject {
            fetched_at: Utc::now(),
            ..cached.clone()
        };

        let keep_forever = LinkParser::new(follow_example());
        assert!(keep_forever.redownload(None));
        assert!(!keep_forever.redownload(Some(&cached)));

        let daily = LinkParser::new(follow_example()).with_max_age(Duration::days(1));
        assert!(daily.redownload(Some(&cached)));
        assert!(!daily.redownload(Some(&fresh)));
    }

    #[test]
    fn test_parse_records_title_and_filtered_links() {
        let body = br#"<html><head><title>Top</title></head><body>
            <a href="/a">a</a>
            <a href="https://elsewhere.com/b">b</a>
        </body></html>"#;
        let resource = page("https://example.com/", Some("text/html; charset=UTF-8"), body);
        let mut parser = LinkParser::new(follow_example());
        let mut context = Context::new();

        parser.parse(&resource, &mut context).unwrap();

        assert!(parser.is_valid());
        assert_eq!(parser.related_links(), vec!["https://example.com/a"]);
        assert_eq!(
            context["https://example.com/"],
            json!({
                "title": "Top",
                "links": ["https://example.com/a"],
                "fetched_at": 1_539_054_231
            })
        );
    }

    #[test]
    fn test_non_html_content_is_invalid() {
        let resource = page("https://example.com/data.json", Some("application/json"), b"{}");
        let mut parser = LinkParser::new(follow_example());

        parser.parse(&resource, &mut Context::new()).unwrap();
        assert!(!parser.is_valid());
    }

    #[test]
    fn test_binary_body_is_an_error() {
        let resource = page("https://example.com/img", None, &[0xff, 0xfe, 0x00]);
        let mut parser = LinkParser::new(follow_example());

        let result = parser.parse(&resource, &mut Context::new());
        assert!(matches!(result, Err(ParserError::NotUtf8 { .. })));
        assert!(!parser.is_valid());
        assert!(parser.related_links().is_empty());
    }

    #[test]
    fn test_factory_builds_independent_parsers() {
        let factory = LinkParser::factory(follow_example(), None);
        let mut first = factory("https://example.com/1");
        let second = factory("https://example.com/2");

        let resource = page("https://example.com/1", None, br#"<a href="/x">x</a>"#);
        first.parse(&resource, &mut Context::new()).unwrap();

        assert_eq!(first.related_links().len(), 1);
        assert!(second.related_links().is_empty());
    }
}
