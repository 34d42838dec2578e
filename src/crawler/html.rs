//! HTML title and link extraction
//!
//! Followed:
//! - `<a href="...">` anywhere in the document, including `rel="nofollow"`
//! - `<link rel="canonical" href="...">`
//!
//! Skipped:
//! - `<a download>` links
//! - `javascript:`, `mailto:`, `tel:` and `data:` targets
//! - fragment-only targets
//! - anything that does not resolve to http(s)

use scraper::{Html, Selector};
use url::Url;

/// Title and outgoing links of one HTML document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub title: Option<String>,
    /// Absolute URLs in document order, duplicates removed
    pub links: Vec<String>,
}

/// Extracts the title and absolute outgoing links of `html`
///
/// # Example
///
/// ```
/// use crawline::crawler::summarize_html;
/// use url::Url;
///
/// let html = r#"<title>Results</title><a href="race/1">Race 1</a>"#;
/// let base = Url::parse("https://example.com/day/").unwrap();
/// let page = summarize_html(html, &base);
/// assert_eq!(page.title.as_deref(), Some("Results"));
/// assert_eq!(page.links, vec!["https://example.com/day/race/1"]);
/// ```
pub fn summarize_html(html: &str, base_url: &Url) -> PageSummary {
    let document = Html::parse_document(html);
    PageSummary {
        title: title_of(&document),
        links: links_of(&document, base_url),
    }
}

fn title_of(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

fn links_of(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut push = |href: &str| {
        if let Some(link) = absolutize(href, base_url) {
            if !links.contains(&link) {
                links.push(link);
            }
        }
    };

    if let Ok(anchors) = Selector::parse("a[href]") {
        for element in document.select(&anchors) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(canonical) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

/// Resolves `href` against `base_url`, or `None` if it is not followable
fn absolutize(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut resolved = base_url.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
