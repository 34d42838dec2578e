//! Ordered URL-pattern to parser routing

use crate::crawler::parser::Parser;
use crate::{CrawlineError, Result};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Builds a fresh parser for a matched URL
pub type ParserFactory = Arc<dyn Fn(&str) -> Box<dyn Parser> + Send + Sync>;

struct Route {
    pattern: Regex,
    factory: ParserFactory,
}

/// Immutable, ordered routing table owned by one engine
///
/// Routes are tried in declaration order and the first pattern matching a URL
/// wins.
///
/// # Example
///
/// ```
/// use crawline::crawler::{DispatchTable, LinkParser};
/// use regex::Regex;
///
/// let follow = Regex::new(r"^https://example\.com/").unwrap();
/// let table = DispatchTable::builder()
///     .route(r"^https://example\.com/", LinkParser::factory(follow, None))
///     .build()
///     .unwrap();
/// assert!(table.resolve("https://example.com/index.html").is_ok());
/// assert!(table.resolve("https://other.org/").is_err());
/// ```
pub struct DispatchTable {
    routes: Vec<Route>,
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder { routes: Vec::new() }
    }

    /// Builds the parser of the first route matching `url`
    pub fn resolve(&self, url: &str) -> Result<Box<dyn Parser>> {
        self.routes
            .iter()
            .find(|route| route.pattern.is_match(url))
            .map(|route| (route.factory)(url))
            .ok_or_else(|| CrawlineError::ParserNotFound {
                url: url.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|route| route.pattern.as_str()))
            .finish()
    }
}

/// Collects routes for a [`DispatchTable`]
///
/// Patterns are compiled in [`build`](Self::build), so a malformed pattern or
/// an empty table fails construction instead of a later lookup.
pub struct DispatchTableBuilder {
    routes: Vec<(String, ParserFactory)>,
}

impl DispatchTableBuilder {
    pub fn route(mut self, pattern: impl Into<String>, factory: ParserFactory) -> Self {
        self.routes.push((pattern.into(), factory));
        self
    }

    pub fn build(self) -> Result<DispatchTable> {
        if self.routes.is_empty() {
            return Err(CrawlineError::EmptyDispatch);
        }

        let routes = self
            .routes
            .into_iter()
            .map(|(pattern, factory)| -> Result<Route> {
                Ok(Route {
                    pattern: Regex::new(&pattern)?,
                    factory,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DispatchTable { routes })
    }
}
