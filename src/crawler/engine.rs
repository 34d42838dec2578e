//! Traversal engine
//!
//! The engine composes the downloader, the cache store, the metadata store and
//! the dispatch table. One call to [`Engine::crawl`] or [`Engine::parse`]
//! walks the link graph breadth-first from a seed URL, one URL at a time, and
//! isolates failures per URL.

use crate::cache::{cache_key, CacheStore, CachedObject, FsObjectStore, StorageError};
use crate::config::{Config, EngineConfig, Strictness};
use crate::crawler::dispatch::DispatchTable;
use crate::crawler::fetcher::{DownloadError, Downloader, FetchedResource, HttpDownloader};
use crate::crawler::frontier::{CrawlReport, Traversal};
use crate::crawler::pacer::Pacer;
use crate::crawler::parser::{Context, Parser};
use crate::crawler::retry::RetryPolicy;
use crate::state::UrlState;
use crate::storage::{
    index_rows, CacheIndexRecord, HeaderRecord, MetadataStore, RelatedLinkRecord,
    SqliteMetadataStore,
};
use crate::{CrawlineError, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Facts and links produced by one accepted visit
struct Visit {
    facts: Context,
    links: Vec<String>,
}

/// Everything the index holds about one cached URL
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub cache_id: i64,
    pub record: CacheIndexRecord,
    pub headers: Vec<HeaderRecord>,
    pub links: Vec<RelatedLinkRecord>,
}

/// Breadth-first harvesting engine
///
/// Owns its dispatch table, so several independently configured engines can
/// coexist in one process.
pub struct Engine {
    downloader: Arc<dyn Downloader>,
    cache: CacheStore,
    metadata: Mutex<Box<dyn MetadataStore>>,
    dispatch: DispatchTable,
    settings: EngineConfig,
    retry: RetryPolicy,
    pacer: tokio::sync::Mutex<Pacer>,
}

impl Engine {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        cache: CacheStore,
        metadata: Box<dyn MetadataStore>,
        dispatch: DispatchTable,
        settings: EngineConfig,
    ) -> Self {
        let pacer = Pacer::new(settings.download_interval());
        Self {
            downloader,
            cache,
            metadata: Mutex::new(metadata),
            dispatch,
            settings,
            retry: RetryPolicy::none(),
            pacer: tokio::sync::Mutex::new(pacer),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Wires an engine from a loaded configuration
    ///
    /// Uses the reqwest downloader, a filesystem object store rooted at
    /// `storage.root` and a SQLite metadata database.
    pub fn from_config(config: &Config, dispatch: DispatchTable) -> Result<Self> {
        let downloader = HttpDownloader::new(&config.downloader)?;
        let backend = Arc::new(FsObjectStore::new(&config.storage.root));
        let cache = CacheStore::from_config(backend, &config.storage)?;
        let metadata = SqliteMetadataStore::new(Path::new(&config.metadata.database_path))?;

        Ok(Self::new(
            Arc::new(downloader),
            cache,
            Box::new(metadata),
            dispatch,
            config.engine.clone(),
        )
        .with_retry(RetryPolicy::from(&config.retry)))
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    /// Crawls the link graph reachable from `seed`
    ///
    /// # Process
    ///
    /// For every URL taken from the frontier:
    /// 1. Resolve its parser
    /// 2. Read the cached copy and ask the parser whether to refetch
    /// 3. Fetch when needed, pacing network attempts
    /// 4. Parse into a scratch context and check validity
    /// 5. Persist the new version and its metadata, if it was fetched
    /// 6. Merge the facts and enqueue unseen related links
    ///
    /// Any failure in steps 2-5 fails only that URL. A URL without a route
    /// fails the URL, or the whole call when `dispatch = "strict"`.
    pub async fn crawl(&self, seed: &str) -> Result<CrawlReport> {
        info!(seed, "Starting crawl");
        let mut traversal = Traversal::new(seed);
        let mut fetches = 0u64;

        while let Some(url) = self.next_url(&mut traversal) {
            enter(&mut traversal, &url, UrlState::Fetching);
            let mut parser = match self.dispatch.resolve(&url) {
                Ok(parser) => parser,
                Err(e) if self.settings.dispatch == Strictness::Strict => {
                    error!(url = %url, "No parser route, aborting");
                    return Err(e);
                }
                Err(e) => {
                    warn!(url = %url, "No parser route");
                    traversal.fail(&url, e.to_string());
                    continue;
                }
            };

            match self
                .visit(&url, parser.as_mut(), &mut traversal, &mut fetches)
                .await
            {
                Ok(visit) => {
                    let added = traversal.succeed(&url, visit.facts, &visit.links);
                    debug!(url = %url, links = visit.links.len(), added, "Visited");
                }
                Err(error) => {
                    warn!(
                        url = %url,
                        stage = ?traversal.state(&url),
                        error = %error,
                        "URL failed"
                    );
                    traversal.fail(&url, error.to_string());
                }
            }
        }

        let report = traversal.into_report(fetches);
        info!(
            seed,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            pending = report.pending.len(),
            fetches = report.fetches,
            "Crawl finished"
        );
        Ok(report)
    }

    /// Re-runs extraction over cached data only, never touching the network
    ///
    /// A URL without cached data aborts the call with
    /// [`CrawlineError::Parse`] when `missing-cache = "strict"`; otherwise it
    /// is skipped and its links are not followed. Extraction failures fail
    /// only their URL.
    pub async fn parse(&self, seed: &str) -> Result<Context> {
        info!(seed, "Starting cache-only parse");
        let mut traversal = Traversal::new(seed);

        while let Some(url) = self.next_url(&mut traversal) {
            enter(&mut traversal, &url, UrlState::Fetching);
            let mut parser = match self.dispatch.resolve(&url) {
                Ok(parser) => parser,
                Err(e) if self.settings.dispatch == Strictness::Strict => {
                    error!(url = %url, "No parser route, aborting");
                    return Err(e);
                }
                Err(e) => {
                    warn!(url = %url, "No parser route");
                    traversal.fail(&url, e.to_string());
                    continue;
                }
            };

            let cached = match self.read_cached(&url).await {
                Ok(cached) => cached,
                Err(e) => {
                    warn!(url = %url, error = %e, "Cache read failed");
                    traversal.fail(&url, e.to_string());
                    continue;
                }
            };

            let resource = match cached {
                Some(resource) => resource,
                None if self.settings.missing_cache == Strictness::Strict => {
                    error!(url = %url, "No cached data, aborting parse");
                    return Err(CrawlineError::Parse {
                        reason: format!("no cached data for {}", url),
                    });
                }
                None => {
                    debug!(url = %url, "No cached data, skipping");
                    traversal.skip(&url);
                    continue;
                }
            };

            enter(&mut traversal, &url, UrlState::Extracting);
            match extract(&url, parser.as_mut(), &resource) {
                Ok(visit) => {
                    traversal.succeed(&url, visit.facts, &visit.links);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Extraction failed");
                    traversal.fail(&url, e.to_string());
                }
            }
        }

        info!(
            seed,
            visited = traversal.visited(),
            skipped = traversal.skipped().len(),
            "Parse finished"
        );
        Ok(traversal.into_context())
    }

    /// Deletes every cached object in the namespace and every metadata row
    ///
    /// Returns the number of objects removed.
    pub async fn purge_all(&self) -> Result<usize> {
        let removed = self.cache.remove_all().await?;
        self.metadata
            .lock()
            .map_err(|_| CrawlineError::LockPoisoned)?
            .purge_all()?;
        info!(removed, "Purged cache and metadata");
        Ok(removed)
    }

    /// Looks up the metadata rows for `url`
    pub fn index_entry(&self, url: &str) -> Result<Option<IndexEntry>> {
        let metadata = self.metadata.lock().map_err(|_| CrawlineError::LockPoisoned)?;
        let Some((cache_id, record)) = metadata.get_cache_record(url)? else {
            return Ok(None);
        };
        Ok(Some(IndexEntry {
            cache_id,
            headers: metadata.get_headers(cache_id)?,
            links: metadata.get_related_links(cache_id)?,
            record,
        }))
    }

    /// Takes the next URL unless the `max-urls` bound is reached
    fn next_url(&self, traversal: &mut Traversal) -> Option<String> {
        if let Some(max_urls) = self.settings.max_urls {
            if traversal.visited() >= max_urls {
                if !traversal.is_done() {
                    info!(max_urls, pending = traversal.pending(), "URL limit reached");
                }
                return None;
            }
        }
        traversal.next()
    }

    /// Runs one URL from `Fetching` up to, but not including, `Persisted`
    ///
    /// On error the URL is left in the stage that failed.
    async fn visit(
        &self,
        url: &str,
        parser: &mut dyn Parser,
        traversal: &mut Traversal,
        fetches: &mut u64,
    ) -> Result<Visit> {
        let (resource, fetched) = match self.read_cached(url).await? {
            Some(cached) if !parser.redownload(Some(&cached)) => {
                debug!(url, "Using cached copy");
                (cached, false)
            }
            _ => {
                let fetched = self.download(url, fetches).await?;
                (CachedObject::from(fetched), true)
            }
        };

        enter(traversal, url, UrlState::Extracting);
        let visit = extract(url, parser, &resource)?;

        if fetched {
            enter(traversal, url, UrlState::Persisting);
            self.persist(&resource, &visit.links).await?;
        }

        Ok(visit)
    }

    /// Reads the cached envelope, treating an unreadable one as absent
    async fn read_cached(&self, url: &str) -> Result<Option<CachedObject>> {
        match self.cache.get_object(url).await {
            Ok(cached) => Ok(cached),
            Err(StorageError::Corruption { path, reason }) => {
                warn!(url, path = %path, reason = %reason, "Ignoring corrupt cache object");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetches `url`, retrying timeouts per the retry policy
    async fn download(
        &self,
        url: &str,
        fetches: &mut u64,
    ) -> std::result::Result<FetchedResource, DownloadError> {
        let mut attempt = 0;
        loop {
            let mut pacer = self.pacer.lock().await;
            pacer.wait().await;
            *fetches += 1;
            let outcome = self.downloader.fetch(url).await;
            pacer.finish();
            drop(pacer);

            match outcome {
                Ok(resource) => return Ok(resource),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Fetch timed out, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Writes the new cache version, then replaces its metadata rows
    ///
    /// The two writes are not atomic with each other; a crash in between
    /// leaves the index one version behind until the URL is fetched again.
    async fn persist(&self, resource: &CachedObject, links: &[String]) -> Result<()> {
        let outcome = self.cache.put_object(resource).await?;
        let key = cache_key(&resource.url);
        let (record, headers, related) = index_rows(resource, &key, links);

        let cache_id = {
            let mut metadata = self.metadata.lock().map_err(|_| CrawlineError::LockPoisoned)?;
            metadata.replace_cache_record(&record, &headers, &related)?
        };

        debug!(
            url = %resource.url,
            snapshot = %outcome.snapshot,
            cache_id,
            "Persisted"
        );
        Ok(())
    }
}

/// Advances `url` to `next`, logging a rejected transition
fn enter(traversal: &mut Traversal, url: &str, next: UrlState) {
    if traversal.advance(url, next) {
        debug!(url, state = %next, "URL state");
    } else {
        warn!(url, state = %next, current = ?traversal.state(url), "Illegal URL state transition");
    }
}

/// Parses into a scratch context so an invalid result leaves no trace
fn extract(url: &str, parser: &mut dyn Parser, resource: &CachedObject) -> Result<Visit> {
    let mut facts = Context::new();
    parser
        .parse(resource, &mut facts)
        .map_err(|e| CrawlineError::Extraction {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !parser.is_valid() {
        return Err(CrawlineError::InvalidExtraction {
            url: url.to_string(),
        });
    }

    Ok(Visit {
        facts,
        links: parser.related_links(),
    })
}
