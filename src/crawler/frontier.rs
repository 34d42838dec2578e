//! Breadth-first traversal state for one `crawl`/`parse` call
//!
//! This module tracks:
//! - The FIFO frontier of URLs still to visit
//! - The `UrlState` of every URL seen, advanced only along legal transitions
//! - Which URLs succeeded and which failed (with the stage they failed in)
//! - The shared result context merged from every accepted extraction

use crate::crawler::parser::{merge_context, Context};
use crate::state::UrlState;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// Why a URL failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// The stage the URL was in when it failed
    pub stage: UrlState,
    pub reason: String,
}

/// Outcome of one traversal
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub failures: BTreeMap<String, Failure>,
    /// URLs still in the frontier when a `max-urls` bound stopped the call
    pub pending: Vec<String>,
    pub context: Context,
    /// Network fetch attempts made, retries included
    pub fetches: u64,
}

impl CrawlReport {
    /// Returns true if every visited URL succeeded and nothing is pending
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.pending.is_empty()
    }
}

/// Frontier plus bookkeeping for one traversal
///
/// A URL is enqueued at most once per traversal: duplicates are suppressed
/// against the pending, succeeded, failed and skipped sets.
#[derive(Debug, Default)]
pub struct Traversal {
    frontier: VecDeque<String>,
    queued: HashSet<String>,
    succeeded: BTreeSet<String>,
    failures: BTreeMap<String, Failure>,
    skipped: BTreeSet<String>,
    states: HashMap<String, UrlState>,
    context: Context,
    visited: usize,
}

impl Traversal {
    pub fn new(seed: &str) -> Self {
        let mut traversal = Self::default();
        traversal.enqueue(seed);
        traversal
    }

    /// Appends `url` to the frontier unless it was already seen
    ///
    /// Returns true if the URL was added.
    pub fn enqueue(&mut self, url: &str) -> bool {
        if self.queued.contains(url)
            || self.succeeded.contains(url)
            || self.failures.contains_key(url)
            || self.skipped.contains(url)
        {
            return false;
        }
        self.queued.insert(url.to_string());
        self.states.insert(url.to_string(), UrlState::Queued);
        self.frontier.push_back(url.to_string());
        true
    }

    /// Pops the next URL to visit
    pub fn next(&mut self) -> Option<String> {
        let url = self.frontier.pop_front()?;
        self.queued.remove(&url);
        self.visited += 1;
        Some(url)
    }

    /// Current state of `url`, if it was ever enqueued
    pub fn state(&self, url: &str) -> Option<UrlState> {
        self.states.get(url).copied()
    }

    /// Moves `url` to `next` if the state machine allows it
    ///
    /// Returns false, leaving the state unchanged, for an unknown URL or an
    /// illegal transition.
    pub fn advance(&mut self, url: &str, next: UrlState) -> bool {
        match self.states.get_mut(url) {
            Some(state) if state.can_transition_to(next) => {
                *state = next;
                true
            }
            _ => false,
        }
    }

    /// Records a successful visit, merging its facts and enqueueing its links
    ///
    /// Returns the number of links newly added to the frontier.
    pub fn succeed(&mut self, url: &str, facts: Context, links: &[String]) -> usize {
        self.advance(url, UrlState::Persisted);
        self.succeeded.insert(url.to_string());
        merge_context(&mut self.context, facts);
        links.iter().filter(|link| self.enqueue(link)).count()
    }

    /// Records a failed visit; its links are never followed
    ///
    /// The failure is attributed to the stage the URL was in.
    pub fn fail(&mut self, url: &str, reason: impl Into<String>) {
        let stage = self.state(url).unwrap_or(UrlState::Queued);
        self.advance(url, UrlState::Failed);
        self.failures.insert(
            url.to_string(),
            Failure {
                stage,
                reason: reason.into(),
            },
        );
    }

    /// Records a visit that produced nothing; its links are never followed
    pub fn skip(&mut self, url: &str) {
        self.states.remove(url);
        self.skipped.insert(url.to_string());
    }

    pub fn skipped(&self) -> &BTreeSet<String> {
        &self.skipped
    }

    /// Number of URLs taken from the frontier so far
    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn pending(&self) -> usize {
        self.frontier.len()
    }

    pub fn is_done(&self) -> bool {
        self.frontier.is_empty()
    }

    pub fn into_context(self) -> Context {
        self.context
    }

    pub fn into_report(self, fetches: u64) -> CrawlReport {
        CrawlReport {
            succeeded: self.succeeded,
            failed: self.failures.keys().cloned().collect(),
            failures: self.failures,
            pending: self.frontier.into_iter().collect(),
            context: self.context,
            fetches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn links(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut traversal = Traversal::new("A");
        assert_eq!(traversal.next().as_deref(), Some("A"));

        traversal.succeed("A", Context::new(), &links(&["B", "C"]));
        assert_eq!(traversal.next().as_deref(), Some("B"));
        assert_eq!(traversal.next().as_deref(), Some("C"));
        assert!(traversal.is_done());
        assert_eq!(traversal.visited(), 3);
    }

    #[test]
    fn test_duplicates_suppressed_against_all_sets() {
        let mut traversal = Traversal::new("A");
        traversal.next();
        assert_eq!(traversal.succeed("A", Context::new(), &links(&["B", "C", "B"])), 2);

        // Pending
        assert!(!traversal.enqueue("C"));

        traversal.next();
        traversal.advance("B", UrlState::Fetching);
        traversal.advance("B", UrlState::Extracting);
        traversal.fail("B", "invalid");
        // Failed and succeeded
        assert!(!traversal.enqueue("B"));
        assert!(!traversal.enqueue("A"));

        traversal.next();
        assert_eq!(traversal.succeed("C", Context::new(), &links(&["A", "B", "C"])), 0);
        assert!(traversal.is_done());
    }

    #[test]
    fn test_self_link_is_not_revisited() {
        let mut traversal = Traversal::new("A");
        traversal.next();

        assert_eq!(traversal.succeed("A", Context::new(), &links(&["A"])), 0);
        assert!(traversal.is_done());
    }

    #[test]
    fn test_skipped_urls_are_not_requeued() {
        let mut traversal = Traversal::new("A");
        traversal.next();
        traversal.skip("A");

        assert!(!traversal.enqueue("A"));
        assert!(traversal.skipped().contains("A"));
    }

    #[test]
    fn test_states_follow_the_lifecycle() {
        let mut traversal = Traversal::new("A");
        assert_eq!(traversal.state("A"), Some(UrlState::Queued));
        traversal.next();

        // No skipping ahead
        assert!(!traversal.advance("A", UrlState::Extracting));
        assert!(traversal.advance("A", UrlState::Fetching));
        assert!(traversal.advance("A", UrlState::Extracting));
        traversal.succeed("A", Context::new(), &links(&["B"]));
        assert_eq!(traversal.state("A"), Some(UrlState::Persisted));

        // Terminal states stay put
        assert!(!traversal.advance("A", UrlState::Failed));
        assert!(!traversal.advance("unknown", UrlState::Fetching));

        traversal.next();
        traversal.advance("B", UrlState::Fetching);
        traversal.advance("B", UrlState::Extracting);
        traversal.advance("B", UrlState::Persisting);
        traversal.fail("B", "disk full");
        assert_eq!(traversal.state("B"), Some(UrlState::Failed));

        let report = traversal.into_report(1);
        assert_eq!(report.failures["B"].stage, UrlState::Persisting);
    }

    #[test]
    fn test_report() {
        let mut traversal = Traversal::new("A");
        traversal.next();

        let mut facts = Context::new();
        facts.insert("A".to_string(), json!({"title": "a"}));
        traversal.succeed("A", facts, &links(&["B", "C"]));

        traversal.next();
        traversal.advance("B", UrlState::Fetching);
        traversal.fail("B", "HTTP 404");

        let report = traversal.into_report(2);

        assert_eq!(report.succeeded, BTreeSet::from(["A".to_string()]));
        assert_eq!(report.failed, BTreeSet::from(["B".to_string()]));
        assert_eq!(report.failures["B"].stage, UrlState::Fetching);
        assert_eq!(report.pending, vec!["C"]);
        assert_eq!(report.context["A"], json!({"title": "a"}));
        assert_eq!(report.fetches, 2);
        assert!(!report.is_complete());
    }
}
