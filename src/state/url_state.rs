use std::fmt;

/// Stage of one URL within a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    /// Waiting in the frontier
    Queued,

    /// Resolving a parser and obtaining the resource, from cache or network
    Fetching,

    /// Running the parser over the resource
    Extracting,

    /// Writing the new cache version and its metadata
    Persisting,

    /// Done; the URL counts as succeeded
    Persisted,

    /// Done; the URL counts as failed
    Failed,
}

impl UrlState {
    /// Returns true if no further processing happens in this traversal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Persisted | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// A cache hit goes straight from `Extracting` to `Persisted` because
    /// nothing new is written. There is no retry edge: terminal states have no
    /// successors.
    pub fn can_transition_to(&self, next: UrlState) -> bool {
        use UrlState::*;
        match (self, next) {
            (Queued, Fetching) => true,
            (Fetching, Extracting) => true,
            (Extracting, Persisting) | (Extracting, Persisted) => true,
            (Persisting, Persisted) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
