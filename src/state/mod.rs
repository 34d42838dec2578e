//! Per-URL traversal state
//!
//! Every URL taken from the frontier moves through
//! `Queued → Fetching → Extracting → (Persisting →) Persisted`, or drops to
//! `Failed` from any non-terminal stage. States live only for the duration
//! of one traversal call.

mod url_state;

pub use url_state::UrlState;
