//! Shared core for the job watcher: posting model, keyword and recency
//! filters, the seen-set store, digest rendering and the run pipeline.

pub mod error;
pub mod keywords;
pub mod notify;
pub mod pipeline;
pub mod posting;
pub mod recency;
pub mod seen;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{
    CollectionError, ConfigurationError, InvalidPosting, NotifyError, PersistenceError, RunError,
};
pub use keywords::{DEFAULT_KEYWORDS, KeywordMatch, MatchMode, match_keywords};
pub use notify::{Digest, DigestOptions, Notifier, render_digest};
pub use pipeline::{JobCollector, Pipeline, PipelineConfig, RunState, RunSummary};
pub use posting::{Posting, RawPosting, posting_id, truncate};
pub use recency::{is_recent, is_recent_on};
pub use seen::SeenStore;
