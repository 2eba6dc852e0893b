//! Typed errors for the job watcher pipeline.
//!
//! One enum per failure domain so the orchestrator can decide, per
//! domain, whether the seen-set may still be touched.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reaching or reading the job source.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// Transport failure (DNS, connect, timeout, TLS)
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Source answered with a non-success status
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// Source content could not be understood
    #[error("could not parse job source: {0}")]
    Parse(String),

    /// Local input file could not be read
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure delivering a digest.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The message itself could not be assembled
    #[error("could not build message: {0}")]
    Build(String),

    /// Authentication, connection or timeout failure at the transport
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Failure loading or saving the seen-set.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize seen-set: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Another run holds the seen-set lock
    #[error("could not lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Required settings absent or malformed. Always raised before any
/// network activity.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// A raw posting that cannot become a [`crate::Posting`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidPosting {
    #[error("title {0:?} is shorter than 3 characters")]
    TitleTooShort(String),

    #[error("no keyword matched")]
    NoKeywordMatch,
}

/// Errors that end a run in the `Failed` state.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("collection failed: {0}")]
    Collection(#[from] CollectionError),

    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),
}
