//! Test doubles for the collector and notifier seams.

use std::cell::RefCell;

use crate::error::{CollectionError, NotifyError};
use crate::notify::Notifier;
use crate::pipeline::JobCollector;
use crate::posting::{Posting, RawPosting};

/// Returns the same postings on every call.
pub struct StaticCollector {
    postings: Vec<RawPosting>,
}

impl StaticCollector {
    pub fn new(postings: Vec<RawPosting>) -> Self {
        Self { postings }
    }
}

impl JobCollector for StaticCollector {
    fn collect(&self) -> Result<Vec<RawPosting>, CollectionError> {
        Ok(self.postings.clone())
    }
}

/// Always fails as if the job board were unreachable.
pub struct FailingCollector;

impl JobCollector for FailingCollector {
    fn collect(&self) -> Result<Vec<RawPosting>, CollectionError> {
        Err(CollectionError::Status {
            url: "http://jobs.invalid/search".to_string(),
            status: 503,
        })
    }
}

/// Records every batch it is handed.
#[derive(Default)]
pub struct MockNotifier {
    fail: bool,
    batches: RefCell<Vec<Vec<Posting>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose transport always rejects the message.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.batches.borrow().len()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.borrow().iter().map(Vec::len).collect()
    }

    pub fn batches(&self) -> Vec<Vec<Posting>> {
        self.batches.borrow().clone()
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, postings: &[Posting]) -> Result<(), NotifyError> {
        if postings.is_empty() {
            return Ok(());
        }
        self.batches.borrow_mut().push(postings.to_vec());

        if self.fail {
            return Err(NotifyError::Transport("535 authentication failed".into()));
        }
        Ok(())
    }
}
