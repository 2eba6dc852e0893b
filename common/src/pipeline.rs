//! One collect → filter → notify → persist run.
//!
//! State machine:
//!
//! ```text
//! Idle -> Collecting -> Filtering -> Notifying -> Persisting -> Done
//!            |             |            |
//!            +-------------+------------+--------------------> Failed
//! ```
//!
//! The seen-set is written exactly once on every terminal path. Ids are
//! added to it only after the notifier reports success.

use std::collections::HashSet;
use std::fmt;

use chrono::{Local, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::error::{CollectionError, RunError};
use crate::keywords::{MatchMode, match_keywords};
use crate::notify::Notifier;
use crate::posting::{Candidate, Posting, RawPosting};
use crate::recency::is_recent_on;
use crate::seen::SeenStore;

/// Source of raw postings for one run.
pub trait JobCollector {
    fn collect(&self) -> Result<Vec<RawPosting>, CollectionError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Collecting,
    Filtering,
    Notifying,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Filter settings for a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub keywords: Vec<String>,
    pub match_mode: MatchMode,
    pub window_days: u32,
}

/// Counters for a finished run. An `Err` from [`Pipeline::run`] means the
/// run ended in [`RunState::Failed`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Terminal state, `Done` for every returned summary
    pub state: RunState,
    pub collected: usize,
    /// Raw postings rejected by validation
    pub invalid: usize,
    /// Outside the recency window
    pub stale: usize,
    /// No keyword hit
    pub unmatched: usize,
    /// Same id seen earlier in this run
    pub duplicates: usize,
    pub already_seen: usize,
    pub notified: usize,
    /// `false` when the final seen-set write failed
    pub persisted: bool,
}

/// Outcome of the filtering step.
#[derive(Debug, Default)]
pub struct Filtered {
    pub new: Vec<Posting>,
    pub summary: RunSummary,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run against today's local date.
    pub fn run(
        &self,
        collector: &dyn JobCollector,
        notifier: &dyn Notifier,
        store: &mut SeenStore,
    ) -> Result<RunSummary, RunError> {
        self.run_on(collector, notifier, store, Local::now().date_naive())
    }

    /// Run with an explicit reference date for the recency window.
    pub fn run_on(
        &self,
        collector: &dyn JobCollector,
        notifier: &dyn Notifier,
        store: &mut SeenStore,
        today: NaiveDate,
    ) -> Result<RunSummary, RunError> {
        let mut state = RunState::Idle;
        let outcome = self.advance(collector, notifier, store, today, &mut state);

        transition(&mut state, RunState::Persisting);
        let persisted = match store.save() {
            Ok(()) => true,
            Err(e) => {
                error!(
                    error = %e,
                    path = %store.path().display(),
                    "Failed to persist seen-set; sent postings may be emailed again"
                );
                false
            }
        };

        match outcome {
            Ok(mut summary) => {
                summary.persisted = persisted;
                transition(&mut state, RunState::Done);
                summary.state = state;
                info!(
                    collected = summary.collected,
                    notified = summary.notified,
                    already_seen = summary.already_seen,
                    "Run complete"
                );
                Ok(summary)
            }
            Err(e) => {
                transition(&mut state, RunState::Failed);
                error!(error = %e, "Run failed");
                Err(e)
            }
        }
    }

    /// Everything up to, but not including, the seen-set write.
    fn advance(
        &self,
        collector: &dyn JobCollector,
        notifier: &dyn Notifier,
        store: &mut SeenStore,
        today: NaiveDate,
        state: &mut RunState,
    ) -> Result<RunSummary, RunError> {
        transition(state, RunState::Collecting);
        let raw = collector.collect()?;
        info!(count = raw.len(), "Collected raw postings");

        transition(state, RunState::Filtering);
        let Filtered { new, mut summary } = self.filter(&raw, store, today);
        info!(
            matched = new.len() + summary.already_seen,
            new = new.len(),
            "Filtered postings"
        );

        transition(state, RunState::Notifying);
        if new.is_empty() {
            info!("No new jobs to send");
            return Ok(summary);
        }

        notifier.notify(&new)?;
        info!(count = new.len(), "Digest sent");

        for posting in &new {
            store.insert(posting.id.clone());
        }
        summary.notified = new.len();
        Ok(summary)
    }

    /// Recency, validation, keyword and seen-set checks for one batch.
    pub fn filter(&self, raw: &[RawPosting], store: &SeenStore, today: NaiveDate) -> Filtered {
        let mut filtered = Filtered::default();
        filtered.summary.collected = raw.len();
        let mut ids_this_run = HashSet::new();
        let scraped_at = Local::now();

        for item in raw {
            if !is_recent_on(&item.text, self.config.window_days, today) {
                debug!(title = %item.title, "Skipping stale posting");
                filtered.summary.stale += 1;
                continue;
            }

            let candidate = match Candidate::from_raw(item) {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(title = %item.title, error = %e, "Skipping invalid posting");
                    filtered.summary.invalid += 1;
                    continue;
                }
            };

            let matched = match_keywords(
                &candidate.search_text(),
                &self.config.keywords,
                self.config.match_mode,
            );
            let posting = match candidate.into_posting(matched, scraped_at) {
                Ok(posting) => posting,
                Err(_) => {
                    filtered.summary.unmatched += 1;
                    continue;
                }
            };
            debug!(
                title = %posting.title,
                keywords = ?posting.matched_keywords,
                "Posting matches keywords"
            );

            if !ids_this_run.insert(posting.id.clone()) {
                filtered.summary.duplicates += 1;
                continue;
            }

            if store.contains(&posting.id) {
                filtered.summary.already_seen += 1;
                continue;
            }

            filtered.new.push(posting);
        }

        filtered
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "Pipeline state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::posting_id;
    use crate::testing::{FailingCollector, MockNotifier, StaticCollector};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn pipeline(keywords: &[&str]) -> Pipeline {
        Pipeline::new(PipelineConfig {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            match_mode: MatchMode::Substring,
            window_days: 7,
        })
    }

    fn scenario() -> StaticCollector {
        StaticCollector::new(vec![
            RawPosting::new(
                "Herpetology Technician",
                Some("http://x/1".into()),
                "Field crew needed. Published:03/10/2025",
            ),
            RawPosting::new("Accountant", Some("http://x/2".into()), "Ledger work"),
        ])
    }

    fn run_once(
        path: &Path,
        collector: &dyn JobCollector,
        notifier: &MockNotifier,
    ) -> Result<RunSummary, RunError> {
        let mut store = SeenStore::open(path).unwrap();
        pipeline(&["herp"]).run_on(collector, notifier, &mut store, today())
    }

    fn stored_ids(path: &Path) -> Vec<String> {
        SeenStore::open(path).unwrap().ids().to_vec()
    }

    #[test]
    fn test_end_to_end_single_match() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_jobs.json");
        let notifier = MockNotifier::new();

        let summary = run_once(&path, &scenario(), &notifier).unwrap();

        assert_eq!(notifier.batch_sizes(), vec![1]);
        assert_eq!(notifier.batches()[0][0].title, "Herpetology Technician");
        assert_eq!(summary.collected, 2);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.notified, 1);
        assert!(summary.persisted);
        assert_eq!(summary.state, RunState::Done);
        assert_eq!(
            stored_ids(&path),
            vec![posting_id("Herpetology Technician", "http://x/1")]
        );
    }

    #[test]
    fn test_second_run_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_jobs.json");
        let notifier = MockNotifier::new();

        run_once(&path, &scenario(), &notifier).unwrap();
        let second = run_once(&path, &scenario(), &notifier).unwrap();

        assert_eq!(notifier.call_count(), 1);
        assert_eq!(second.notified, 0);
        assert_eq!(second.already_seen, 1);
        assert_eq!(stored_ids(&path).len(), 1);
    }

    #[test]
    fn test_prepopulated_seen_set_skips_notify() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_jobs.json");
        {
            let mut store = SeenStore::open(&path).unwrap();
            store.insert(posting_id("Herpetology Technician", "http://x/1"));
            store.save().unwrap();
        }
        let notifier = MockNotifier::new();

        let summary = run_once(&path, &scenario(), &notifier).unwrap();

        assert_eq!(notifier.call_count(), 0);
        assert_eq!(summary.notified, 0);
        assert_eq!(summary.already_seen, 1);
        assert_eq!(summary.state, RunState::Done);
        assert!(summary.persisted);
    }

    #[test]
    fn test_notify_failure_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_jobs.json");
        {
            let mut store = SeenStore::open(&path).unwrap();
            store.insert("older_posting");
            store.save().unwrap();
        }
        let before = fs::read(&path).unwrap();
        let notifier = MockNotifier::failing();

        let err = run_once(&path, &scenario(), &notifier).unwrap_err();

        assert!(matches!(err, RunError::Notify(_)));
        assert_eq!(notifier.call_count(), 1);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_notify_failure_keeps_escaped_file_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_jobs.json");
        let before = b"[\n  \"T\\u00e9cnico_http:__x_9\"\n]".to_vec();
        fs::write(&path, &before).unwrap();

        run_once(&path, &scenario(), &MockNotifier::failing()).unwrap_err();

        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_notify_failure_keeps_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_jobs.json");
        fs::write(&path, r#"["a", "b","#).unwrap();

        run_once(&path, &scenario(), &MockNotifier::failing()).unwrap_err();

        assert_eq!(fs::read_to_string(&path).unwrap(), r#"["a", "b","#);
    }

    #[test]
    fn test_save_failure_after_send_still_completes() {
        let dir = TempDir::new().unwrap();
        // a directory where the file should be: loads empty, rename fails
        let path = dir.path().join("sent_jobs.json");
        fs::create_dir(&path).unwrap();
        let notifier = MockNotifier::new();

        let summary = run_once(&path, &scenario(), &notifier).unwrap();

        assert_eq!(notifier.call_count(), 1);
        assert_eq!(summary.notified, 1);
        assert_eq!(summary.state, RunState::Done);
        assert!(!summary.persisted);
    }

    #[test]
    fn test_notify_failure_then_retry_sends_again() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_jobs.json");

        run_once(&path, &scenario(), &MockNotifier::failing()).unwrap_err();
        let notifier = MockNotifier::new();
        let summary = run_once(&path, &scenario(), &notifier).unwrap();

        assert_eq!(summary.notified, 1);
        assert_eq!(notifier.call_count(), 1);
    }

    #[test]
    fn test_collection_failure_still_writes_unchanged_set() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_jobs.json");
        let notifier = MockNotifier::new();

        let err = run_once(&path, &FailingCollector, &notifier).unwrap_err();

        assert!(matches!(err, RunError::Collection(_)));
        assert_eq!(notifier.call_count(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_empty_collection_completes_without_email() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent_jobs.json");
        let notifier = MockNotifier::new();

        let summary = run_once(&path, &StaticCollector::new(vec![]), &notifier).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                state: RunState::Done,
                persisted: true,
                ..Default::default()
            }
        );
        assert_eq!(notifier.call_count(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_filter_skips_bad_and_stale_postings() {
        let dir = TempDir::new().unwrap();
        let store = SeenStore::open(dir.path().join("sent_jobs.json")).unwrap();
        let raw = vec![
            RawPosting::new("ab", None, "herp"),
            RawPosting::new("Turtle Tech", None, "herp Published:01/01/2020"),
            RawPosting::new("Herp Lead", None, "posted 2 days ago"),
            RawPosting::new("Herp Lead", None, "same listing again"),
        ];

        let filtered = pipeline(&["herp"]).filter(&raw, &store, today());

        assert_eq!(filtered.new.len(), 1);
        assert_eq!(filtered.new[0].url, crate::posting::UNKNOWN_URL);
        assert_eq!(filtered.summary.invalid, 1);
        assert_eq!(filtered.summary.stale, 1);
        assert_eq!(filtered.summary.duplicates, 1);
    }

    #[test]
    fn test_filter_matches_against_description() {
        let dir = TempDir::new().unwrap();
        let store = SeenStore::open(dir.path().join("sent_jobs.json")).unwrap();
        let raw = vec![RawPosting::new(
            "Seasonal Technician",
            Some("http://x/3".into()),
            "Sea turtle nest monitoring",
        )];

        let filtered = pipeline(&["herp", "TURTLE"]).filter(&raw, &store, today());

        assert_eq!(filtered.new[0].matched_keywords, vec!["TURTLE"]);
    }
}
