//! Run report

use chrono::{DateTime, Utc};
use dropfetch_types::{FetchOutcome, FetchStats};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Summary of one walk over a remote folder
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    /// Identifier of this run
    pub run_id: Uuid,
    /// Remote folder that was walked
    pub folder: String,
    /// When the walk started
    pub started_at: DateTime<Utc>,
    /// Aggregated counters
    pub stats: FetchStats,
    /// Terminal outcome of every file entry, in listing order
    pub outcomes: Vec<FetchOutcome>,
    /// Why the walk stopped early, if it did
    pub aborted: Option<String>,
}

impl FetchReport {
    /// Start an empty report
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            folder: folder.into(),
            started_at: Utc::now(),
            stats: FetchStats::new(),
            outcomes: Vec::new(),
            aborted: None,
        }
    }

    /// Add a terminal outcome
    pub fn record(&mut self, outcome: FetchOutcome) {
        self.stats.record(&outcome);
        self.outcomes.push(outcome);
    }

    /// Count a skipped non-file entry
    pub fn record_non_file(&mut self) {
        self.stats.non_file_entries += 1;
    }

    /// Mark the walk as stopped before the listing was exhausted
    pub fn abort(&mut self, reason: impl Into<String>) {
        self.aborted = Some(reason.into());
    }

    /// Stamp the total duration
    pub fn finish(&mut self, duration: Duration) {
        self.stats.duration = duration;
    }

    /// Whether the whole listing was processed
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    /// Outcomes that left no verified local copy or left the remote copy in place
    pub fn problems(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.outcomes.iter().filter(|outcome| {
            matches!(
                outcome,
                FetchOutcome::DownloadFailed { .. }
                    | FetchOutcome::HashMismatch { .. }
                    | FetchOutcome::RemoteDeleteFailed { .. }
            )
        })
    }
}
