//! Core data types for dropfetch
//!
//! This module provides the data model shared by the transport, the ledger and
//! the fetch pipeline: remote listing entries, ledger records, per-entry
//! outcomes and run statistics.

use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A file entry from the remote folder listing
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteFileEntry {
    /// Canonical lowercase path on the remote store
    pub remote_path: String,
    /// Original-case file name
    pub display_name: String,
    /// Hex content hash declared by the remote store
    pub content_hash: String,
}

impl RemoteFileEntry {
    /// Create a new remote file entry
    pub fn new(
        remote_path: impl Into<String>,
        display_name: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            remote_path: remote_path.into(),
            display_name: display_name.into(),
            content_hash: content_hash.into(),
        }
    }
}

/// One item returned by a remote folder listing
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RemoteEntry {
    /// A regular file
    File(RemoteFileEntry),
    /// Anything that is not a file (folders, deleted markers, ...)
    Other {
        /// Canonical lowercase path of the entry
        path: String,
        /// Entry type as reported by the remote store
        tag: String,
    },
}

impl RemoteEntry {
    /// Remote path of the entry regardless of its type
    pub fn path(&self) -> &str {
        match self {
            Self::File(file) => &file.remote_path,
            Self::Other { path, .. } => path,
        }
    }

    /// Borrow the file entry if this is a file
    pub fn as_file(&self) -> Option<&RemoteFileEntry> {
        match self {
            Self::File(file) => Some(file),
            Self::Other { .. } => None,
        }
    }
}

/// One page of a remote folder listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ListPage {
    /// Entries on this page
    pub entries: Vec<RemoteEntry>,
    /// Cursor for requesting the next page
    pub cursor: String,
    /// Whether more pages remain
    pub has_more: bool,
}

/// A durable record of a successfully fetched file
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LedgerRecord {
    /// Final on-disk file name after collision resolution
    pub local_file_name: String,
    /// Remote path the file was fetched from
    pub remote_path: String,
    /// Remote file name (original case)
    pub remote_file_name: String,
    /// Hex SHA-256 of the whole file
    pub sha256: String,
    /// Hex remote content hash
    pub remote_content_hash: String,
    /// When the record was created
    pub downloaded_at: DateTime<Utc>,
}

impl LedgerRecord {
    /// Create a new record stamped with the current time
    pub fn new(
        local_file_name: impl Into<String>,
        remote_path: impl Into<String>,
        remote_file_name: impl Into<String>,
        sha256: impl Into<String>,
        remote_content_hash: impl Into<String>,
    ) -> Self {
        Self {
            local_file_name: local_file_name.into(),
            remote_path: remote_path.into(),
            remote_file_name: remote_file_name.into(),
            sha256: sha256.into(),
            remote_content_hash: remote_content_hash.into(),
            downloaded_at: Utc::now(),
        }
    }

    /// Override the creation timestamp
    pub fn with_downloaded_at(mut self, downloaded_at: DateTime<Utc>) -> Self {
        self.downloaded_at = downloaded_at;
        self
    }
}

/// Terminal state of one remote file entry within a run
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FetchOutcome {
    /// Content hash already present in the ledger
    DuplicateSkipped {
        /// Remote path
        remote_path: String,
        /// Remote content hash
        content_hash: String,
    },
    /// The bytes could not be fully written locally
    DownloadFailed {
        /// Remote path
        remote_path: String,
        /// Remote content hash
        content_hash: String,
        /// Local path that was being written
        local_path: PathBuf,
        /// Failure description
        reason: String,
    },
    /// The local bytes did not hash to the remote content hash
    HashMismatch {
        /// Remote path
        remote_path: String,
        /// Remote content hash
        content_hash: String,
        /// Hash computed from the downloaded bytes
        computed_hash: String,
        /// Local path that was purged
        local_path: PathBuf,
    },
    /// Recorded in the ledger and removed from the remote store
    RemoteDeleted {
        /// Remote path
        remote_path: String,
        /// Remote content hash
        content_hash: String,
        /// Verified local file
        local_path: PathBuf,
        /// Number of bytes downloaded
        bytes: u64,
    },
    /// Recorded in the ledger, remote copy left in place
    RemoteDeleteFailed {
        /// Remote path
        remote_path: String,
        /// Remote content hash
        content_hash: String,
        /// Verified local file
        local_path: PathBuf,
        /// Number of bytes downloaded
        bytes: u64,
        /// Failure description
        reason: String,
    },
}

impl FetchOutcome {
    /// Remote path of the entry
    pub fn remote_path(&self) -> &str {
        match self {
            Self::DuplicateSkipped { remote_path, .. }
            | Self::DownloadFailed { remote_path, .. }
            | Self::HashMismatch { remote_path, .. }
            | Self::RemoteDeleted { remote_path, .. }
            | Self::RemoteDeleteFailed { remote_path, .. } => remote_path,
        }
    }

    /// Remote content hash of the entry
    pub fn content_hash(&self) -> &str {
        match self {
            Self::DuplicateSkipped { content_hash, .. }
            | Self::DownloadFailed { content_hash, .. }
            | Self::HashMismatch { content_hash, .. }
            | Self::RemoteDeleted { content_hash, .. }
            | Self::RemoteDeleteFailed { content_hash, .. } => content_hash,
        }
    }

    /// Whether a verified local copy was recorded in the ledger
    pub fn is_local_success(&self) -> bool {
        matches!(
            self,
            Self::RemoteDeleted { .. } | Self::RemoteDeleteFailed { .. }
        )
    }

    /// Short uppercase label used in logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::DuplicateSkipped { .. } => "SKIPPED",
            Self::DownloadFailed { .. } => "DOWNLOAD FAILED",
            Self::HashMismatch { .. } => "HASH MISMATCH",
            Self::RemoteDeleted { .. } => "DELETED",
            Self::RemoteDeleteFailed { .. } => "DELETE FAILED",
        }
    }
}

/// Fetch run statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FetchStats {
    /// Files downloaded, verified and recorded
    pub files_fetched: u64,
    /// Files skipped because the ledger already knew them
    pub duplicates_skipped: u64,
    /// Non-file listing entries skipped
    pub non_file_entries: u64,
    /// Download failures
    pub download_failures: u64,
    /// Post-download hash mismatches
    pub hash_mismatches: u64,
    /// Remote deletions that failed after a local commit
    pub remote_delete_failures: u64,
    /// Total bytes downloaded into verified files
    pub bytes_downloaded: u64,
    /// Total duration of the run
    pub duration: Duration,
}

impl FetchStats {
    /// Create a new empty statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one terminal outcome
    pub fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::DuplicateSkipped { .. } => self.duplicates_skipped += 1,
            FetchOutcome::DownloadFailed { .. } => self.download_failures += 1,
            FetchOutcome::HashMismatch { .. } => self.hash_mismatches += 1,
            FetchOutcome::RemoteDeleted { bytes, .. } => {
                self.files_fetched += 1;
                self.bytes_downloaded += bytes;
            }
            FetchOutcome::RemoteDeleteFailed { bytes, .. } => {
                self.files_fetched += 1;
                self.remote_delete_failures += 1;
                self.bytes_downloaded += bytes;
            }
        }
    }

    /// Number of entries whose processing failed
    pub fn failures(&self) -> u64 {
        self.download_failures + self.hash_mismatches
    }

    /// Calculate the overall transfer rate in bytes per second
    pub fn transfer_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.bytes_downloaded as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}
