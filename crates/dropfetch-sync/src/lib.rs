//! Fetch pipeline for dropfetch
//!
//! This crate holds the core of dropfetch: it drains a remote folder to local
//! disk exactly once per distinct content and removes the remote copy after a
//! verified local copy has been recorded.
//!
//! - **Content hashing**: Dropbox-compatible 4 MiB block hash plus a whole-file SHA-256
//! - **Ledger**: append-only SQLite record keyed by the remote content hash
//! - **Pipeline**: per-file download, verification, commit and remote delete
//! - **Walker**: paginated listing that skips everything that is not a file
//!
//! # Examples
//!
//! ```rust,no_run
//! use dropfetch_sync::{FetchPipeline, FolderWalker, Ledger};
//! use dropfetch_types::RemoteStore;
//!
//! # async fn example(remote: &dyn RemoteStore) -> dropfetch_types::Result<()> {
//! let ledger = Ledger::open("dropfetch.db")?;
//! let pipeline = FetchPipeline::new(remote, &ledger, "downloads");
//! let report = FolderWalker::new(remote, pipeline).walk("/Inbox").await;
//! println!("Fetched {} files", report.stats.files_fetched);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod hasher;
pub mod ledger;
pub mod pipeline;
pub mod report;
pub mod walker;

pub use hasher::{content_hash, hash_file, ContentHasher, FileDigests, BLOCK_SIZE};
pub use ledger::Ledger;
pub use pipeline::{collision_name, FetchPipeline};
pub use report::FetchReport;
pub use walker::FolderWalker;
