//! Core type system and error handling for dropfetch
//!
//! This crate provides the foundational types, error handling, and shared data structures
//! used throughout the dropfetch workspace. It includes:
//!
//! - **Error handling**: Error taxonomy classified by kind
//! - **Core types**: Remote listing entries, ledger records, fetch outcomes and statistics
//! - **Traits**: The [`RemoteStore`] capability the fetch pipeline runs against
//!
//! # Features
//!
//! - `serde` (default): Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use dropfetch_types::{FetchOutcome, FetchStats, Result};
//!
//! fn example_operation() -> Result<FetchStats> {
//!     let mut stats = FetchStats::new();
//!     stats.record(&FetchOutcome::DuplicateSkipped {
//!         remote_path: "/inbox/a.txt".to_string(),
//!         content_hash: "00".repeat(32),
//!     });
//!     Ok(stats)
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
pub use result::Result;
pub use traits::*;
pub use types::*;
