//! dropfetch integration testing support
//!
//! This crate provides an in-memory remote store and log capture helpers used
//! by the integration tests under `tests/`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// This module provides common utilities used across all test files
/// to ensure consistency and reduce code duplication.
pub mod test_utils;

pub use test_utils::{
    generate_test_data, LogCapture, MockRemoteStore, RemoteCall, TestDataPattern,
};
