//! Error types and handling for dropfetch
//!
//! This module provides the error taxonomy shared by every dropfetch crate.
//! Errors are classified by [`ErrorKind`], which is what structured log events
//! report when a run stops early.

use std::path::PathBuf;

/// Main error type for dropfetch operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Local path could not be used
    #[error("Path error for '{path}': {message}")]
    Path {
        /// Offending path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Remote store transport error (listing, download or delete)
    #[error("Remote error during {operation}: {message}")]
    Remote {
        /// Remote operation that failed
        operation: String,
        /// Error message describing the transport issue
        message: String,
    },

    /// Ledger storage error
    #[error("Ledger error: {message}")]
    Ledger {
        /// Error message from the storage backend
        message: String,
    },

    /// Downloaded content does not match the remote content hash
    #[error("Content hash mismatch: expected {expected}, computed {actual}")]
    Integrity {
        /// Hash declared by the remote store
        expected: String,
        /// Hash computed from the local bytes
        actual: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O and local path errors
    Io,
    /// Configuration errors
    Config,
    /// Remote transport errors
    Remote,
    /// Ledger storage errors
    Ledger,
    /// Integrity (hash mismatch) errors
    Integrity,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::Path { .. } => ErrorKind::Io,
            Self::Config { .. } => ErrorKind::Config,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Ledger { .. } => ErrorKind::Ledger,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new remote transport error
    pub fn remote<O: Into<String>, S: Into<String>>(operation: O, message: S) -> Self {
        Self::Remote {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a new ledger error
    pub fn ledger<S: Into<String>>(message: S) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }

    /// Create a new path error
    pub fn path<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new integrity error
    pub fn integrity<S: Into<String>>(expected: S, actual: S) -> Self {
        Self::Integrity {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
