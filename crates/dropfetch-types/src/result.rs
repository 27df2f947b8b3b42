//! Result type alias for dropfetch operations

use crate::Error;

/// Result type alias for dropfetch operations
pub type Result<T> = std::result::Result<T, Error>;
