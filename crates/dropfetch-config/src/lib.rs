//! Configuration management for dropfetch
//!
//! This crate provides layered configuration for a dropfetch run: built-in
//! defaults, an optional YAML/TOML/JSON file, environment variables and
//! command-line overrides, followed by validation.
//!
//! # Features
//!
//! - **Multiple formats**: YAML, TOML and JSON configuration files
//! - **Validation**: Required values and ranges are checked before a run starts
//! - **Environment overrides**: `DROPFETCH_REMOTE__ACCESS_TOKEN` style variables
//! - **Defaults**: Sensible default values for everything except the credential
//!
//! # Examples
//!
//! ```rust,no_run
//! use dropfetch_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("dropfetch.yaml")
//!     .add_env_prefix("DROPFETCH")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Downloading into {}", config.storage.download_dir.display());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Accepted values for [`LoggingConfig::level`]
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for dropfetch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote store configuration
    pub remote: RemoteConfig,
    /// Local storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check that the configuration can drive a fetch run
    pub fn validate(&self) -> ConfigResult<()> {
        if self.remote.access_token.trim().is_empty() {
            return Err(ConfigError::missing_required("remote.access_token"));
        }

        if self.remote.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "Request timeout must be greater than 0",
            ));
        }

        if self.storage.download_dir.as_os_str().is_empty() {
            return Err(ConfigError::missing_required("storage.download_dir"));
        }

        if self.storage.ledger_path.as_os_str().is_empty() {
            return Err(ConfigError::missing_required("storage.ledger_path"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        if self.logging.max_files == 0 {
            return Err(ConfigError::validation(
                "Number of kept log files must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Remote store (Dropbox) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// OAuth2 access token
    pub access_token: String,
    /// Remote folder to drain; the empty string is the root folder
    pub folder_path: String,
    /// Base URL of the RPC endpoints
    pub api_url: String,
    /// Base URL of the content endpoints
    pub content_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl RemoteConfig {
    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            folder_path: String::new(),
            api_url: "https://api.dropboxapi.com".to_string(),
            content_url: "https://content.dropboxapi.com".to_string(),
            request_timeout_secs: 300,
            user_agent: concat!("dropfetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory downloaded files are written into
    pub download_dir: PathBuf,
    /// SQLite ledger file
    pub ledger_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            ledger_path: PathBuf::from("dropfetch.db"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log file path; console only when unset
    pub log_file: Option<PathBuf>,
    /// Number of rotated log files to keep
    pub max_files: usize,
    /// Write the log file as JSON lines
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            max_files: 10,
            json_format: false,
        }
    }
}
