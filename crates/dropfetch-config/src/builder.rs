//! Configuration builder for layered configuration loading

use crate::{Config, ConfigError, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

/// Configuration builder for loading configuration from multiple sources
///
/// Sources are applied in the order they were added, on top of the built-in
/// defaults. Explicit overrides always win.
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    overrides: Vec<(String, String)>,
    env_separator: String,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    Defaults,
    Environment { prefix: String },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            overrides: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add default configuration values
    pub fn add_defaults(mut self) -> Self {
        self.sources.push(ConfigSource::Defaults);
        self
    }

    /// Add a configuration file source, skipped if the file does not exist
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    ///
    /// Variables are named `<PREFIX>_<SECTION><separator><KEY>`, for example
    /// `DROPFETCH_REMOTE__ACCESS_TOKEN`.
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Override a single dotted key such as `storage.download_dir`
    pub fn set_override<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Override a key only when a value is present
    pub fn set_override_option<K: Into<String>, V: Into<String>>(
        self,
        key: K,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.set_override(key, value),
            None => self,
        }
    }

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<Config> {
        let config = self.build_unchecked()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration without validating it
    pub fn build_unchecked(mut self) -> ConfigResult<Config> {
        // Defaults form the base layer so that partial files deserialize
        let defaults = Config::default();
        let defaults_value = serde_yaml::to_value(&defaults)
            .map_err(|e| ConfigError::other(format!("Failed to serialize defaults: {}", e)))?;
        self.inner = self
            .inner
            .add_source(config::Config::try_from(&defaults_value)?);

        for source in &self.sources {
            match source {
                ConfigSource::File { path, format } => {
                    if path.exists() {
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix)
                            .prefix_separator("_")
                            .separator(&self.env_separator)
                            .try_parsing(true),
                    );
                }
                ConfigSource::Defaults => {
                    // Already the base layer
                }
            }
        }

        for (key, value) in &self.overrides {
            self.inner = self.inner.set_override(key.as_str(), value.as_str())?;
        }

        let config = self.inner.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Detect file format from extension
    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("toml") => FileFormat::Toml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().add_defaults().build_unchecked().unwrap();
        assert_eq!(config.remote.api_url, "https://api.dropboxapi.com");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_builder_defaults_fail_validation() {
        let result = ConfigBuilder::new().add_defaults().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_yaml_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
remote:
  access_token: sl.from-file
  folder_path: /Camera Uploads
storage:
  download_dir: /srv/photos
"#
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert_eq!(config.remote.access_token, "sl.from-file");
        assert_eq!(config.remote.folder_path, "/Camera Uploads");
        assert_eq!(config.storage.download_dir, PathBuf::from("/srv/photos"));
        assert_eq!(config.storage.ledger_path, PathBuf::from("dropfetch.db"));
    }

    #[test]
    fn test_builder_toml_file() {
        let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            temp_file,
            r#"
[remote]
access_token = "sl.toml"
request_timeout_secs = 30

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert_eq!(config.remote.request_timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_overrides_win_over_files() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "remote:\n  access_token: sl.file\n").unwrap();

        let config = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .set_override("remote.access_token", "sl.cli")
            .set_override_option("storage.ledger_path", Some("/var/lib/dropfetch.db"))
            .set_override_option::<_, String>("logging.log_file", None)
            .build()
            .unwrap();

        assert_eq!(config.remote.access_token, "sl.cli");
        assert_eq!(
            config.storage.ledger_path,
            PathBuf::from("/var/lib/dropfetch.db")
        );
        assert!(config.logging.log_file.is_none());
    }

    #[test]
    fn test_environment_source() {
        std::env::set_var("DROPFETCH_BUILDER_TEST_REMOTE__ACCESS_TOKEN", "sl.env");
        std::env::set_var("DROPFETCH_BUILDER_TEST_LOGGING__MAX_FILES", "3");

        let config = ConfigBuilder::new()
            .add_defaults()
            .add_env_prefix("DROPFETCH_BUILDER_TEST")
            .build()
            .unwrap();

        assert_eq!(config.remote.access_token, "sl.env");
        assert_eq!(config.logging.max_files, 3);
    }

    #[test]
    fn test_builder_validation() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
remote:
  access_token: sl.token
logging:
  level: loud
"#
        )
        .unwrap();

        let result = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Log level must be one of"));
    }
}
