//! Logging setup for the dropfetch binary

use anyhow::{Context, Result};
use dropfetch_config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Crates whose events honour the configured level; everything else logs warnings only
const OWN_TARGETS: [&str; 5] = [
    "dropfetch",
    "dropfetch_cli",
    "dropfetch_config",
    "dropfetch_remote",
    "dropfetch_sync",
];

/// Console verbosity chosen on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbosity {
    /// `--debug`
    pub debug: bool,
    /// `--verbose`
    pub verbose: bool,
    /// `--quiet`
    pub quiet: bool,
}

/// Effective level for dropfetch's own targets
pub fn effective_level<'a>(configured: &'a str, verbosity: Verbosity) -> &'a str {
    if verbosity.debug {
        "debug"
    } else if verbosity.verbose && matches!(configured, "warn" | "error") {
        "info"
    } else {
        configured
    }
}

/// Most detailed level printed on the console
///
/// Per-file events stay out of the console unless `--verbose` or `--debug` is
/// given; the log file always receives them.
pub fn console_level(verbosity: Verbosity) -> LevelFilter {
    if verbosity.quiet {
        LevelFilter::ERROR
    } else if verbosity.debug || verbosity.verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    }
}

/// Filter directives for a level
pub fn directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for target in OWN_TARGETS {
        directives.push(',');
        directives.push_str(target);
        directives.push('=');
        directives.push_str(level);
    }
    directives
}

/// Install the global subscriber
///
/// Console output always goes to stderr at the level picked by
/// [`console_level`].
/// When a log file is configured, a second layer writes to a daily rotated
/// file through a non-blocking writer. The returned guard flushes that writer
/// and must be held until the process exits.
pub fn init(config: &LoggingConfig, verbosity: Verbosity) -> Result<Option<WorkerGuard>> {
    let level = effective_level(&config.level, verbosity);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives(level)))
        .context("Invalid log filter")?;

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let (layer, guard) = file_layer(path, config.max_files, config.json_format)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_filter(console_level(verbosity));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(filter)
        .with(console_layer)
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(guard)
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer(path: &Path, max_files: usize, json: bool) -> Result<(BoxedLayer, WorkerGuard)> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Log file path '{}' has no file name", path.display()))?;

    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory '{}'", directory.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(max_files)
        .build(directory)
        .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()));

    let layer = if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    };

    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("info", Verbosity::default(), "info")]
    #[case("warn", Verbosity { verbose: true, ..Verbosity::default() }, "info")]
    #[case("trace", Verbosity { verbose: true, ..Verbosity::default() }, "trace")]
    #[case("error", Verbosity { debug: true, ..Verbosity::default() }, "debug")]
    #[case("info", Verbosity { quiet: true, ..Verbosity::default() }, "info")]
    fn test_effective_level(#[case] configured: &str, #[case] verbosity: Verbosity, #[case] expected: &str) {
        assert_eq!(effective_level(configured, verbosity), expected);
    }

    #[rstest]
    #[case(Verbosity::default(), LevelFilter::WARN)]
    #[case(Verbosity { verbose: true, ..Verbosity::default() }, LevelFilter::TRACE)]
    #[case(Verbosity { debug: true, ..Verbosity::default() }, LevelFilter::TRACE)]
    #[case(Verbosity { quiet: true, verbose: true, ..Verbosity::default() }, LevelFilter::ERROR)]
    fn test_console_level(#[case] verbosity: Verbosity, #[case] expected: LevelFilter) {
        assert_eq!(console_level(verbosity), expected);
    }

    #[test]
    fn test_directives_cover_own_crates() {
        let directives = directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("dropfetch_sync=debug"));
        assert!(directives.contains("dropfetch=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_file_layer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("dropfetch.log");

        let (_layer, guard) = file_layer(&path, 3, false).unwrap();
        drop(guard);

        assert!(dir.path().join("logs").is_dir());
    }
}
