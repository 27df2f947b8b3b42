//! dropfetch - drain a Dropbox folder to local disk exactly once
//!
//! Every file in the configured folder is downloaded, verified against its
//! Dropbox content hash, recorded in a local ledger and then deleted remotely.
//! Content that the ledger already knows is skipped.

mod display;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dropfetch_config::{Config, ConfigBuilder, ConfigLoader};
use dropfetch_remote::{ClientConfig, DropboxClient};
use dropfetch_sync::{hash_file, FetchPipeline, FolderWalker, Ledger};
use logging::Verbosity;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// dropfetch - drain a Dropbox folder to local disk exactly once
#[derive(Parser, Debug)]
#[command(
    name = "dropfetch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Download, verify and remove files from a Dropbox folder",
    long_about = "dropfetch downloads every file of a Dropbox folder, verifies it against\n\
                  the Dropbox content hash, records it in a local SQLite ledger and then\n\
                  deletes the remote copy. Content already in the ledger is skipped."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - only errors on the console, no summary
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode - per-file events on the console
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch every file of the remote folder
    Fetch(FetchArgs),
    /// Print the Dropbox content hash and SHA-256 of a local file
    Hash {
        /// File to hash
        path: PathBuf,
    },
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    /// Dropbox OAuth2 access token
    #[arg(long, env = "DROPBOX_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Remote folder to drain ("" or "/" for the root)
    #[arg(long)]
    dropbox_path: Option<String>,

    /// Directory downloaded files are written into
    #[arg(long)]
    local_download_dir: Option<PathBuf>,

    /// SQLite ledger file
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log file
    #[arg(long)]
    log: Option<PathBuf>,
}

impl FetchArgs {
    fn apply(&self, builder: ConfigBuilder) -> ConfigBuilder {
        builder
            .set_override_option("remote.access_token", self.access_token.clone())
            .set_override_option("remote.folder_path", self.dropbox_path.clone())
            .set_override_option("storage.download_dir", path_value(&self.local_download_dir))
            .set_override_option("storage.ledger_path", path_value(&self.db))
            .set_override_option("logging.log_file", path_value(&self.log))
    }
}

fn path_value(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.to_string_lossy().into_owned())
}

/// The Dropbox API names the root folder `""`, not `"/"`
fn normalize_folder(folder: &str) -> String {
    if folder == "/" {
        String::new()
    } else {
        folder.to_string()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = Verbosity {
        debug: cli.debug,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Fetch(args) => {
            let config = args
                .apply(ConfigLoader::builder(cli.config.as_deref()))
                .build()
                .context("Invalid configuration")?;
            let _guard = logging::init(&config.logging, verbosity)?;
            fetch_command(&config, cli.quiet).await?;
        }
        Commands::Hash { path } => {
            let _guard = logging::init(&Default::default(), verbosity)?;
            hash_command(&path).await?;
        }
        Commands::Config { default } => {
            config_command(cli.config.as_deref(), default)?;
        }
    }

    Ok(())
}

async fn fetch_command(config: &Config, quiet: bool) -> Result<()> {
    info!("START dropfetch v{}", env!("CARGO_PKG_VERSION"));

    let download_dir = &config.storage.download_dir;
    tokio::fs::create_dir_all(download_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create local download directory '{}'",
                download_dir.display()
            )
        })?;

    let ledger = Ledger::open(&config.storage.ledger_path).context("Failed to open the ledger")?;
    let client = DropboxClient::new(ClientConfig::from(&config.remote))
        .context("Failed to create the Dropbox client")?;

    let pipeline = FetchPipeline::new(&client, &ledger, download_dir);
    let report = FolderWalker::new(&client, pipeline)
        .walk(&normalize_folder(&config.remote.folder_path))
        .await;

    info!(
        run_id = %report.run_id,
        fetched = report.stats.files_fetched,
        skipped = report.stats.duplicates_skipped,
        failures = report.stats.failures(),
        "FINISHED dropfetch"
    );

    if let Err(e) = ledger.close() {
        warn!(reason = %e, "ledger did not close cleanly");
    }

    if !quiet {
        display::print_report(&report);
    }

    Ok(())
}

async fn hash_command(path: &Path) -> Result<()> {
    let digests = hash_file(path)
        .await
        .with_context(|| format!("Failed to hash '{}'", path.display()))?;
    display::print_digests(path, &digests);
    Ok(())
}

fn config_command(path: Option<&Path>, default: bool) -> Result<()> {
    let mut config = if default {
        println!("{} Default configuration:", style("⚙").blue().bold());
        Config::default()
    } else {
        println!("{} Current configuration:", style("⚙").blue().bold());
        ConfigLoader::builder(path)
            .build_unchecked()
            .context("Failed to load configuration")?
    };

    if !config.remote.access_token.is_empty() {
        config.remote.access_token = "<redacted>".to_string();
    }

    print!("{}", ConfigLoader::to_yaml(&config)?);
    Ok(())
}
