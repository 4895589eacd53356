//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `scan`: Run the scan pipeline over the configured libraries
//! - `index`: Report what the index and configuration contain

mod index;
mod scan;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use crate::config::{self, Config, LibraryConfig};
use crate::db::{self, Db};

pub use index::{cmd_libraries, cmd_stats};
pub use scan::cmd_scan;

/// Music library indexer
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, env = "MUSIC_INDEXER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Index database (overrides the configured path)
    #[arg(long, global = true, env = "MUSIC_INDEXER_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Scan the media libraries and update the index
    Scan {
        /// Re-read every file, even unchanged ones
        #[arg(long)]
        full: bool,
        /// Optimize the database even when nothing changed
        #[arg(long)]
        force_optimize: bool,
        /// Library to scan as NAME=PATH (replaces the configured libraries)
        #[arg(long = "library", value_parser = parse_library)]
        libraries: Vec<LibraryConfig>,
    },
    /// Print how many entities the index holds
    Stats,
    /// List the configured media libraries
    Libraries,
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Scan {
            full,
            force_optimize,
            libraries,
        } => cmd_scan(&rt, config, cli.db.as_deref(), libraries, *full, *force_optimize),
        Commands::Stats => cmd_stats(&rt, &config, cli.db.as_deref()),
        Commands::Libraries => cmd_libraries(&config),
    }
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Parse a `NAME=PATH` library argument
fn parse_library(value: &str) -> Result<LibraryConfig, String> {
    let Some((name, path)) = value.split_once('=') else {
        return Err(format!("expected NAME=PATH, got '{value}'"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("library name is empty".to_string());
    }
    if path.is_empty() {
        return Err(format!("library '{name}' has no path"));
    }
    Ok(LibraryConfig {
        name: name.to_string(),
        path: PathBuf::from(path),
    })
}

/// An explicit config file must load; the default one falls back to defaults.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(config::load_from(path)?),
        None => Ok(config::load()),
    }
}

/// Where the index lives: `--db`, then the config, then the data directory.
pub(crate) fn resolve_db_path(config: &Config, db_override: Option<&Path>) -> Option<PathBuf> {
    db_override
        .map(Path::to_path_buf)
        .or_else(|| config.database.path.clone())
        .or_else(config::default_db_path)
}

/// Open the index, creating its parent directory first.
pub(crate) async fn open_db(config: &Config, db_override: Option<&Path>) -> anyhow::Result<Db> {
    let path = resolve_db_path(config, db_override);
    if let Some(dir) = path.as_deref().and_then(Path::parent) {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let url = db::db_url(path.as_deref());
    tracing::debug!(target: "cli", url = %url, "Opening index");
    Ok(Db::open(&url).await?)
}
