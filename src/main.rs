//! Music Indexer - media library scanner and catalogue reconciler.
//!
//! Walks the configured media libraries, indexes audio files together with
//! their images, lyrics, playlists and artist info files into a SQLite
//! catalogue, and keeps everything derived from them consistent across
//! rescans.

pub mod cli;
pub mod config;
pub mod cover;
pub mod db;
pub mod error;
pub mod library;
pub mod metadata;
pub mod model;
pub mod queue;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("music_indexer=info".parse()?)
                // Modules log under their own targets
                .add_directive("library=info".parse()?)
                .add_directive("db=info".parse()?)
                .add_directive("scanner=info".parse()?)
                .add_directive("queue=info".parse()?)
                .add_directive("cli=info".parse()?),
        )
        .init();

    cli::run_command(&args)
}
