//! Index and configuration reporting commands.

use std::path::Path;

use tokio::runtime::Runtime;

use crate::config::Config;
use crate::db::cursor::{self, Table};

use super::open_db;

const COUNTED: &[(&str, Table)] = &[
    ("Libraries", Table::MediaLibrary),
    ("Directories", Table::Directory),
    ("Tracks", Table::Track),
    ("Artists", Table::Artist),
    ("Releases", Table::Release),
    ("Media", Table::Medium),
    ("Clusters", Table::Cluster),
    ("Images", Table::Image),
    ("Artwork", Table::Artwork),
    ("Lyrics", Table::TrackLyrics),
    ("Playlists", Table::PlayListFile),
    ("Artist infos", Table::ArtistInfo),
];

/// Print entity counts of the index
pub fn cmd_stats(rt: &Runtime, config: &Config, db_path: Option<&Path>) -> anyhow::Result<()> {
    rt.block_on(async {
        let db = open_db(config, db_path).await?;
        let mut tx = db.read_tx().await?;

        println!("Index Summary");
        println!("=============");
        for (label, table) in COUNTED {
            let count = cursor::count(tx.conn(), *table).await?;
            println!("{:<13} {}", format!("{label}:"), count);
        }
        Ok(())
    })
}

/// List the configured media libraries
pub fn cmd_libraries(config: &Config) -> anyhow::Result<()> {
    if config.libraries.is_empty() {
        println!("No media library configured.");
        return Ok(());
    }

    for library in &config.libraries {
        let marker = if library.path.is_dir() { "✓" } else { "✗" };
        println!("{} {} -> {}", marker, library.name, library.path.display());
    }
    Ok(())
}
