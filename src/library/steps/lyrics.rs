//! Attach external lyrics files to the track they belong to.
//!
//! `01 Song.lrc` belongs to `01 Song.flac` in the same directory. A language
//! suffix is allowed: `01 Song.en.lrc` matches too.

use std::path::Path;

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::db::cursor::{self, Table};
use crate::db::{lyrics, track};
use crate::error::Result;
use crate::library::context::{ScanContext, ScanStep, ScanStepKind};

const READ_BATCH_SIZE: usize = 100;
const WRITE_BATCH_SIZE: usize = 20;

fn file_stem(path: &str) -> Option<&str> {
    Path::new(path).file_stem().and_then(|s| s.to_str())
}

/// Track of `directory_id` matching a lyrics stem, lowest id first.
async fn find_matching_track(
    conn: &mut SqliteConnection,
    directory_id: i64,
    lyrics_stem: &str,
) -> sqlx::Result<Option<i64>> {
    let tracks = track::find_in_directory(conn, directory_id).await?;
    let exact = tracks
        .iter()
        .find(|(_, path)| file_stem(path) == Some(lyrics_stem));
    if let Some((id, _)) = exact {
        return Ok(Some(*id));
    }

    // "01 Song.en" -> "01 Song"
    let Some(base) = file_stem(lyrics_stem).filter(|b| *b != lyrics_stem) else {
        return Ok(None);
    };
    Ok(tracks
        .iter()
        .find(|(_, path)| file_stem(path) == Some(base))
        .map(|(id, _)| *id))
}

pub struct AssociateExternalLyrics;

#[async_trait]
impl ScanStep for AssociateExternalLyrics {
    fn kind(&self) -> ScanStepKind {
        ScanStepKind::AssociateExternalLyrics
    }

    fn need_process(&self, ctx: &ScanContext) -> bool {
        ctx.stats.changes() > 0
    }

    async fn process(&self, ctx: &mut ScanContext) -> Result<()> {
        let total = {
            let mut tx = ctx.db.read_tx().await?;
            lyrics::count_external(tx.conn()).await?
        };
        ctx.set_total(total as u64);

        let mut last_id = 0;
        loop {
            if ctx.aborted() {
                return Ok(());
            }

            let (range, checked, changes) = {
                let mut tx = ctx.db.read_tx().await?;
                let conn = tx.conn();
                let Some(range) =
                    cursor::find_next_id_range(&mut *conn, Table::TrackLyrics, last_id, READ_BATCH_SIZE).await?
                else {
                    return Ok(());
                };

                let rows = lyrics::external_in_range(&mut *conn, range).await?;
                let mut changes = Vec::new();
                for row in &rows {
                    let matched = match row.directory_id {
                        Some(directory_id) => find_matching_track(&mut *conn, directory_id, &row.stem).await?,
                        None => None,
                    };
                    if matched != row.track_id {
                        changes.push((row.id, matched));
                    }
                }
                (range, rows.len(), changes)
            };
            last_id = range.last;

            for batch in changes.chunks(WRITE_BATCH_SIZE) {
                let mut tx = ctx.db.write_tx().await?;
                for (lyrics_id, track_id) in batch {
                    lyrics::set_track(tx.conn(), *lyrics_id, *track_id).await?;
                    tracing::debug!(target: "library::lyrics", lyrics_id, ?track_id, "Lyrics association changed");
                }
                tx.commit().await?;
                ctx.stats.updates += batch.len() as u64;
            }

            ctx.advance(checked as u64);
        }
    }
}
