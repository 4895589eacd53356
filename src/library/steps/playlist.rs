//! Resolve playlist entries to indexed tracks.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::db::cursor::{self, Table};
use crate::db::{playlist, track};
use crate::error::Result;
use crate::library::context::{ScanContext, ScanStep, ScanStepKind};
use crate::model::PlayListFile;

const READ_BATCH_SIZE: usize = 20;
const WRITE_BATCH_SIZE: usize = 5;

/// Absolute path of a playlist entry. Relative entries are relative to the
/// playlist's own directory; `.` and `..` are folded lexically.
fn resolve_entry(playlist_path: &Path, entry: &str) -> PathBuf {
    let entry = Path::new(entry);
    let joined = if entry.is_absolute() {
        entry.to_path_buf()
    } else {
        match playlist_path.parent() {
            Some(dir) => dir.join(entry),
            None => entry.to_path_buf(),
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Track ids for the playlist entries that are indexed, in playlist order.
async fn resolve_tracks(conn: &mut SqliteConnection, file: &PlayListFile) -> Result<Vec<i64>> {
    let entries: Vec<String> = serde_json::from_str(&file.files)?;
    let playlist_path = Path::new(&file.absolute_file_path);

    let mut track_ids = Vec::with_capacity(entries.len());
    for entry in &entries {
        let path = resolve_entry(playlist_path, entry);
        match track::find_by_path(&mut *conn, &path.to_string_lossy()).await? {
            Some(found) => track_ids.push(found.id),
            None => {
                tracing::debug!(target: "library::playlist", playlist = %file.absolute_file_path, entry = %entry, "Playlist entry not indexed");
            }
        }
    }
    Ok(track_ids)
}

pub struct AssociatePlayListTracks;

#[async_trait]
impl ScanStep for AssociatePlayListTracks {
    fn kind(&self) -> ScanStepKind {
        ScanStepKind::AssociatePlayListTracks
    }

    fn need_process(&self, ctx: &ScanContext) -> bool {
        ctx.stats.changes() > 0
    }

    async fn process(&self, ctx: &mut ScanContext) -> Result<()> {
        let total = {
            let mut tx = ctx.db.read_tx().await?;
            cursor::count(tx.conn(), Table::PlayListFile).await?
        };
        ctx.set_total(total as u64);

        let mut last_id = 0;
        loop {
            if ctx.aborted() {
                return Ok(());
            }

            let (checked, changes) = {
                let mut tx = ctx.db.read_tx().await?;
                let conn = tx.conn();
                let Some(range) =
                    cursor::find_next_id_range(&mut *conn, Table::PlayListFile, last_id, READ_BATCH_SIZE).await?
                else {
                    return Ok(());
                };
                last_id = range.last;

                let files = playlist::in_range(&mut *conn, range).await?;
                let mut changes = Vec::new();
                for file in &files {
                    let resolved = resolve_tracks(&mut *conn, file).await?;
                    if resolved != playlist::entries(&mut *conn, file.id).await? {
                        changes.push((file.id, resolved));
                    }
                }
                (files.len(), changes)
            };

            for batch in changes.chunks(WRITE_BATCH_SIZE) {
                let mut tx = ctx.db.write_tx().await?;
                for (playlist_id, track_ids) in batch {
                    playlist::set_entries(tx.conn(), *playlist_id, track_ids).await?;
                }
                tx.commit().await?;
                ctx.stats.updates += batch.len() as u64;
            }

            ctx.advance(checked as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::playlist::PlayListRecord;
    use crate::test_utils::{LibraryFixture, library_config, scan_context, temp_db};

    #[test]
    fn test_resolve_entry() {
        let playlist = Path::new("/music/Lists/mix.m3u");
        assert_eq!(resolve_entry(playlist, "../A/01.flac"), PathBuf::from("/music/A/01.flac"));
        assert_eq!(resolve_entry(playlist, "./02.flac"), PathBuf::from("/music/Lists/02.flac"));
        assert_eq!(resolve_entry(playlist, "/other/03.flac"), PathBuf::from("/other/03.flac"));
    }

    #[tokio::test]
    async fn test_entries_follow_the_index() {
        let (db, _dir) = temp_db().await;
        let music = tempfile::tempdir().unwrap();
        let config = library_config(music.path());

        let (first, second, playlist_id) = {
            let mut tx = db.write_tx().await.unwrap();
            let fx = LibraryFixture::new(tx.conn(), "/music").await;
            let dir = fx.dir(tx.conn(), "/music/A").await;
            let first = fx.track_in(tx.conn(), dir, "/music/A/01.flac", None).await;
            let second = fx.track_in(tx.conn(), dir, "/music/A/02.flac", None).await;
            let record = PlayListRecord {
                absolute_file_path: "/music/Lists/mix.m3u".to_string(),
                name: "mix".to_string(),
                files: vec![
                    "../A/02.flac".to_string(),
                    "../A/missing.flac".to_string(),
                    "/music/A/01.flac".to_string(),
                ],
                ..Default::default()
            };
            let playlist_id = playlist::upsert(tx.conn(), &record).await.unwrap();
            tx.commit().await.unwrap();
            (first, second, playlist_id)
        };

        let mut ctx = scan_context(&db, &config).await;
        AssociatePlayListTracks.process(&mut ctx).await.unwrap();
        assert_eq!(ctx.stats.updates, 1);
        {
            let mut tx = db.read_tx().await.unwrap();
            assert_eq!(playlist::entries(tx.conn(), playlist_id).await.unwrap(), vec![second, first]);
        }

        let mut ctx = scan_context(&db, &config).await;
        AssociatePlayListTracks.process(&mut ctx).await.unwrap();
        assert_eq!(ctx.stats.updates, 0);
        assert_eq!(ctx.current_step.processed_elems, 1);
    }
}
