//! Playlist files and their resolved entries.

use sqlx::sqlite::SqliteConnection;

use crate::db::cursor::IdRange;
use crate::model::PlayListFile;

#[derive(Debug, Clone, Default)]
pub struct PlayListRecord {
    pub absolute_file_path: String,
    pub file_size: i64,
    pub last_write_time: i64,
    pub name: String,
    pub files: Vec<String>,
    pub directory_id: Option<i64>,
}

pub async fn upsert(conn: &mut SqliteConnection, record: &PlayListRecord) -> sqlx::Result<i64> {
    let files = serde_json::to_string(&record.files).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query_scalar(
        "INSERT INTO playlist_file (absolute_file_path, file_size, last_write_time, name, files, directory_id) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT (absolute_file_path) DO UPDATE SET file_size = excluded.file_size, \
         last_write_time = excluded.last_write_time, name = excluded.name, files = excluded.files, \
         directory_id = excluded.directory_id \
         RETURNING id",
    )
    .bind(&record.absolute_file_path)
    .bind(record.file_size)
    .bind(record.last_write_time)
    .bind(&record.name)
    .bind(files)
    .bind(record.directory_id)
    .fetch_one(conn)
    .await
}

pub async fn in_range(
    conn: &mut SqliteConnection,
    range: IdRange,
) -> sqlx::Result<Vec<PlayListFile>> {
    sqlx::query_as(
        "SELECT id, absolute_file_path, name, files, directory_id FROM playlist_file \
         WHERE id BETWEEN ? AND ? ORDER BY id",
    )
    .bind(range.first)
    .bind(range.last)
    .fetch_all(conn)
    .await
}

/// Track ids of a playlist, in order.
pub async fn entries(conn: &mut SqliteConnection, playlist_id: i64) -> sqlx::Result<Vec<i64>> {
    sqlx::query_scalar(
        "SELECT track_id FROM playlist_entry WHERE playlist_file_id = ? ORDER BY position",
    )
    .bind(playlist_id)
    .fetch_all(conn)
    .await
}

pub async fn set_entries(
    conn: &mut SqliteConnection,
    playlist_id: i64,
    track_ids: &[i64],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM playlist_entry WHERE playlist_file_id = ?")
        .bind(playlist_id)
        .execute(&mut *conn)
        .await?;
    for (position, track_id) in track_ids.iter().enumerate() {
        sqlx::query("INSERT INTO playlist_entry (playlist_file_id, position, track_id) VALUES (?, ?, ?)")
            .bind(playlist_id)
            .bind(position as i64)
            .bind(track_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
