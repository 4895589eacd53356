//! External and embedded lyrics.

use sqlx::sqlite::SqliteConnection;

use crate::db::cursor::IdRange;
use crate::metadata::lyrics::Lyrics;

/// Location and stamp of an external lyrics file.
#[derive(Debug, Clone, Default)]
pub struct LyricsFile {
    pub absolute_file_path: String,
    pub stem: String,
    pub file_size: i64,
    pub last_write_time: i64,
    pub directory_id: Option<i64>,
}

/// Insert or refresh an external lyrics file. The track association is kept
/// and re-evaluated by the lyrics association step.
pub async fn upsert_external(
    conn: &mut SqliteConnection,
    file: &LyricsFile,
    lyrics: &Lyrics,
) -> sqlx::Result<i64> {
    let lines = serde_json::to_string(&lyrics.lines).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query_scalar(
        "INSERT INTO track_lyrics (absolute_file_path, stem, file_size, last_write_time, language, \
         offset_ms, display_title, display_artist, synchronized, lines, directory_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (absolute_file_path) DO UPDATE SET stem = excluded.stem, \
         file_size = excluded.file_size, last_write_time = excluded.last_write_time, \
         language = excluded.language, offset_ms = excluded.offset_ms, \
         display_title = excluded.display_title, display_artist = excluded.display_artist, \
         synchronized = excluded.synchronized, lines = excluded.lines, \
         directory_id = excluded.directory_id \
         RETURNING id",
    )
    .bind(&file.absolute_file_path)
    .bind(&file.stem)
    .bind(file.file_size)
    .bind(file.last_write_time)
    .bind(&lyrics.language)
    .bind(lyrics.offset_ms)
    .bind(&lyrics.display_title)
    .bind(&lyrics.display_artist)
    .bind(lyrics.synchronized)
    .bind(lines)
    .bind(file.directory_id)
    .fetch_one(conn)
    .await
}

/// Replace the lyrics embedded in a track's tags.
pub async fn set_embedded(
    conn: &mut SqliteConnection,
    track_id: i64,
    lyrics: Option<&Lyrics>,
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM track_lyrics WHERE track_id = ? AND absolute_file_path IS NULL")
        .bind(track_id)
        .execute(&mut *conn)
        .await?;

    let Some(lyrics) = lyrics else {
        return Ok(());
    };
    let lines = serde_json::to_string(&lyrics.lines).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query(
        "INSERT INTO track_lyrics (language, offset_ms, display_title, display_artist, \
         synchronized, lines, track_id) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&lyrics.language)
    .bind(lyrics.offset_ms)
    .bind(&lyrics.display_title)
    .bind(&lyrics.display_artist)
    .bind(lyrics.synchronized)
    .bind(lines)
    .bind(track_id)
    .execute(conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExternalLyricsRow {
    pub id: i64,
    pub stem: String,
    pub directory_id: Option<i64>,
    pub track_id: Option<i64>,
}

pub async fn count_external(conn: &mut SqliteConnection) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM track_lyrics WHERE absolute_file_path IS NOT NULL")
        .fetch_one(conn)
        .await
}

pub async fn external_in_range(
    conn: &mut SqliteConnection,
    range: IdRange,
) -> sqlx::Result<Vec<ExternalLyricsRow>> {
    sqlx::query_as(
        "SELECT id, stem, directory_id, track_id FROM track_lyrics \
         WHERE id BETWEEN ? AND ? AND absolute_file_path IS NOT NULL ORDER BY id",
    )
    .bind(range.first)
    .bind(range.last)
    .fetch_all(conn)
    .await
}

pub async fn set_track(
    conn: &mut SqliteConnection,
    lyrics_id: i64,
    track_id: Option<i64>,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE track_lyrics SET track_id = ? WHERE id = ?")
        .bind(track_id)
        .bind(lyrics_id)
        .execute(conn)
        .await?;
    Ok(())
}
