//! Tracks and their links to artists, clusters and embedded pictures.

use sqlx::sqlite::SqliteConnection;

use crate::model::{Track, TrackArtistLinkType};

const SELECT_TRACK: &str = "SELECT id, absolute_file_path, file_size, last_write_time, name, track_number, \
     duration_ms, recording_mbid, track_mbid, directory_id, release_id, medium_id, \
     preferred_artwork_id, preferred_media_artwork_id FROM track";

/// Column values written for a scanned audio file.
#[derive(Debug, Clone, Default)]
pub struct TrackRecord {
    pub absolute_file_path: String,
    pub file_size: i64,
    pub last_write_time: i64,
    pub name: String,
    pub track_number: Option<i64>,
    pub date: String,
    pub original_date: String,
    pub duration_ms: i64,
    pub bitrate: i64,
    pub sample_rate: i64,
    pub channel_count: i64,
    pub bits_per_sample: i64,
    pub recording_mbid: String,
    pub track_mbid: String,
    pub copyright: String,
    pub comment: String,
    pub artist_display_name: String,
    pub media_library_id: Option<i64>,
    pub directory_id: Option<i64>,
    pub release_id: Option<i64>,
    pub medium_id: Option<i64>,
}

pub async fn find_by_path(conn: &mut SqliteConnection, path: &str) -> sqlx::Result<Option<Track>> {
    sqlx::query_as(&format!("{SELECT_TRACK} WHERE absolute_file_path = ?"))
        .bind(path)
        .fetch_optional(conn)
        .await
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Track>> {
    sqlx::query_as(&format!("{SELECT_TRACK} WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn find_by_track_mbid(
    conn: &mut SqliteConnection,
    mbid: &str,
) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as(&format!("{SELECT_TRACK} WHERE track_mbid = ? ORDER BY id"))
        .bind(mbid)
        .fetch_all(conn)
        .await
}

/// Paths of other tracks sharing a recording MBID.
pub async fn find_paths_by_recording_mbid(
    conn: &mut SqliteConnection,
    mbid: &str,
    exclude_path: &str,
) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        "SELECT absolute_file_path FROM track \
         WHERE recording_mbid = ? AND absolute_file_path <> ? ORDER BY id",
    )
    .bind(mbid)
    .bind(exclude_path)
    .fetch_all(conn)
    .await
}

/// `(id, path)` of every track in a directory.
pub async fn find_in_directory(
    conn: &mut SqliteConnection,
    directory_id: i64,
) -> sqlx::Result<Vec<(i64, String)>> {
    sqlx::query_as("SELECT id, absolute_file_path FROM track WHERE directory_id = ? ORDER BY id")
        .bind(directory_id)
        .fetch_all(conn)
        .await
}

/// Insert a new track, or overwrite the row `existing_id`.
pub async fn upsert(
    conn: &mut SqliteConnection,
    existing_id: Option<i64>,
    record: &TrackRecord,
) -> sqlx::Result<i64> {
    let sql = match existing_id {
        Some(_) => {
            "UPDATE track SET absolute_file_path = ?, file_size = ?, last_write_time = ?, name = ?, \
             track_number = ?, date = ?, original_date = ?, duration_ms = ?, bitrate = ?, \
             sample_rate = ?, channel_count = ?, bits_per_sample = ?, recording_mbid = ?, \
             track_mbid = ?, copyright = ?, comment = ?, artist_display_name = ?, \
             media_library_id = ?, directory_id = ?, release_id = ?, medium_id = ? \
             WHERE id = ? RETURNING id"
        }
        None => {
            "INSERT INTO track (absolute_file_path, file_size, last_write_time, name, \
             track_number, date, original_date, duration_ms, bitrate, sample_rate, \
             channel_count, bits_per_sample, recording_mbid, track_mbid, copyright, comment, \
             artist_display_name, media_library_id, directory_id, release_id, medium_id, added_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id"
        }
    };

    let query = sqlx::query_scalar(sql)
        .bind(&record.absolute_file_path)
        .bind(record.file_size)
        .bind(record.last_write_time)
        .bind(&record.name)
        .bind(record.track_number)
        .bind(&record.date)
        .bind(&record.original_date)
        .bind(record.duration_ms)
        .bind(record.bitrate)
        .bind(record.sample_rate)
        .bind(record.channel_count)
        .bind(record.bits_per_sample)
        .bind(&record.recording_mbid)
        .bind(&record.track_mbid)
        .bind(&record.copyright)
        .bind(&record.comment)
        .bind(&record.artist_display_name)
        .bind(record.media_library_id)
        .bind(record.directory_id)
        .bind(record.release_id)
        .bind(record.medium_id);

    let query = match existing_id {
        Some(id) => query.bind(id),
        None => query.bind(chrono::Utc::now().to_rfc3339()),
    };

    query.fetch_one(conn).await
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM track WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn clear_artist_links(conn: &mut SqliteConnection, track_id: i64) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM track_artist_link WHERE track_id = ?")
        .bind(track_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// A new track-artist link with the artist snapshot taken from the tags.
#[derive(Debug, Clone)]
pub struct NewArtistLink<'a> {
    pub track_id: i64,
    pub artist_id: i64,
    pub link_type: TrackArtistLinkType,
    pub artist_name: &'a str,
    pub artist_sort_name: &'a str,
    pub artist_mbid_matched: bool,
}

pub async fn add_artist_link(
    conn: &mut SqliteConnection,
    link: &NewArtistLink<'_>,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO track_artist_link (track_id, artist_id, type, artist_name, artist_sort_name, \
         artist_mbid_matched) VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(link.track_id)
    .bind(link.artist_id)
    .bind(link.link_type.as_i64())
    .bind(link.artist_name)
    .bind(link.artist_sort_name)
    .bind(link.artist_mbid_matched)
    .fetch_one(conn)
    .await
}

pub async fn set_clusters(
    conn: &mut SqliteConnection,
    track_id: i64,
    cluster_ids: &[i64],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM track_cluster WHERE track_id = ?")
        .bind(track_id)
        .execute(&mut *conn)
        .await?;
    for cluster_id in cluster_ids {
        sqlx::query("INSERT OR IGNORE INTO track_cluster (track_id, cluster_id) VALUES (?, ?)")
            .bind(track_id)
            .bind(cluster_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn clear_embedded_image_links(
    conn: &mut SqliteConnection,
    track_id: i64,
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM track_embedded_image_link WHERE track_id = ?")
        .bind(track_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn add_embedded_image_link(
    conn: &mut SqliteConnection,
    track_id: i64,
    embedded_image_id: i64,
    index: usize,
    image_type: i64,
    description: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO track_embedded_image_link (track_id, track_embedded_image_id, idx, type, description) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(track_id)
    .bind(embedded_image_id)
    .bind(index as i64)
    .bind(image_type)
    .bind(description)
    .execute(conn)
    .await?;
    Ok(())
}

/// A track whose recording MBID is shared with another track.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DuplicateTrack {
    pub id: i64,
    pub absolute_file_path: String,
    pub recording_mbid: String,
}

pub async fn find_duplicate_recordings(
    conn: &mut SqliteConnection,
    last_id: i64,
    count: usize,
) -> sqlx::Result<Vec<DuplicateTrack>> {
    sqlx::query_as(
        "SELECT t.id, t.absolute_file_path, t.recording_mbid FROM track t \
         WHERE t.id > ? AND t.recording_mbid <> '' \
           AND EXISTS (SELECT 1 FROM track o WHERE o.recording_mbid = t.recording_mbid AND o.id <> t.id) \
         ORDER BY t.id LIMIT ?",
    )
    .bind(last_id)
    .bind(count as i64)
    .fetch_all(conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_db;

    fn record(path: &str) -> TrackRecord {
        TrackRecord {
            absolute_file_path: path.to_string(),
            name: "Song".to_string(),
            duration_ms: 1000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        let id = upsert(tx.conn(), None, &record("/music/a.mp3")).await.unwrap();
        let updated = TrackRecord {
            name: "Renamed".to_string(),
            ..record("/music/a.mp3")
        };
        let same = upsert(tx.conn(), Some(id), &updated).await.unwrap();
        assert_eq!(id, same);

        let track = find_by_path(tx.conn(), "/music/a.mp3").await.unwrap().unwrap();
        assert_eq!(track.name, "Renamed");
    }

    #[tokio::test]
    async fn test_find_duplicate_recordings() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        for (path, mbid) in [("/a.mp3", "rec-1"), ("/b.mp3", "rec-1"), ("/c.mp3", "rec-2"), ("/d.mp3", "")] {
            let rec = TrackRecord {
                recording_mbid: mbid.to_string(),
                ..record(path)
            };
            upsert(tx.conn(), None, &rec).await.unwrap();
        }

        let dups = find_duplicate_recordings(tx.conn(), 0, 100).await.unwrap();
        let paths: Vec<_> = dups.iter().map(|d| d.absolute_file_path.as_str()).collect();
        assert_eq!(paths, vec!["/a.mp3", "/b.mp3"]);

        let others = find_paths_by_recording_mbid(tx.conn(), "rec-1", "/a.mp3")
            .await
            .unwrap();
        assert_eq!(others, vec!["/b.mp3"]);
    }
}
