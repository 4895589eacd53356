//! `artist.nfo` sidecar rows.

use sqlx::sqlite::SqliteConnection;

use crate::model::ArtistInfo;

#[derive(Debug, Clone, Default)]
pub struct ArtistInfoRecord {
    pub absolute_file_path: String,
    pub file_size: i64,
    pub last_write_time: i64,
    pub name: String,
    pub sort_name: String,
    pub mbid: String,
    pub artist_type: String,
    pub gender: String,
    pub disambiguation: String,
    pub biography: String,
    pub mbid_matched: bool,
    pub artist_id: i64,
    pub directory_id: Option<i64>,
}

pub async fn find_by_path(
    conn: &mut SqliteConnection,
    path: &str,
) -> sqlx::Result<Option<ArtistInfo>> {
    sqlx::query_as(
        "SELECT id, absolute_file_path, name, sort_name, mbid, mbid_matched, artist_id, directory_id \
         FROM artist_info WHERE absolute_file_path = ?",
    )
    .bind(path)
    .fetch_optional(conn)
    .await
}

pub async fn upsert(conn: &mut SqliteConnection, record: &ArtistInfoRecord) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO artist_info (absolute_file_path, file_size, last_write_time, name, sort_name, \
         mbid, type, gender, disambiguation, biography, mbid_matched, artist_id, directory_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (absolute_file_path) DO UPDATE SET file_size = excluded.file_size, \
         last_write_time = excluded.last_write_time, name = excluded.name, \
         sort_name = excluded.sort_name, mbid = excluded.mbid, type = excluded.type, \
         gender = excluded.gender, disambiguation = excluded.disambiguation, \
         biography = excluded.biography, mbid_matched = excluded.mbid_matched, \
         artist_id = excluded.artist_id, directory_id = excluded.directory_id \
         RETURNING id",
    )
    .bind(&record.absolute_file_path)
    .bind(record.file_size)
    .bind(record.last_write_time)
    .bind(&record.name)
    .bind(&record.sort_name)
    .bind(&record.mbid)
    .bind(&record.artist_type)
    .bind(&record.gender)
    .bind(&record.disambiguation)
    .bind(&record.biography)
    .bind(record.mbid_matched)
    .bind(record.artist_id)
    .bind(record.directory_id)
    .fetch_one(conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::artist;
    use crate::test_utils::temp_db;

    #[tokio::test]
    async fn test_upsert_replaces_by_path() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let artist_id = artist::get_or_create_by_name(tx.conn(), "Low", "", false)
            .await
            .unwrap();

        let record = ArtistInfoRecord {
            absolute_file_path: "/music/Low/artist.nfo".to_string(),
            name: "Low".to_string(),
            artist_id,
            ..Default::default()
        };
        let id = upsert(tx.conn(), &record).await.unwrap();
        let again = upsert(
            tx.conn(),
            &ArtistInfoRecord {
                biography: "Slowcore trio".to_string(),
                ..record
            },
        )
        .await
        .unwrap();
        assert_eq!(id, again);

        let info = find_by_path(tx.conn(), "/music/Low/artist.nfo")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.artist_id, artist_id);
        assert!(!info.mbid_matched);
    }
}
