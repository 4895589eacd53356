//! Tag clusters (genre, mood, language, grouping).

use sqlx::sqlite::SqliteConnection;

use crate::db::cursor::IdRange;

pub const GENRE: &str = "GENRE";
pub const MOOD: &str = "MOOD";
pub const LANGUAGE: &str = "LANGUAGE";
pub const GROUPING: &str = "GROUPING";

pub async fn get_or_create_type(conn: &mut SqliteConnection, name: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO cluster_type (name) VALUES (?) \
         ON CONFLICT (name) DO UPDATE SET name = excluded.name RETURNING id",
    )
    .bind(name)
    .fetch_one(conn)
    .await
}

pub async fn get_or_create(
    conn: &mut SqliteConnection,
    type_id: i64,
    name: &str,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO cluster (cluster_type_id, name) VALUES (?, ?) \
         ON CONFLICT (cluster_type_id, name) DO UPDATE SET name = excluded.name RETURNING id",
    )
    .bind(type_id)
    .bind(name)
    .fetch_one(conn)
    .await
}

/// Recompute the cached track and release counts of clusters in `range`.
///
/// Returns the number of clusters whose counts changed.
pub async fn update_stats(conn: &mut SqliteConnection, range: IdRange) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "UPDATE cluster SET \
           track_count = (SELECT COUNT(*) FROM track_cluster tc WHERE tc.cluster_id = cluster.id), \
           release_count = (SELECT COUNT(DISTINCT t.release_id) FROM track_cluster tc \
                            JOIN track t ON t.id = tc.track_id \
                            WHERE tc.cluster_id = cluster.id AND t.release_id IS NOT NULL) \
         WHERE id BETWEEN ? AND ? AND ( \
           track_count <> (SELECT COUNT(*) FROM track_cluster tc WHERE tc.cluster_id = cluster.id) \
           OR release_count <> (SELECT COUNT(DISTINCT t.release_id) FROM track_cluster tc \
                                JOIN track t ON t.id = tc.track_id \
                                WHERE tc.cluster_id = cluster.id AND t.release_id IS NOT NULL))",
    )
    .bind(range.first)
    .bind(range.last)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_db;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        let genre = get_or_create_type(tx.conn(), GENRE).await.unwrap();
        assert_eq!(get_or_create_type(tx.conn(), GENRE).await.unwrap(), genre);

        let rock = get_or_create(tx.conn(), genre, "Rock").await.unwrap();
        assert_eq!(get_or_create(tx.conn(), genre, "Rock").await.unwrap(), rock);

        let mood = get_or_create_type(tx.conn(), MOOD).await.unwrap();
        assert_ne!(get_or_create(tx.conn(), mood, "Rock").await.unwrap(), rock);
    }

    #[tokio::test]
    async fn test_update_stats() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        let genre = get_or_create_type(tx.conn(), GENRE).await.unwrap();
        let rock = get_or_create(tx.conn(), genre, "Rock").await.unwrap();
        let release: i64 = sqlx::query_scalar("INSERT INTO release (name) VALUES ('R') RETURNING id")
            .fetch_one(tx.conn())
            .await
            .unwrap();
        for path in ["/a.mp3", "/b.mp3"] {
            let track: i64 = sqlx::query_scalar(
                "INSERT INTO track (absolute_file_path, name, release_id) VALUES (?, 'x', ?) RETURNING id",
            )
            .bind(path)
            .bind(release)
            .fetch_one(tx.conn())
            .await
            .unwrap();
            sqlx::query("INSERT INTO track_cluster (track_id, cluster_id) VALUES (?, ?)")
                .bind(track)
                .bind(rock)
                .execute(tx.conn())
                .await
                .unwrap();
        }

        let range = IdRange { first: rock, last: rock };
        assert_eq!(update_stats(tx.conn(), range).await.unwrap(), 1);
        // Already up to date
        assert_eq!(update_stats(tx.conn(), range).await.unwrap(), 0);

        let (tracks, releases): (i64, i64) =
            sqlx::query_as("SELECT track_count, release_count FROM cluster WHERE id = ?")
                .bind(rock)
                .fetch_one(tx.conn())
                .await
                .unwrap();
        assert_eq!((tracks, releases), (2, 1));
    }
}
