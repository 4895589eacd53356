//! Settings recorded by the previous scan.
//!
//! Some steps only need to run again when a setting changes between runs;
//! the values of the last completed scan are kept in `scan_settings`.

use sqlx::sqlite::SqliteConnection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::FromRow)]
pub struct ScanSettings {
    pub allow_artist_mbid_fallback: bool,
    pub artist_image_fallback_to_release: bool,
}

pub async fn load(conn: &mut SqliteConnection) -> sqlx::Result<ScanSettings> {
    let settings: Option<ScanSettings> = sqlx::query_as(
        "SELECT allow_artist_mbid_fallback, artist_image_fallback_to_release FROM scan_settings WHERE id = 1",
    )
    .fetch_optional(conn)
    .await?;
    Ok(settings.unwrap_or_default())
}

pub async fn store(conn: &mut SqliteConnection, settings: ScanSettings) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO scan_settings (id, allow_artist_mbid_fallback, artist_image_fallback_to_release) \
         VALUES (1, ?, ?) \
         ON CONFLICT (id) DO UPDATE SET allow_artist_mbid_fallback = excluded.allow_artist_mbid_fallback, \
         artist_image_fallback_to_release = excluded.artist_image_fallback_to_release",
    )
    .bind(settings.allow_artist_mbid_fallback)
    .bind(settings.artist_image_fallback_to_release)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_db;

    #[tokio::test]
    async fn test_store_and_load() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        assert_eq!(load(tx.conn()).await.unwrap(), ScanSettings::default());

        let settings = ScanSettings {
            allow_artist_mbid_fallback: true,
            artist_image_fallback_to_release: false,
        };
        store(tx.conn(), settings).await.unwrap();
        assert_eq!(load(tx.conn()).await.unwrap(), settings);
    }
}
