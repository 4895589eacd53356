//! Releases, release types and mediums.

use sqlx::sqlite::SqliteConnection;

use crate::metadata::{MediumMetadata, ReleaseMetadata};
use crate::model::{Medium, Release};

const SELECT_RELEASE: &str = "SELECT id, name, sort_name, mbid, group_mbid, total_disc, is_compilation, \
     barcode, comment, artist_display_name, preferred_artwork_id FROM release";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Release>> {
    sqlx::query_as(&format!("{SELECT_RELEASE} WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn find_by_mbid(
    conn: &mut SqliteConnection,
    mbid: &str,
) -> sqlx::Result<Option<Release>> {
    sqlx::query_as(&format!("{SELECT_RELEASE} WHERE mbid = ? ORDER BY id LIMIT 1"))
        .bind(mbid)
        .fetch_optional(conn)
        .await
}

/// Where the track being ingested lives.
#[derive(Debug, Clone, Copy)]
pub struct TrackLocation {
    pub directory_id: i64,
    pub parent_directory_id: Option<i64>,
}

/// Find the release a track belongs to, creating it if needed.
///
/// Tagged releases are matched by MBID. Untagged releases are matched by
/// their descriptive fields, but only among releases already present in the
/// track's directory, or, for multi-disc releases, in sibling directories
/// (`Album/CD1`, `Album/CD2`). Two unrelated albums sharing a name in
/// different places stay separate.
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    meta: &ReleaseMetadata,
    location: TrackLocation,
) -> sqlx::Result<i64> {
    if let Some(mbid) = meta.mbid.as_deref().filter(|m| !m.is_empty()) {
        if let Some(existing) = find_by_mbid(&mut *conn, mbid).await? {
            update_if_changed(&mut *conn, &existing, meta).await?;
            return Ok(existing.id);
        }
        return create(conn, meta).await;
    }

    let multi_disc_parent = location
        .parent_directory_id
        .filter(|_| meta.medium_count.is_some_and(|n| n > 1));
    if let Some(parent_id) = multi_disc_parent {
        let sibling =
            find_untagged_candidate(&mut *conn, meta, "d.parent_id = ?", parent_id).await?;
        if let Some(id) = sibling {
            return Ok(id);
        }
    }

    let local =
        find_untagged_candidate(&mut *conn, meta, "t.directory_id = ?", location.directory_id)
            .await?;
    match local {
        Some(id) => Ok(id),
        None => create(conn, meta).await,
    }
}

async fn find_untagged_candidate(
    conn: &mut SqliteConnection,
    meta: &ReleaseMetadata,
    directory_filter: &str,
    directory_param: i64,
) -> sqlx::Result<Option<i64>> {
    let sql = format!(
        "SELECT r.id FROM release r \
         JOIN track t ON t.release_id = r.id \
         JOIN directory d ON d.id = t.directory_id \
         WHERE r.mbid = '' AND r.name = ? AND r.sort_name = ? AND r.total_disc IS ? \
           AND r.is_compilation = ? AND r.barcode = ? AND {directory_filter} \
         ORDER BY r.id LIMIT 1"
    );
    sqlx::query_scalar(&sql)
        .bind(&meta.name)
        .bind(&meta.sort_name)
        .bind(meta.medium_count.map(i64::from))
        .bind(meta.is_compilation)
        .bind(&meta.barcode)
        .bind(directory_param)
        .fetch_optional(conn)
        .await
}

async fn create(conn: &mut SqliteConnection, meta: &ReleaseMetadata) -> sqlx::Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO release (name, sort_name, mbid, group_mbid, total_disc, is_compilation, \
         barcode, comment, artist_display_name) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&meta.name)
    .bind(&meta.sort_name)
    .bind(meta.mbid.as_deref().unwrap_or(""))
    .bind(meta.group_mbid.as_deref().unwrap_or(""))
    .bind(meta.medium_count.map(i64::from))
    .bind(meta.is_compilation)
    .bind(&meta.barcode)
    .bind(&meta.comment)
    .bind(&meta.artist_display_name)
    .fetch_one(&mut *conn)
    .await?;

    set_release_types(conn, id, &meta.release_types).await?;
    tracing::debug!(target: "db::release", id, name = %meta.name, "Created release");
    Ok(id)
}

async fn update_if_changed(
    conn: &mut SqliteConnection,
    existing: &Release,
    meta: &ReleaseMetadata,
) -> sqlx::Result<()> {
    let total_disc = meta.medium_count.map(i64::from);
    let group_mbid = meta.group_mbid.as_deref().unwrap_or("");
    let changed = existing.name != meta.name
        || existing.sort_name != meta.sort_name
        || existing.group_mbid != group_mbid
        || existing.total_disc != total_disc
        || existing.is_compilation != meta.is_compilation
        || existing.barcode != meta.barcode
        || existing.comment != meta.comment
        || existing.artist_display_name != meta.artist_display_name;

    if changed {
        sqlx::query(
            "UPDATE release SET name = ?, sort_name = ?, group_mbid = ?, total_disc = ?, \
             is_compilation = ?, barcode = ?, comment = ?, artist_display_name = ? WHERE id = ?",
        )
        .bind(&meta.name)
        .bind(&meta.sort_name)
        .bind(group_mbid)
        .bind(total_disc)
        .bind(meta.is_compilation)
        .bind(&meta.barcode)
        .bind(&meta.comment)
        .bind(&meta.artist_display_name)
        .bind(existing.id)
        .execute(&mut *conn)
        .await?;
    }

    let current = release_type_names(&mut *conn, existing.id).await?;
    if current != meta.release_types {
        set_release_types(conn, existing.id, &meta.release_types).await?;
    }
    Ok(())
}

pub async fn release_type_names(
    conn: &mut SqliteConnection,
    release_id: i64,
) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        "SELECT rt.name FROM release_type rt \
         JOIN release_release_type rrt ON rrt.release_type_id = rt.id \
         WHERE rrt.release_id = ? ORDER BY rt.id",
    )
    .bind(release_id)
    .fetch_all(conn)
    .await
}

async fn set_release_types(
    conn: &mut SqliteConnection,
    release_id: i64,
    names: &[String],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM release_release_type WHERE release_id = ?")
        .bind(release_id)
        .execute(&mut *conn)
        .await?;

    for name in names {
        let type_id: i64 = sqlx::query_scalar(
            "INSERT INTO release_type (name) VALUES (?) \
             ON CONFLICT (name) DO UPDATE SET name = excluded.name RETURNING id",
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO release_release_type (release_id, release_type_id) VALUES (?, ?)",
        )
        .bind(release_id)
        .bind(type_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Find a medium by release and position, creating or refreshing it.
pub async fn get_or_create_medium(
    conn: &mut SqliteConnection,
    release_id: i64,
    meta: &MediumMetadata,
) -> sqlx::Result<i64> {
    let position = meta.position.map(i64::from);
    let track_count = meta.track_count.map(i64::from);

    let existing: Option<Medium> = sqlx::query_as(
        "SELECT id, release_id, position, name, media, track_count, preferred_artwork_id \
         FROM medium WHERE release_id = ? AND position IS ? ORDER BY id LIMIT 1",
    )
    .bind(release_id)
    .bind(position)
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        Some(medium) => {
            if medium.name != meta.name
                || medium.media != meta.media
                || medium.track_count != track_count
            {
                sqlx::query("UPDATE medium SET name = ?, media = ?, track_count = ? WHERE id = ?")
                    .bind(&meta.name)
                    .bind(&meta.media)
                    .bind(track_count)
                    .bind(medium.id)
                    .execute(&mut *conn)
                    .await?;
            }
            Ok(medium.id)
        }
        None => {
            sqlx::query_scalar(
                "INSERT INTO medium (release_id, position, name, media, track_count) \
                 VALUES (?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(release_id)
            .bind(position)
            .bind(&meta.name)
            .bind(&meta.media)
            .bind(track_count)
            .fetch_one(conn)
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{LibraryFixture, temp_db};

    fn album(name: &str) -> ReleaseMetadata {
        ReleaseMetadata {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mbid_release_is_shared() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;
        let a = fx.dir(tx.conn(), "/music/A").await;
        let b = fx.dir(tx.conn(), "/music/B").await;

        let meta = ReleaseMetadata {
            mbid: Some("rel-1".to_string()),
            release_types: vec!["album".to_string()],
            ..album("Nevermind")
        };
        let loc = fx.location(tx.conn(), a).await;
        let first = get_or_create(tx.conn(), &meta, loc).await.unwrap();
        let loc = fx.location(tx.conn(), b).await;
        let second = get_or_create(tx.conn(), &meta, loc).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            release_type_names(tx.conn(), first).await.unwrap(),
            vec!["album"]
        );
    }

    #[tokio::test]
    async fn test_untagged_release_scoped_to_directory() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;
        let a = fx.dir(tx.conn(), "/music/A/Greatest Hits").await;
        let b = fx.dir(tx.conn(), "/music/B/Greatest Hits").await;

        let meta = album("Greatest Hits");
        let loc = fx.location(tx.conn(), a).await;
        let first = get_or_create(tx.conn(), &meta, loc).await.unwrap();
        fx.track_in(tx.conn(), a, "/music/A/Greatest Hits/01.mp3", Some(first))
            .await;

        let loc = fx.location(tx.conn(), a).await;
        let same_dir = get_or_create(tx.conn(), &meta, loc).await.unwrap();
        let loc = fx.location(tx.conn(), b).await;
        let other_dir = get_or_create(tx.conn(), &meta, loc).await.unwrap();

        assert_eq!(first, same_dir);
        assert_ne!(first, other_dir);
    }

    #[tokio::test]
    async fn test_multi_disc_release_spans_sibling_directories() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;
        let cd1 = fx.dir(tx.conn(), "/music/Artist/Album/CD1").await;
        let cd2 = fx.dir(tx.conn(), "/music/Artist/Album/CD2").await;

        let meta = ReleaseMetadata {
            medium_count: Some(2),
            ..album("Album")
        };
        let loc = fx.location(tx.conn(), cd1).await;
        let first = get_or_create(tx.conn(), &meta, loc).await.unwrap();
        fx.track_in(tx.conn(), cd1, "/music/Artist/Album/CD1/01.mp3", Some(first))
            .await;

        let loc = fx.location(tx.conn(), cd2).await;
        let second = get_or_create(tx.conn(), &meta, loc).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_medium_by_position() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;
        let dir = fx.dir(tx.conn(), "/music/A").await;
        let loc = fx.location(tx.conn(), dir).await;
        let release = get_or_create(tx.conn(), &album("A"), loc).await.unwrap();

        let disc = |position| MediumMetadata {
            position: Some(position),
            ..Default::default()
        };
        let one = get_or_create_medium(tx.conn(), release, &disc(1)).await.unwrap();
        let two = get_or_create_medium(tx.conn(), release, &disc(2)).await.unwrap();
        let one_again = get_or_create_medium(tx.conn(), release, &disc(1)).await.unwrap();

        assert_ne!(one, two);
        assert_eq!(one, one_again);
    }
}
