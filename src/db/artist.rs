//! Artists and artist matching.
//!
//! At most one artist per name may lack an MBID. The get-or-create helpers
//! below are the only place artists are created, and both honour that rule.
//!
//! With MBID fallback enabled, a name-only reference is resolved to the
//! unique MBID-carrying artist of that name, and an MBID reference may adopt
//! the MBID-less artist of the same name.

use sqlx::sqlite::SqliteConnection;

use crate::metadata::ArtistMetadata;
use crate::model::Artist;

const SELECT_ARTIST: &str = "SELECT id, name, sort_name, mbid, preferred_artwork_id FROM artist";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Artist>> {
    sqlx::query_as(&format!("{SELECT_ARTIST} WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn find_by_mbid(
    conn: &mut SqliteConnection,
    mbid: &str,
) -> sqlx::Result<Option<Artist>> {
    sqlx::query_as(&format!("{SELECT_ARTIST} WHERE mbid = ? ORDER BY id LIMIT 1"))
        .bind(mbid)
        .fetch_optional(conn)
        .await
}

pub async fn find_by_name(conn: &mut SqliteConnection, name: &str) -> sqlx::Result<Vec<Artist>> {
    sqlx::query_as(&format!("{SELECT_ARTIST} WHERE name = ? ORDER BY id"))
        .bind(name)
        .fetch_all(conn)
        .await
}

async fn create(
    conn: &mut SqliteConnection,
    name: &str,
    sort_name: &str,
    mbid: &str,
) -> sqlx::Result<i64> {
    let id = sqlx::query_scalar("INSERT INTO artist (name, sort_name, mbid) VALUES (?, ?, ?) RETURNING id")
        .bind(name)
        .bind(sort_name)
        .bind(mbid)
        .fetch_one(&mut *conn)
        .await?;
    tracing::debug!(target: "db::artist", id, name, mbid, "Created artist");
    Ok(id)
}

pub async fn set_name(
    conn: &mut SqliteConnection,
    id: i64,
    name: &str,
    sort_name: &str,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE artist SET name = ?, sort_name = ? WHERE id = ?")
        .bind(name)
        .bind(sort_name)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Resolve an artist reference, dispatching on whether it carries an MBID.
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    artist: &ArtistMetadata,
    allow_fallback: bool,
) -> sqlx::Result<i64> {
    match artist.mbid.as_deref().filter(|m| !m.is_empty()) {
        Some(mbid) => get_or_create_by_mbid(conn, mbid, artist, allow_fallback).await,
        None => {
            let sort_name = artist.sort_name.as_deref().unwrap_or("");
            get_or_create_by_name(conn, &artist.name, sort_name, allow_fallback).await
        }
    }
}

/// 1. exact MBID match (refreshing a stale name)
/// 2. with fallback, the MBID-less artist of the same name adopts the MBID
/// 3. a new artist
pub async fn get_or_create_by_mbid(
    conn: &mut SqliteConnection,
    mbid: &str,
    artist: &ArtistMetadata,
    allow_fallback: bool,
) -> sqlx::Result<i64> {
    let sort_name = artist.sort_name.as_deref().unwrap_or("");

    if let Some(existing) = find_by_mbid(&mut *conn, mbid).await? {
        let sort_changed = artist.sort_name.is_some() && existing.sort_name != sort_name;
        if existing.name != artist.name || sort_changed {
            let new_sort = if artist.sort_name.is_some() {
                sort_name
            } else {
                existing.sort_name.as_str()
            };
            set_name(&mut *conn, existing.id, &artist.name, new_sort).await?;
        }
        return Ok(existing.id);
    }

    if allow_fallback {
        let same_name = find_by_name(&mut *conn, &artist.name).await?;
        if let Some(unnamed) = same_name.iter().find(|a| a.mbid().is_none()) {
            sqlx::query("UPDATE artist SET mbid = ?, sort_name = ? WHERE id = ?")
                .bind(mbid)
                .bind(if artist.sort_name.is_some() {
                    sort_name
                } else {
                    unnamed.sort_name.as_str()
                })
                .bind(unnamed.id)
                .execute(&mut *conn)
                .await?;
            tracing::debug!(target: "db::artist", id = unnamed.id, mbid, "Assigned MBID to existing artist");
            return Ok(unnamed.id);
        }
    }

    create(conn, &artist.name, sort_name, mbid).await
}

/// 1. with fallback, the only MBID-carrying artist of that name
/// 2. the MBID-less artist of that name
/// 3. a new MBID-less artist
pub async fn get_or_create_by_name(
    conn: &mut SqliteConnection,
    name: &str,
    sort_name: &str,
    allow_fallback: bool,
) -> sqlx::Result<i64> {
    let same_name = find_by_name(&mut *conn, name).await?;

    if allow_fallback {
        let mut with_mbid = same_name.iter().filter(|a| a.mbid().is_some());
        if let (Some(only), None) = (with_mbid.next(), with_mbid.next()) {
            return Ok(only.id);
        }
    }

    if let Some(unnamed) = same_name.iter().find(|a| a.mbid().is_none()) {
        return Ok(unnamed.id);
    }

    create(conn, name, sort_name, "").await
}

/// An artist reference snapshot awaiting reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ArtistRefSnapshot {
    pub id: i64,
    pub artist_id: i64,
    pub name: String,
    pub sort_name: String,
}

/// Links whose snapshot no longer names their artist.
pub async fn find_links_with_name_drift(
    conn: &mut SqliteConnection,
    last_id: i64,
    count: usize,
) -> sqlx::Result<Vec<ArtistRefSnapshot>> {
    sqlx::query_as(
        "SELECT l.id, l.artist_id, l.artist_name AS name, l.artist_sort_name AS sort_name \
         FROM track_artist_link l JOIN artist a ON a.id = l.artist_id \
         WHERE l.id > ? AND l.artist_mbid_matched = 0 AND l.artist_name <> a.name \
         ORDER BY l.id LIMIT ?",
    )
    .bind(last_id)
    .bind(count as i64)
    .fetch_all(conn)
    .await
}

/// Condition selecting name-only references bound to the wrong artist.
///
/// `a` is the bound artist and `name` the snapshot name column.
fn ambiguity_condition(allow_fallback: bool, name: &str) -> String {
    if allow_fallback {
        format!(
            "((a.mbid <> '' AND EXISTS (SELECT 1 FROM artist o WHERE o.name = {name} AND o.mbid <> '' AND o.mbid <> a.mbid)) \
              OR (a.mbid = '' AND (SELECT COUNT(*) FROM artist o WHERE o.name = {name} AND o.mbid <> '') = 1))"
        )
    } else {
        "a.mbid <> ''".to_string()
    }
}

/// Name-only links whose binding contradicts the fallback policy.
pub async fn find_ambiguous_links(
    conn: &mut SqliteConnection,
    allow_fallback: bool,
    last_id: i64,
    count: usize,
) -> sqlx::Result<Vec<ArtistRefSnapshot>> {
    let sql = format!(
        "SELECT l.id, l.artist_id, l.artist_name AS name, l.artist_sort_name AS sort_name \
         FROM track_artist_link l JOIN artist a ON a.id = l.artist_id \
         WHERE l.id > ? AND l.artist_mbid_matched = 0 AND {} \
         ORDER BY l.id LIMIT ?",
        ambiguity_condition(allow_fallback, "l.artist_name")
    );
    sqlx::query_as(&sql)
        .bind(last_id)
        .bind(count as i64)
        .fetch_all(conn)
        .await
}

pub async fn find_artist_infos_with_name_drift(
    conn: &mut SqliteConnection,
    last_id: i64,
    count: usize,
) -> sqlx::Result<Vec<ArtistRefSnapshot>> {
    sqlx::query_as(
        "SELECT i.id, i.artist_id, i.name, i.sort_name \
         FROM artist_info i JOIN artist a ON a.id = i.artist_id \
         WHERE i.id > ? AND i.mbid_matched = 0 AND i.name <> a.name \
         ORDER BY i.id LIMIT ?",
    )
    .bind(last_id)
    .bind(count as i64)
    .fetch_all(conn)
    .await
}

pub async fn find_ambiguous_artist_infos(
    conn: &mut SqliteConnection,
    allow_fallback: bool,
    last_id: i64,
    count: usize,
) -> sqlx::Result<Vec<ArtistRefSnapshot>> {
    let sql = format!(
        "SELECT i.id, i.artist_id, i.name, i.sort_name \
         FROM artist_info i JOIN artist a ON a.id = i.artist_id \
         WHERE i.id > ? AND i.mbid_matched = 0 AND {} \
         ORDER BY i.id LIMIT ?",
        ambiguity_condition(allow_fallback, "i.name")
    );
    sqlx::query_as(&sql)
        .bind(last_id)
        .bind(count as i64)
        .fetch_all(conn)
        .await
}

pub async fn rebind_link(
    conn: &mut SqliteConnection,
    link_id: i64,
    artist_id: i64,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE track_artist_link SET artist_id = ? WHERE id = ?")
        .bind(artist_id)
        .bind(link_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn rebind_artist_info(
    conn: &mut SqliteConnection,
    info_id: i64,
    artist_id: i64,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE artist_info SET artist_id = ? WHERE id = ?")
        .bind(artist_id)
        .bind(info_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// An MBID artist whose name differs from what its tracks now call it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PreferredName {
    pub artist_id: i64,
    pub name: String,
    pub sort_name: String,
}

/// MBID artists without artist info whose name differs from the snapshot of
/// their most recent link, newest original date first.
pub async fn find_artists_with_stale_name(
    conn: &mut SqliteConnection,
    last_id: i64,
    count: usize,
) -> sqlx::Result<Vec<PreferredName>> {
    sqlx::query_as(
        "SELECT a.id AS artist_id, l.artist_name AS name, l.artist_sort_name AS sort_name \
         FROM artist a \
         JOIN track_artist_link l ON l.id = ( \
             SELECT l2.id FROM track_artist_link l2 JOIN track t ON t.id = l2.track_id \
             WHERE l2.artist_id = a.id \
             ORDER BY COALESCE(NULLIF(t.original_date, ''), NULLIF(t.date, ''), '') DESC, l2.id DESC \
             LIMIT 1) \
         WHERE a.id > ? AND a.mbid <> '' \
           AND NOT EXISTS (SELECT 1 FROM artist_info i WHERE i.artist_id = a.id) \
           AND a.name <> l.artist_name \
         ORDER BY a.id LIMIT ?",
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

    fn named(name: &str, mbid: Option<&str>) -> ArtistMetadata {
        ArtistMetadata {
            mbid: mbid.map(str::to_string),
            name: name.to_string(),
            sort_name: None,
        }
    }

    async fn mbidless_per_name(conn: &mut SqliteConnection) -> i64 {
        sqlx::query_scalar(
            "SELECT COALESCE(MAX(n), 0) FROM (SELECT COUNT(*) AS n FROM artist WHERE mbid = '' GROUP BY name)",
        )
        .fetch_one(conn)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_by_name_is_idempotent() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        let a = get_or_create_by_name(tx.conn(), "Nirvana", "", false).await.unwrap();
        let b = get_or_create_by_name(tx.conn(), "Nirvana", "", true).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(mbidless_per_name(tx.conn()).await, 1);
    }

    #[tokio::test]
    async fn test_fallback_adopts_unique_mbid_artist() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        let tagged = get_or_create(tx.conn(), &named("Nirvana", Some("mbid-1")), true)
            .await
            .unwrap();

        let with_fallback = get_or_create_by_name(tx.conn(), "Nirvana", "", true).await.unwrap();
        assert_eq!(with_fallback, tagged);

        let without = get_or_create_by_name(tx.conn(), "Nirvana", "", false).await.unwrap();
        assert_ne!(without, tagged);
    }

    #[tokio::test]
    async fn test_fallback_skips_ambiguous_names() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        let a = get_or_create(tx.conn(), &named("Nirvana", Some("mbid-1")), false).await.unwrap();
        let b = get_or_create(tx.conn(), &named("Nirvana", Some("mbid-2")), false).await.unwrap();
        assert_ne!(a, b);

        let by_name = get_or_create_by_name(tx.conn(), "Nirvana", "", true).await.unwrap();
        assert_ne!(by_name, a);
        assert_ne!(by_name, b);
        assert_eq!(mbidless_per_name(tx.conn()).await, 1);
    }

    #[tokio::test]
    async fn test_mbid_adopts_mbidless_artist_with_fallback() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        let plain = get_or_create_by_name(tx.conn(), "Björk", "", true).await.unwrap();
        let tagged = get_or_create(tx.conn(), &named("Björk", Some("mbid-b")), true)
            .await
            .unwrap();
        assert_eq!(plain, tagged);

        let artist = find_by_id(tx.conn(), tagged).await.unwrap().unwrap();
        assert_eq!(artist.mbid(), Some("mbid-b"));
    }

    #[tokio::test]
    async fn test_mbid_match_refreshes_name() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        let id = get_or_create(tx.conn(), &named("Prince", Some("mbid-p")), false)
            .await
            .unwrap();
        let renamed = ArtistMetadata {
            sort_name: Some("Prince".to_string()),
            ..named("The Artist", Some("mbid-p"))
        };
        let again = get_or_create(tx.conn(), &renamed, false).await.unwrap();
        assert_eq!(id, again);

        let artist = find_by_id(tx.conn(), id).await.unwrap().unwrap();
        assert_eq!(artist.name, "The Artist");
        assert_eq!(artist.sort_name, "Prince");
    }

    #[tokio::test]
    async fn test_without_fallback_mbid_creates_new() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();

        let plain = get_or_create_by_name(tx.conn(), "Heart", "", false).await.unwrap();
        let tagged = get_or_create(tx.conn(), &named("Heart", Some("mbid-h")), false)
            .await
            .unwrap();
        assert_ne!(plain, tagged);
        assert_eq!(mbidless_per_name(tx.conn()).await, 1);
    }
}
