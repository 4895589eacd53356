//! Artwork lookups used to resolve preferred artwork.
//!
//! Every lookup returns an `artwork.id`, never an image or embedded picture id.

use sqlx::sqlite::SqliteConnection;

use crate::db::cursor::IdRange;
use crate::model::{ImageType, TrackArtistLinkType};

/// Entity columns holding a preferred artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtworkTarget {
    Artist,
    Release,
    Medium,
    Track,
    TrackMedia,
}

impl ArtworkTarget {
    fn table_and_column(self) -> (&'static str, &'static str) {
        match self {
            ArtworkTarget::Artist => ("artist", "preferred_artwork_id"),
            ArtworkTarget::Release => ("release", "preferred_artwork_id"),
            ArtworkTarget::Medium => ("medium", "preferred_artwork_id"),
            ArtworkTarget::Track => ("track", "preferred_artwork_id"),
            ArtworkTarget::TrackMedia => ("track", "preferred_media_artwork_id"),
        }
    }
}

pub async fn set_preferred_artwork(
    conn: &mut SqliteConnection,
    target: ArtworkTarget,
    id: i64,
    artwork_id: Option<i64>,
) -> sqlx::Result<()> {
    let (table, column) = target.table_and_column();
    let sql = format!("UPDATE {table} SET {column} = ? WHERE id = ?");
    sqlx::query(&sql)
        .bind(artwork_id)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// An image anywhere in the library whose stem equals `stem`, ignoring case.
pub async fn find_image_by_stem(
    conn: &mut SqliteConnection,
    stem: &str,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar(
        "SELECT a.id FROM image i JOIN artwork a ON a.image_id = i.id \
         WHERE i.stem = ? COLLATE NOCASE ORDER BY i.absolute_file_path LIMIT 1",
    )
    .bind(stem)
    .fetch_optional(conn)
    .await
}

/// An image in `directory_id` whose stem matches a LIKE pattern.
///
/// LIKE is case-insensitive for ASCII; `\` escapes literal `%` and `_`.
pub async fn find_image_in_directory(
    conn: &mut SqliteConnection,
    directory_id: i64,
    like_pattern: &str,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar(
        "SELECT a.id FROM image i JOIN artwork a ON a.image_id = i.id \
         WHERE i.directory_id = ? AND i.stem LIKE ? ESCAPE '\\' \
         ORDER BY i.absolute_file_path LIMIT 1",
    )
    .bind(directory_id)
    .bind(like_pattern)
    .fetch_optional(conn)
    .await
}

/// `(id, path)` of the directories holding a release's tracks, in path order.
pub async fn release_directories(
    conn: &mut SqliteConnection,
    release_id: i64,
) -> sqlx::Result<Vec<(i64, String)>> {
    sqlx::query_as(
        "SELECT DISTINCT d.id, d.path FROM track t JOIN directory d ON d.id = t.directory_id \
         WHERE t.release_id = ? ORDER BY d.path",
    )
    .bind(release_id)
    .fetch_all(conn)
    .await
}

pub async fn medium_directories(
    conn: &mut SqliteConnection,
    medium_id: i64,
) -> sqlx::Result<Vec<(i64, String)>> {
    sqlx::query_as(
        "SELECT DISTINCT d.id, d.path FROM track t JOIN directory d ON d.id = t.directory_id \
         WHERE t.medium_id = ? ORDER BY d.path",
    )
    .bind(medium_id)
    .fetch_all(conn)
    .await
}

pub async fn artist_info_directories(
    conn: &mut SqliteConnection,
    artist_id: i64,
) -> sqlx::Result<Vec<(i64, String)>> {
    sqlx::query_as(
        "SELECT DISTINCT d.id, d.path FROM artist_info i JOIN directory d ON d.id = i.directory_id \
         WHERE i.artist_id = ? ORDER BY d.path",
    )
    .bind(artist_id)
    .fetch_all(conn)
    .await
}

/// Directories of the tracks crediting `artist_id` as release artist.
pub async fn release_artist_directories(
    conn: &mut SqliteConnection,
    artist_id: i64,
) -> sqlx::Result<Vec<(i64, String)>> {
    sqlx::query_as(
        "SELECT DISTINCT d.id, d.path FROM track_artist_link l \
         JOIN track t ON t.id = l.track_id \
         JOIN directory d ON d.id = t.directory_id \
         WHERE l.artist_id = ? AND l.type = ? ORDER BY d.path",
    )
    .bind(artist_id)
    .bind(TrackArtistLinkType::ReleaseArtist.as_i64())
    .fetch_all(conn)
    .await
}

pub async fn directory_id_by_path(
    conn: &mut SqliteConnection,
    path: &str,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM directory WHERE path = ?")
        .bind(path)
        .fetch_optional(conn)
        .await
}

/// Best embedded picture of a type across a release.
///
/// Highest resolution first, then disc position, track number and size.
pub async fn find_release_embedded(
    conn: &mut SqliteConnection,
    release_id: i64,
    image_type: ImageType,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar(
        "SELECT a.id FROM track t \
         JOIN track_embedded_image_link l ON l.track_id = t.id \
         JOIN track_embedded_image e ON e.id = l.track_embedded_image_id \
         JOIN artwork a ON a.track_embedded_image_id = e.id \
         LEFT JOIN medium m ON m.id = t.medium_id \
         WHERE t.release_id = ? AND l.type = ? \
         ORDER BY e.width * e.height DESC, COALESCE(m.position, 0), COALESCE(t.track_number, 0), \
                  e.size DESC, e.id \
         LIMIT 1",
    )
    .bind(release_id)
    .bind(image_type.as_i64())
    .fetch_optional(conn)
    .await
}

/// First embedded Media picture of a medium, by track number then size.
pub async fn find_medium_embedded(
    conn: &mut SqliteConnection,
    medium_id: i64,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar(
        "SELECT a.id FROM track t \
         JOIN track_embedded_image_link l ON l.track_id = t.id \
         JOIN track_embedded_image e ON e.id = l.track_embedded_image_id \
         JOIN artwork a ON a.track_embedded_image_id = e.id \
         WHERE t.medium_id = ? AND l.type = ? \
         ORDER BY COALESCE(t.track_number, 0), e.size DESC, e.id \
         LIMIT 1",
    )
    .bind(medium_id)
    .bind(ImageType::Media.as_i64())
    .fetch_optional(conn)
    .await
}

/// Largest embedded picture of a type in one track.
pub async fn find_track_embedded(
    conn: &mut SqliteConnection,
    track_id: i64,
    image_type: ImageType,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar(
        "SELECT a.id FROM track_embedded_image_link l \
         JOIN track_embedded_image e ON e.id = l.track_embedded_image_id \
         JOIN artwork a ON a.track_embedded_image_id = e.id \
         WHERE l.track_id = ? AND l.type = ? \
         ORDER BY e.size DESC, e.id LIMIT 1",
    )
    .bind(track_id)
    .bind(image_type.as_i64())
    .fetch_optional(conn)
    .await
}

/// Artwork of the earliest release credited to the artist as release artist,
/// by original date then id. Releases without artwork are passed over.
pub async fn earliest_release_artwork(
    conn: &mut SqliteConnection,
    artist_id: i64,
) -> sqlx::Result<Option<i64>> {
    let row: Option<Option<i64>> = sqlx::query_scalar(
        "SELECT r.preferred_artwork_id FROM release r \
         JOIN track t ON t.release_id = r.id \
         JOIN track_artist_link l ON l.track_id = t.id \
         WHERE l.artist_id = ? AND l.type = ? AND r.preferred_artwork_id IS NOT NULL \
         GROUP BY r.id \
         ORDER BY MIN(COALESCE(NULLIF(t.original_date, ''), NULLIF(t.date, ''), '9999')), r.id \
         LIMIT 1",
    )
    .bind(artist_id)
    .bind(TrackArtistLinkType::ReleaseArtist.as_i64())
    .fetch_optional(conn)
    .await?;
    Ok(row.flatten())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArtistArtworkRow {
    pub id: i64,
    pub mbid: String,
    pub preferred_artwork_id: Option<i64>,
}

pub async fn artists_in_range(
    conn: &mut SqliteConnection,
    range: IdRange,
) -> sqlx::Result<Vec<ArtistArtworkRow>> {
    sqlx::query_as(
        "SELECT id, mbid, preferred_artwork_id FROM artist WHERE id BETWEEN ? AND ? ORDER BY id",
    )
    .bind(range.first)
    .bind(range.last)
    .fetch_all(conn)
    .await
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReleaseArtworkRow {
    pub id: i64,
    pub mbid: String,
    pub preferred_artwork_id: Option<i64>,
}

pub async fn releases_in_range(
    conn: &mut SqliteConnection,
    range: IdRange,
) -> sqlx::Result<Vec<ReleaseArtworkRow>> {
    sqlx::query_as(
        "SELECT id, mbid, preferred_artwork_id FROM release WHERE id BETWEEN ? AND ? ORDER BY id",
    )
    .bind(range.first)
    .bind(range.last)
    .fetch_all(conn)
    .await
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediumArtworkRow {
    pub id: i64,
    pub name: String,
    pub preferred_artwork_id: Option<i64>,
    pub release_artwork_id: Option<i64>,
}

pub async fn mediums_in_range(
    conn: &mut SqliteConnection,
    range: IdRange,
) -> sqlx::Result<Vec<MediumArtworkRow>> {
    sqlx::query_as(
        "SELECT m.id, m.name, m.preferred_artwork_id, r.preferred_artwork_id AS release_artwork_id \
         FROM medium m JOIN release r ON r.id = m.release_id \
         WHERE m.id BETWEEN ? AND ? ORDER BY m.id",
    )
    .bind(range.first)
    .bind(range.last)
    .fetch_all(conn)
    .await
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackArtworkRow {
    pub id: i64,
    pub preferred_artwork_id: Option<i64>,
    pub preferred_media_artwork_id: Option<i64>,
    pub medium_artwork_id: Option<i64>,
    pub release_artwork_id: Option<i64>,
}

pub async fn tracks_in_range(
    conn: &mut SqliteConnection,
    range: IdRange,
) -> sqlx::Result<Vec<TrackArtworkRow>> {
    sqlx::query_as(
        "SELECT t.id, t.preferred_artwork_id, t.preferred_media_artwork_id, \
                m.preferred_artwork_id AS medium_artwork_id, \
                r.preferred_artwork_id AS release_artwork_id \
         FROM track t \
         LEFT JOIN medium m ON m.id = t.medium_id \
         LEFT JOIN release r ON r.id = t.release_id \
         WHERE t.id BETWEEN ? AND ? ORDER BY t.id",
    )
    .bind(range.first)
    .bind(range.last)
    .fetch_all(conn)
    .await
}
