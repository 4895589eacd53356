//! Keyset pagination.
//!
//! Every batch loop in the scan pipeline walks a table by primary key:
//! remember the last id seen and ask for the next page after it. Pages stay
//! stable while earlier rows are deleted, which OFFSET pagination does not.

use sqlx::sqlite::SqliteConnection;

use crate::model::FileKind;

/// Tables that are walked in batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Artist,
    ArtistInfo,
    Artwork,
    Cluster,
    ClusterType,
    Directory,
    Image,
    MediaLibrary,
    Medium,
    PlayListFile,
    Release,
    ReleaseType,
    Track,
    TrackArtistLink,
    TrackEmbeddedImage,
    TrackLyrics,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Artist => "artist",
            Table::ArtistInfo => "artist_info",
            Table::Artwork => "artwork",
            Table::Cluster => "cluster",
            Table::ClusterType => "cluster_type",
            Table::Directory => "directory",
            Table::Image => "image",
            Table::MediaLibrary => "media_library",
            Table::Medium => "medium",
            Table::PlayListFile => "playlist_file",
            Table::Release => "release",
            Table::ReleaseType => "release_type",
            Table::Track => "track",
            Table::TrackArtistLink => "track_artist_link",
            Table::TrackEmbeddedImage => "track_embedded_image",
            Table::TrackLyrics => "track_lyrics",
        }
    }
}

impl From<FileKind> for Table {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::Audio => Table::Track,
            FileKind::Image => Table::Image,
            FileKind::Lyrics => Table::TrackLyrics,
            FileKind::PlayList => Table::PlayListFile,
            FileKind::ArtistInfo => Table::ArtistInfo,
        }
    }
}

/// Inclusive id span of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    pub first: i64,
    pub last: i64,
}

/// Ids greater than `last_id`, ascending, at most `count` of them.
pub async fn find_ids_after(
    conn: &mut SqliteConnection,
    table: Table,
    last_id: i64,
    count: usize,
) -> sqlx::Result<Vec<i64>> {
    let sql = format!(
        "SELECT id FROM {} WHERE id > ? ORDER BY id LIMIT ?",
        table.name()
    );
    sqlx::query_scalar(&sql)
        .bind(last_id)
        .bind(count as i64)
        .fetch_all(conn)
        .await
}

/// Id span covering the next `count` rows after `last_id`, if any remain.
pub async fn find_next_id_range(
    conn: &mut SqliteConnection,
    table: Table,
    last_id: i64,
    count: usize,
) -> sqlx::Result<Option<IdRange>> {
    let sql = format!(
        "SELECT MIN(id), MAX(id) FROM (SELECT id FROM {} WHERE id > ? ORDER BY id LIMIT ?)",
        table.name()
    );
    let (first, last): (Option<i64>, Option<i64>) = sqlx::query_as(&sql)
        .bind(last_id)
        .bind(count as i64)
        .fetch_one(conn)
        .await?;

    Ok(match (first, last) {
        (Some(first), Some(last)) => Some(IdRange { first, last }),
        _ => None,
    })
}

pub async fn count(conn: &mut SqliteConnection, table: Table) -> sqlx::Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.name());
    sqlx::query_scalar(&sql).fetch_one(conn).await
}
