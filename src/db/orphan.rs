//! Rows nothing refers to any more.

use sqlx::sqlite::SqliteConnection;

/// Entity kinds that can be left orphaned, in removal order.
///
/// Removing one kind can orphan a later one (a deleted cluster may leave its
/// type unused), so the order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrphanKind {
    Cluster,
    ClusterType,
    Artist,
    Release,
    Medium,
    ReleaseType,
    Directory,
    TrackEmbeddedImage,
}

impl OrphanKind {
    pub const ALL: [OrphanKind; 8] = [
        OrphanKind::Cluster,
        OrphanKind::ClusterType,
        OrphanKind::Artist,
        OrphanKind::Release,
        OrphanKind::Medium,
        OrphanKind::ReleaseType,
        OrphanKind::Directory,
        OrphanKind::TrackEmbeddedImage,
    ];

    pub fn table(self) -> &'static str {
        match self {
            OrphanKind::Cluster => "cluster",
            OrphanKind::ClusterType => "cluster_type",
            OrphanKind::Artist => "artist",
            OrphanKind::Release => "release",
            OrphanKind::Medium => "medium",
            OrphanKind::ReleaseType => "release_type",
            OrphanKind::Directory => "directory",
            OrphanKind::TrackEmbeddedImage => "track_embedded_image",
        }
    }

    /// Condition on `x` (a row of [`Self::table`]) meaning nothing refers to it.
    fn unreferenced(self) -> &'static str {
        match self {
            OrphanKind::Cluster => {
                "NOT EXISTS (SELECT 1 FROM track_cluster tc WHERE tc.cluster_id = x.id)"
            }
            OrphanKind::ClusterType => {
                "NOT EXISTS (SELECT 1 FROM cluster c WHERE c.cluster_type_id = x.id)"
            }
            OrphanKind::Artist => {
                "NOT EXISTS (SELECT 1 FROM track_artist_link l WHERE l.artist_id = x.id) \
                 AND NOT EXISTS (SELECT 1 FROM artist_info i WHERE i.artist_id = x.id)"
            }
            OrphanKind::Release => "NOT EXISTS (SELECT 1 FROM track t WHERE t.release_id = x.id)",
            OrphanKind::Medium => "NOT EXISTS (SELECT 1 FROM track t WHERE t.medium_id = x.id)",
            OrphanKind::ReleaseType => {
                "NOT EXISTS (SELECT 1 FROM release_release_type r WHERE r.release_type_id = x.id)"
            }
            OrphanKind::Directory => {
                "NOT EXISTS (SELECT 1 FROM directory c WHERE c.parent_id = x.id) \
                 AND NOT EXISTS (SELECT 1 FROM track t WHERE t.directory_id = x.id) \
                 AND NOT EXISTS (SELECT 1 FROM image i WHERE i.directory_id = x.id) \
                 AND NOT EXISTS (SELECT 1 FROM track_lyrics tl WHERE tl.directory_id = x.id) \
                 AND NOT EXISTS (SELECT 1 FROM playlist_file p WHERE p.directory_id = x.id) \
                 AND NOT EXISTS (SELECT 1 FROM artist_info ai WHERE ai.directory_id = x.id)"
            }
            OrphanKind::TrackEmbeddedImage => {
                "NOT EXISTS (SELECT 1 FROM track_embedded_image_link l WHERE l.track_embedded_image_id = x.id)"
            }
        }
    }
}

impl std::fmt::Display for OrphanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Ids of unreferenced rows after `last_id`, ascending.
pub async fn find_orphan_ids(
    conn: &mut SqliteConnection,
    kind: OrphanKind,
    last_id: i64,
    count: usize,
) -> sqlx::Result<Vec<i64>> {
    let sql = format!(
        "SELECT x.id FROM {} x WHERE x.id > ? AND {} ORDER BY x.id LIMIT ?",
        kind.table(),
        kind.unreferenced()
    );
    sqlx::query_scalar(&sql)
        .bind(last_id)
        .bind(count as i64)
        .fetch_all(conn)
        .await
}

pub async fn count_orphans(conn: &mut SqliteConnection, kind: OrphanKind) -> sqlx::Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} x WHERE {}",
        kind.table(),
        kind.unreferenced()
    );
    sqlx::query_scalar(&sql).fetch_one(conn).await
}

/// Delete rows by id. Returns the number actually deleted.
pub async fn delete(conn: &mut SqliteConnection, kind: OrphanKind, ids: &[i64]) -> sqlx::Result<u64> {
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    let mut deleted = 0;
    for id in ids {
        deleted += sqlx::query(&sql)
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    Ok(deleted)
}
