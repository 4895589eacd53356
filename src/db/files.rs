//! Queries shared by every table that holds one row per file.

use sqlx::sqlite::SqliteConnection;

use crate::model::{FileKind, FileStamp};

/// Stored size and modification time of an indexed file.
pub async fn find_stamp(
    conn: &mut SqliteConnection,
    kind: FileKind,
    path: &str,
) -> sqlx::Result<Option<FileStamp>> {
    let sql = format!(
        "SELECT file_size, last_write_time FROM {} WHERE absolute_file_path = ?",
        kind.table()
    );
    sqlx::query_as(&sql).bind(path).fetch_optional(conn).await
}

/// `(id, path)` of the next `count` file rows after `last_id`.
///
/// Embedded lyrics have no path and are skipped.
pub async fn find_paths_after(
    conn: &mut SqliteConnection,
    kind: FileKind,
    last_id: i64,
    count: usize,
) -> sqlx::Result<Vec<(i64, String)>> {
    let sql = format!(
        "SELECT id, absolute_file_path FROM {} \
         WHERE id > ? AND absolute_file_path IS NOT NULL \
         ORDER BY id LIMIT ?",
        kind.table()
    );
    sqlx::query_as(&sql)
        .bind(last_id)
        .bind(count as i64)
        .fetch_all(conn)
        .await
}

/// Delete a file row by path. Returns whether a row existed.
pub async fn delete_by_path(
    conn: &mut SqliteConnection,
    kind: FileKind,
    path: &str,
) -> sqlx::Result<bool> {
    let sql = format!("DELETE FROM {} WHERE absolute_file_path = ?", kind.table());
    let result = sqlx::query(&sql).bind(path).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_by_id(
    conn: &mut SqliteConnection,
    kind: FileKind,
    id: i64,
) -> sqlx::Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    let result = sqlx::query(&sql).bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a file row stored under a different kind's table.
///
/// Used when a file changes kind between scans (e.g. a new extension mapping).
pub async fn delete_from_other_kinds(
    conn: &mut SqliteConnection,
    kind: FileKind,
    path: &str,
) -> sqlx::Result<u64> {
    let mut removed = 0;
    for other in FileKind::ALL.into_iter().filter(|k| *k != kind) {
        if delete_by_path(&mut *conn, other, path).await? {
            removed += 1;
        }
    }
    Ok(removed)
}
