//! Media libraries and the directory tree.

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteConnection;

use crate::config::LibraryConfig;
use crate::model::{Directory, MediaLibraryInfo};

/// Make the `media_library` table match the configured libraries.
///
/// Libraries are keyed by root path. Removed libraries are deleted; rows that
/// referenced them lose their library and are cleaned up by the removed-file
/// check.
pub async fn sync_media_libraries(
    conn: &mut SqliteConnection,
    libraries: &[LibraryConfig],
) -> sqlx::Result<Vec<MediaLibraryInfo>> {
    let mut synced = Vec::with_capacity(libraries.len());

    for library in libraries {
        let path = library.path.to_string_lossy();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO media_library (name, path) VALUES (?, ?) \
             ON CONFLICT (path) DO UPDATE SET name = excluded.name \
             RETURNING id",
        )
        .bind(&library.name)
        .bind(path.as_ref())
        .fetch_one(&mut *conn)
        .await?;

        synced.push(MediaLibraryInfo {
            id,
            name: library.name.clone(),
            root: library.path.clone(),
        });
    }

    let existing: Vec<(i64, String)> = sqlx::query_as("SELECT id, path FROM media_library")
        .fetch_all(&mut *conn)
        .await?;
    for (id, path) in existing {
        if !synced.iter().any(|l| l.id == id) {
            tracing::info!(target: "db::library", path = %path, "Removing media library no longer configured");
            sqlx::query("DELETE FROM media_library WHERE id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }

    Ok(synced)
}

pub async fn find_directory_by_path(
    conn: &mut SqliteConnection,
    path: &Path,
) -> sqlx::Result<Option<Directory>> {
    sqlx::query_as(
        "SELECT id, path, name, parent_id, media_library_id FROM directory WHERE path = ?",
    )
    .bind(path.to_string_lossy().as_ref())
    .fetch_optional(conn)
    .await
}

/// Get the directory row for `path`, creating it and any missing ancestors up
/// to the library root.
pub async fn get_or_create_directory(
    conn: &mut SqliteConnection,
    path: &Path,
    library: &MediaLibraryInfo,
) -> sqlx::Result<i64> {
    if let Some(dir) = find_directory_by_path(&mut *conn, path).await? {
        if dir.media_library_id != Some(library.id) {
            sqlx::query("UPDATE directory SET media_library_id = ? WHERE id = ?")
                .bind(library.id)
                .bind(dir.id)
                .execute(&mut *conn)
                .await?;
        }
        return Ok(dir.id);
    }

    // Ancestors from the library root (inclusive) down to `path`
    let chain: Vec<PathBuf> = if path.starts_with(&library.root) {
        let mut chain: Vec<PathBuf> = path
            .ancestors()
            .take_while(|p| p.starts_with(&library.root))
            .map(Path::to_path_buf)
            .collect();
        chain.reverse();
        chain
    } else {
        vec![path.to_path_buf()]
    };

    let mut parent_id: Option<i64> = None;
    for dir_path in chain {
        let existing = find_directory_by_path(&mut *conn, &dir_path).await?;
        let id = match existing {
            Some(dir) => dir.id,
            None => {
                let name = dir_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| dir_path.to_string_lossy().into_owned());
                sqlx::query_scalar(
                    "INSERT INTO directory (path, name, parent_id, media_library_id) \
                     VALUES (?, ?, ?, ?) RETURNING id",
                )
                .bind(dir_path.to_string_lossy().as_ref())
                .bind(name)
                .bind(parent_id)
                .bind(library.id)
                .fetch_one(&mut *conn)
                .await?
            }
        };
        parent_id = Some(id);
    }

    // The chain always contains at least `path` itself
    Ok(parent_id.unwrap_or_default())
}
