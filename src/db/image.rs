//! Standalone images, embedded pictures and their artwork rows.
//!
//! Each image source gets exactly one `artwork` row, created together with
//! the source and removed with it through `ON DELETE CASCADE`.

use sqlx::sqlite::SqliteConnection;

use crate::metadata::EmbeddedImage;
use crate::model::Image;

/// Column values written for a scanned image file.
#[derive(Debug, Clone, Default)]
pub struct ImageRecord {
    pub absolute_file_path: String,
    pub stem: String,
    pub file_size: i64,
    pub last_write_time: i64,
    pub width: i64,
    pub height: i64,
    pub directory_id: Option<i64>,
    pub media_library_id: Option<i64>,
}

pub async fn find_by_path(conn: &mut SqliteConnection, path: &str) -> sqlx::Result<Option<Image>> {
    sqlx::query_as(
        "SELECT id, absolute_file_path, stem, file_size, last_write_time, width, height, directory_id \
         FROM image WHERE absolute_file_path = ?",
    )
    .bind(path)
    .fetch_optional(conn)
    .await
}

/// Insert or refresh an image row. Returns the image id.
pub async fn upsert(conn: &mut SqliteConnection, record: &ImageRecord) -> sqlx::Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO image (absolute_file_path, stem, file_size, last_write_time, width, height, \
         directory_id, media_library_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (absolute_file_path) DO UPDATE SET stem = excluded.stem, \
         file_size = excluded.file_size, last_write_time = excluded.last_write_time, \
         width = excluded.width, height = excluded.height, directory_id = excluded.directory_id, \
         media_library_id = excluded.media_library_id \
         RETURNING id",
    )
    .bind(&record.absolute_file_path)
    .bind(&record.stem)
    .bind(record.file_size)
    .bind(record.last_write_time)
    .bind(record.width)
    .bind(record.height)
    .bind(record.directory_id)
    .bind(record.media_library_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO artwork (image_id) VALUES (?)")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(id)
}

/// Find the stored copy of an embedded picture by `(size, hash)`, or store it.
pub async fn get_or_create_embedded(
    conn: &mut SqliteConnection,
    image: &EmbeddedImage,
) -> sqlx::Result<i64> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM track_embedded_image WHERE size = ? AND hash = ?")
            .bind(image.size as i64)
            .bind(&image.hash)
            .fetch_optional(&mut *conn)
            .await?;

    let id = match existing {
        Some(id) => id,
        None => {
            sqlx::query_scalar(
                "INSERT INTO track_embedded_image (size, hash, width, height, mime_type) \
                 VALUES (?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(image.size as i64)
            .bind(&image.hash)
            .bind(i64::from(image.width))
            .bind(i64::from(image.height))
            .bind(&image.mime_type)
            .fetch_one(&mut *conn)
            .await?
        }
    };

    sqlx::query("INSERT OR IGNORE INTO artwork (track_embedded_image_id) VALUES (?)")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(id)
}

pub async fn artwork_for_image(
    conn: &mut SqliteConnection,
    image_id: i64,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM artwork WHERE image_id = ?")
        .bind(image_id)
        .fetch_optional(conn)
        .await
}

pub async fn artwork_for_embedded(
    conn: &mut SqliteConnection,
    embedded_image_id: i64,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM artwork WHERE track_embedded_image_id = ?")
        .bind(embedded_image_id)
        .fetch_optional(conn)
        .await
}
