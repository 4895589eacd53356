//! Test utilities and fixtures.
//!
//! - [`temp_db`] - a migrated database in a temporary directory
//! - [`LibraryFixture`] - inserts directories, tracks and artwork sources
//!   directly, for tests of the lookups and resolvers
//! - [`FakeAudioScanner`] - decodes `.fake` JSON files as audio, so scan
//!   tests can build libraries without real audio encoders
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{LibraryFixture, temp_db};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (db, _dir) = temp_db().await;
//!     let mut tx = db.write_tx().await.unwrap();
//!     let fx = LibraryFixture::new(tx.conn(), "/music").await;
//!     let dir = fx.dir(tx.conn(), "/music/Album").await;
//!     // ... test logic
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnection;
use tempfile::TempDir;

use crate::config::{Config, LibraryConfig};
use crate::db::Db;
use crate::db::release::TrackLocation;
use crate::metadata::{
    ArtistMetadata, AudioFileInfo, AudioProperties, EmbeddedImage, MediumMetadata,
    ReleaseMetadata, TrackMetadata, artist_list,
};
use crate::model::{ImageType, MediaLibraryInfo, TrackArtistLinkType};
use crate::scanner::{FileScanner, ParsedFile, ScanErrorKind, ScannerRegistry};

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically. Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (Db, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = crate::db::db_url(Some(&db_path));

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (Db::new(pool), dir)
}

/// Inserts catalogue rows below one media library.
pub struct LibraryFixture {
    pub library: MediaLibraryInfo,
}

impl LibraryFixture {
    pub async fn new(conn: &mut SqliteConnection, root: &str) -> Self {
        let config = LibraryConfig {
            name: "Test".to_string(),
            path: PathBuf::from(root),
        };
        let mut libraries = crate::db::library::sync_media_libraries(conn, &[config])
            .await
            .expect("Failed to sync library");
        Self {
            library: libraries.remove(0),
        }
    }

    /// Directory id for `path`, creating parents up to the root.
    pub async fn dir(&self, conn: &mut SqliteConnection, path: &str) -> i64 {
        crate::db::library::get_or_create_directory(conn, Path::new(path), &self.library)
            .await
            .expect("Failed to create directory")
    }

    pub async fn location(&self, conn: &mut SqliteConnection, directory_id: i64) -> TrackLocation {
        let parent_directory_id: Option<i64> =
            sqlx::query_scalar("SELECT parent_id FROM directory WHERE id = ?")
                .bind(directory_id)
                .fetch_one(conn)
                .await
                .expect("Directory not found");
        TrackLocation {
            directory_id,
            parent_directory_id,
        }
    }

    pub async fn track_in(
        &self,
        conn: &mut SqliteConnection,
        directory_id: i64,
        path: &str,
        release_id: Option<i64>,
    ) -> i64 {
        let name = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        sqlx::query_scalar(
            "INSERT INTO track (absolute_file_path, name, directory_id, release_id, media_library_id) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(path)
        .bind(name)
        .bind(directory_id)
        .bind(release_id)
        .bind(self.library.id)
        .fetch_one(conn)
        .await
        .expect("Failed to insert track")
    }

    pub async fn release(&self, conn: &mut SqliteConnection, name: &str) -> i64 {
        sqlx::query_scalar("INSERT INTO release (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(conn)
            .await
            .expect("Failed to insert release")
    }

    pub async fn medium(
        &self,
        conn: &mut SqliteConnection,
        release_id: i64,
        position: i64,
        name: &str,
    ) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO medium (release_id, position, name) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(release_id)
        .bind(position)
        .bind(name)
        .fetch_one(conn)
        .await
        .expect("Failed to insert medium")
    }

    pub async fn set_medium(&self, conn: &mut SqliteConnection, track_id: i64, medium_id: i64) {
        sqlx::query("UPDATE track SET medium_id = ? WHERE id = ?")
            .bind(medium_id)
            .bind(track_id)
            .execute(conn)
            .await
            .expect("Failed to set medium");
    }

    pub async fn artist(&self, conn: &mut SqliteConnection, name: &str) -> i64 {
        sqlx::query_scalar("INSERT INTO artist (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(conn)
            .await
            .expect("Failed to insert artist")
    }

    pub async fn link(
        &self,
        conn: &mut SqliteConnection,
        track_id: i64,
        artist_id: i64,
        link_type: TrackArtistLinkType,
    ) -> i64 {
        let name: String = sqlx::query_scalar("SELECT name FROM artist WHERE id = ?")
            .bind(artist_id)
            .fetch_one(&mut *conn)
            .await
            .expect("Artist not found");
        let link = crate::db::track::NewArtistLink {
            track_id,
            artist_id,
            link_type,
            artist_name: &name,
            artist_sort_name: "",
            artist_mbid_matched: false,
        };
        crate::db::track::add_artist_link(conn, &link)
            .await
            .expect("Failed to link artist")
    }

    /// Index an image file. Returns its artwork id.
    pub async fn image(&self, conn: &mut SqliteConnection, directory_id: i64, path: &str) -> i64 {
        let stem = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let record = crate::db::image::ImageRecord {
            absolute_file_path: path.to_string(),
            stem,
            width: 500,
            height: 500,
            directory_id: Some(directory_id),
            media_library_id: Some(self.library.id),
            ..Default::default()
        };
        let image_id = crate::db::image::upsert(&mut *conn, &record)
            .await
            .expect("Failed to insert image");
        crate::db::image::artwork_for_image(conn, image_id)
            .await
            .expect("Failed to query artwork")
            .expect("Image has no artwork")
    }

    /// Embed a picture in a track. Returns its artwork id.
    pub async fn embedded(
        &self,
        conn: &mut SqliteConnection,
        track_id: i64,
        image_type: ImageType,
        width: u32,
        height: u32,
        hash: &str,
    ) -> i64 {
        let image = EmbeddedImage {
            index: 0,
            image_type,
            mime_type: "image/jpeg".to_string(),
            description: String::new(),
            size: (width * height) as usize,
            hash: hash.to_string(),
            width,
            height,
        };
        let embedded_id = crate::db::image::get_or_create_embedded(&mut *conn, &image)
            .await
            .expect("Failed to insert embedded image");
        crate::db::track::add_embedded_image_link(
            &mut *conn,
            track_id,
            embedded_id,
            0,
            image_type.as_i64(),
            "",
        )
        .await
        .expect("Failed to link embedded image");
        crate::db::image::artwork_for_embedded(conn, embedded_id)
            .await
            .expect("Failed to query artwork")
            .expect("Embedded image has no artwork")
    }
}

/// Tags of a `.fake` audio file, stored as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FakeTrack {
    pub title: String,
    pub artists: Vec<String>,
    pub artist_mbids: Vec<String>,
    pub release_artists: Vec<String>,
    pub release: Option<String>,
    pub release_mbid: Option<String>,
    pub disc: Option<u32>,
    pub disc_name: String,
    pub track_number: Option<u32>,
    pub recording_mbid: Option<String>,
    pub track_mbid: Option<String>,
    pub duration_ms: Option<u64>,
    pub genres: Vec<String>,
    pub lyrics: Option<String>,
}

impl FakeTrack {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn into_info(self) -> AudioFileInfo {
        let release = (self.release.is_some() || self.release_mbid.is_some()).then(|| {
            ReleaseMetadata {
                name: self.release.clone().unwrap_or_default(),
                mbid: self.release_mbid.clone(),
                artists: self
                    .release_artists
                    .iter()
                    .map(|name| ArtistMetadata::named(name.as_str()))
                    .collect(),
                artist_display_name: self.release_artists.join(", "),
                ..Default::default()
            }
        });
        let medium = release.map(|release| MediumMetadata {
            position: self.disc,
            name: self.disc_name.clone(),
            release: Some(release),
            ..Default::default()
        });

        AudioFileInfo {
            properties: AudioProperties {
                duration_ms: self.duration_ms.unwrap_or(180_000),
                bitrate: 320,
                sample_rate: 44_100,
                channel_count: 2,
                bits_per_sample: 16,
            },
            track: TrackMetadata {
                title: self.title,
                position: self.track_number,
                recording_mbid: self.recording_mbid,
                mbid: self.track_mbid,
                artist_display_name: self.artists.join(", "),
                artists: artist_list(self.artists, self.artist_mbids, Vec::new()),
                genres: self.genres,
                medium,
                lyrics: self.lyrics,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Decodes `.fake` files holding a [`FakeTrack`] as JSON.
pub struct FakeAudioScanner {
    extensions: Vec<String>,
}

impl Default for FakeAudioScanner {
    fn default() -> Self {
        Self {
            extensions: vec!["fake".to_string()],
        }
    }
}

impl FileScanner for FakeAudioScanner {
    fn name(&self) -> &'static str {
        "fake-audio"
    }

    fn kind(&self) -> crate::model::FileKind {
        crate::model::FileKind::Audio
    }

    fn supported_extensions(&self) -> &[String] {
        &self.extensions
    }

    fn scan(&self, path: &Path) -> Result<ParsedFile, ScanErrorKind> {
        let contents = std::fs::read_to_string(path)?;
        let track: FakeTrack =
            serde_json::from_str(&contents).map_err(|e| ScanErrorKind::AudioFile(e.to_string()))?;
        Ok(ParsedFile::Audio(Box::new(track.into_info())))
    }
}

/// The built-in decoders plus [`FakeAudioScanner`].
pub fn test_registry(config: &Config) -> ScannerRegistry {
    let mut registry = ScannerRegistry::from_config(&config.scanner);
    registry.register(Arc::new(FakeAudioScanner::default()));
    registry
}

/// Write a file below `root`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create directories");
    }
    std::fs::write(&path, contents).expect("Failed to write file");
    path
}

/// Write a `.fake` audio file.
pub fn write_track(root: &Path, relative: &str, track: &FakeTrack) -> PathBuf {
    let json = serde_json::to_string(track).expect("Failed to encode track");
    write_file(root, relative, json)
}

/// A valid 1x1 PNG.
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Config with one library rooted at `root`.
pub fn library_config(root: &Path) -> Config {
    Config {
        libraries: vec![LibraryConfig {
            name: "Test".to_string(),
            path: root.to_path_buf(),
        }],
        ..Default::default()
    }
}

/// A scan context over `config`'s libraries, as [`crate::library::ScanService`]
/// would build it, with default options and no progress output.
pub async fn scan_context(db: &Db, config: &Config) -> crate::library::ScanContext {
    let mut tx = db.write_tx().await.expect("Failed to open write transaction");
    let libraries = crate::db::library::sync_media_libraries(tx.conn(), &config.libraries)
        .await
        .expect("Failed to sync libraries");
    let previous = crate::db::settings::load(tx.conn())
        .await
        .expect("Failed to load settings");
    tx.commit().await.expect("Failed to commit");

    crate::library::ScanContext::new(
        db.clone(),
        crate::library::ScanOptions::default(),
        libraries,
        previous,
        Arc::new(std::sync::atomic::AtomicBool::new(false)),
        crate::library::no_progress(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.read_tx().await.unwrap();
        let count = crate::db::cursor::count(tx.conn(), crate::db::cursor::Table::Track)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_fixture_builds_directory_chain() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;

        let dir = fx.dir(tx.conn(), "/music/A/B").await;
        let location = fx.location(tx.conn(), dir).await;
        assert_eq!(location.directory_id, dir);
        assert!(location.parent_directory_id.is_some());
    }

    #[test]
    fn test_fake_scanner_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let track = FakeTrack {
            artists: vec!["A".to_string()],
            release: Some("R".to_string()),
            ..FakeTrack::titled("T")
        };
        let path = write_track(dir.path(), "x/01.fake", &track);

        let parsed = FakeAudioScanner::default().scan(&path).unwrap();
        let ParsedFile::Audio(info) = parsed else {
            panic!("expected audio");
        };
        assert_eq!(info.track.title, "T");
        assert_eq!(info.track.artists[0].name, "A");
        assert_eq!(info.track.medium.unwrap().release.unwrap().name, "R");
    }
}
