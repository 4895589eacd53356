//! Preferred artwork resolution.
//!
//! Each entity kind has a fixed chain of sources, tried in order until one
//! yields an artwork. Local files beat embedded pictures, and an entity with
//! nothing of its own may inherit the artwork already resolved for its parent
//! (track from medium, medium from release).
//!
//! Resolution only reads the index; callers compare the result against the
//! stored value and write the difference.

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteConnection;

use super::sidecar::{
    ARTIST_INFO_IMAGE_NAMES, like_pattern, literal_pattern, longest_common_path,
    sanitize_file_name,
};
use crate::config::ScannerConfig;
use crate::db::artwork;
use crate::model::ImageType;

/// Where a resolved artwork came from. Each variant holds an `artwork.id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedArtwork {
    /// A standalone image file
    Image(i64),
    /// A picture embedded in a track
    Embedded(i64),
    /// The artwork already resolved for a parent entity
    Inherited(i64),
}

impl ResolvedArtwork {
    pub fn artwork_id(self) -> i64 {
        match self {
            ResolvedArtwork::Image(id)
            | ResolvedArtwork::Embedded(id)
            | ResolvedArtwork::Inherited(id) => id,
        }
    }
}

/// Optional artwork id, as stored in a `preferred_artwork_id` column.
pub fn artwork_id(resolved: Option<ResolvedArtwork>) -> Option<i64> {
    resolved.map(ResolvedArtwork::artwork_id)
}

/// Image-name settings the chains depend on.
#[derive(Debug, Clone, Default)]
pub struct ArtworkSettings {
    pub release_image_file_names: Vec<String>,
    pub medium_image_file_names: Vec<String>,
    pub artist_image_file_names: Vec<String>,
    pub artist_image_fallback_to_release: bool,
}

impl From<&ScannerConfig> for ArtworkSettings {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            release_image_file_names: config.release_image_file_names.clone(),
            medium_image_file_names: config.medium_image_file_names.clone(),
            artist_image_file_names: config.artist_image_file_names.clone(),
            artist_image_fallback_to_release: config.artist_image_fallback_to_release,
        }
    }
}

/// First image in a directory matching one of `names`, in name order.
async fn search_directory<S: AsRef<str>>(
    conn: &mut SqliteConnection,
    directory_id: i64,
    names: &[S],
) -> sqlx::Result<Option<i64>> {
    for name in names {
        let pattern = like_pattern(name.as_ref());
        if let Some(id) = artwork::find_image_in_directory(&mut *conn, directory_id, &pattern).await? {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

/// An image named after the MBID, anywhere in the library.
async fn find_by_mbid(conn: &mut SqliteConnection, mbid: &str) -> sqlx::Result<Option<i64>> {
    if mbid.is_empty() {
        return Ok(None);
    }
    artwork::find_image_by_stem(conn, mbid).await
}

async fn search_path<S: AsRef<str>>(
    conn: &mut SqliteConnection,
    path: &Path,
    names: &[S],
) -> sqlx::Result<Option<i64>> {
    match artwork::directory_id_by_path(&mut *conn, &path.to_string_lossy()).await? {
        Some(directory_id) => search_directory(conn, directory_id, names).await,
        None => Ok(None),
    }
}

/// Release chain: MBID-named image, named images in the release directories,
/// then the best embedded FrontCover, Media and Other pictures.
pub async fn resolve_release(
    conn: &mut SqliteConnection,
    settings: &ArtworkSettings,
    release_id: i64,
    mbid: &str,
) -> sqlx::Result<Option<ResolvedArtwork>> {
    if let Some(id) = find_by_mbid(&mut *conn, mbid).await? {
        return Ok(Some(ResolvedArtwork::Image(id)));
    }

    let names = &settings.release_image_file_names;
    let directories = artwork::release_directories(&mut *conn, release_id).await?;

    if directories.len() > 1 {
        let paths: Vec<&str> = directories.iter().map(|(_, p)| p.as_str()).collect();
        if let Some(common) = longest_common_path(paths.as_slice()) {
            if let Some(id) = search_path(&mut *conn, &common, names).await? {
                return Ok(Some(ResolvedArtwork::Image(id)));
            }
        }
    }

    for (directory_id, _) in &directories {
        if let Some(id) = search_directory(&mut *conn, *directory_id, names).await? {
            return Ok(Some(ResolvedArtwork::Image(id)));
        }
    }

    for image_type in [ImageType::FrontCover, ImageType::Media, ImageType::Other] {
        if let Some(id) = artwork::find_release_embedded(&mut *conn, release_id, image_type).await? {
            return Ok(Some(ResolvedArtwork::Embedded(id)));
        }
    }

    Ok(None)
}

/// Medium chain: image named after the disc subtitle, configured medium
/// names, the first embedded Media picture, then the release artwork.
pub async fn resolve_medium(
    conn: &mut SqliteConnection,
    settings: &ArtworkSettings,
    medium_id: i64,
    medium_name: &str,
    release_artwork_id: Option<i64>,
) -> sqlx::Result<Option<ResolvedArtwork>> {
    let directories = artwork::medium_directories(&mut *conn, medium_id).await?;
    let sanitized = sanitize_file_name(medium_name);

    for (directory_id, _) in &directories {
        if !sanitized.is_empty() {
            let pattern = literal_pattern(&sanitized);
            if let Some(id) = artwork::find_image_in_directory(&mut *conn, *directory_id, &pattern).await? {
                return Ok(Some(ResolvedArtwork::Image(id)));
            }
        }
        if let Some(id) =
            search_directory(&mut *conn, *directory_id, &settings.medium_image_file_names).await?
        {
            return Ok(Some(ResolvedArtwork::Image(id)));
        }
    }

    if let Some(id) = artwork::find_medium_embedded(&mut *conn, medium_id).await? {
        return Ok(Some(ResolvedArtwork::Embedded(id)));
    }

    Ok(release_artwork_id.map(ResolvedArtwork::Inherited))
}

/// Both artwork slots of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackArtwork {
    pub media: Option<ResolvedArtwork>,
    pub preferred: Option<ResolvedArtwork>,
}

/// Track chain.
///
/// Media artwork: the track's own Media picture, else the medium's artwork.
/// Preferred artwork: the media artwork, else the track's FrontCover, else
/// the release artwork.
pub async fn resolve_track(
    conn: &mut SqliteConnection,
    track_id: i64,
    medium_artwork_id: Option<i64>,
    release_artwork_id: Option<i64>,
) -> sqlx::Result<TrackArtwork> {
    let media = match artwork::find_track_embedded(&mut *conn, track_id, ImageType::Media).await? {
        Some(id) => Some(ResolvedArtwork::Embedded(id)),
        None => medium_artwork_id.map(ResolvedArtwork::Inherited),
    };

    let preferred = match media {
        Some(media) => Some(media),
        None => {
            match artwork::find_track_embedded(&mut *conn, track_id, ImageType::FrontCover).await? {
                Some(id) => Some(ResolvedArtwork::Embedded(id)),
                None => release_artwork_id.map(ResolvedArtwork::Inherited),
            }
        }
    };

    Ok(TrackArtwork { media, preferred })
}

/// Artist chain: MBID-named image, artist.nfo directory images, named images
/// climbing from the release-artist directories, then optionally the
/// earliest release's artwork.
pub async fn resolve_artist(
    conn: &mut SqliteConnection,
    settings: &ArtworkSettings,
    artist_id: i64,
    mbid: &str,
) -> sqlx::Result<Option<ResolvedArtwork>> {
    if let Some(id) = find_by_mbid(&mut *conn, mbid).await? {
        return Ok(Some(ResolvedArtwork::Image(id)));
    }

    for (directory_id, _) in artwork::artist_info_directories(&mut *conn, artist_id).await? {
        if let Some(id) = search_directory(&mut *conn, directory_id, ARTIST_INFO_IMAGE_NAMES).await? {
            return Ok(Some(ResolvedArtwork::Image(id)));
        }
    }

    let names = &settings.artist_image_file_names;
    let directories = artwork::release_artist_directories(&mut *conn, artist_id).await?;
    let paths: Vec<PathBuf> = directories.iter().map(|(_, p)| PathBuf::from(p)).collect();

    if let Some(common) = longest_common_path(&paths) {
        for ancestor in common.ancestors() {
            if let Some(id) = search_path(&mut *conn, ancestor, names).await? {
                return Ok(Some(ResolvedArtwork::Image(id)));
            }
        }
    }

    for (directory_id, _) in &directories {
        if let Some(id) = search_directory(&mut *conn, *directory_id, names).await? {
            return Ok(Some(ResolvedArtwork::Image(id)));
        }
    }

    if !settings.artist_image_fallback_to_release {
        return Ok(None);
    }
    let earliest = artwork::earliest_release_artwork(&mut *conn, artist_id).await?;
    Ok(earliest.map(ResolvedArtwork::Inherited))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{LibraryFixture, temp_db};

    fn settings() -> ArtworkSettings {
        ArtworkSettings::from(&ScannerConfig::default())
    }

    #[tokio::test]
    async fn test_multi_disc_release_uses_common_directory_cover() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;

        let album = fx.dir(tx.conn(), "/music/Artist/Album").await;
        let cd1 = fx.dir(tx.conn(), "/music/Artist/Album/CD1").await;
        let cd2 = fx.dir(tx.conn(), "/music/Artist/Album/CD2").await;
        let release = fx.release(tx.conn(), "Album").await;
        fx.track_in(tx.conn(), cd1, "/music/Artist/Album/CD1/01.flac", Some(release)).await;
        fx.track_in(tx.conn(), cd2, "/music/Artist/Album/CD2/01.flac", Some(release)).await;

        let cover = fx.image(tx.conn(), album, "/music/Artist/Album/cover.jpg").await;
        // A cover inside a disc directory loses to the shared one
        fx.image(tx.conn(), cd1, "/music/Artist/Album/CD1/cover.jpg").await;

        let resolved = resolve_release(tx.conn(), &settings(), release, "").await.unwrap();
        assert_eq!(resolved, Some(ResolvedArtwork::Image(cover)));

        // Deterministic
        let again = resolve_release(tx.conn(), &settings(), release, "").await.unwrap();
        assert_eq!(resolved, again);
    }

    #[tokio::test]
    async fn test_release_name_priority_and_case() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;

        let dir = fx.dir(tx.conn(), "/music/A").await;
        let release = fx.release(tx.conn(), "A").await;
        fx.track_in(tx.conn(), dir, "/music/A/01.mp3", Some(release)).await;
        fx.image(tx.conn(), dir, "/music/A/folder.jpg").await;
        let front = fx.image(tx.conn(), dir, "/music/A/FRONT.png").await;

        let resolved = resolve_release(tx.conn(), &settings(), release, "").await.unwrap();
        assert_eq!(resolved, Some(ResolvedArtwork::Image(front)));
    }

    #[tokio::test]
    async fn test_release_mbid_image_wins() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;

        let dir = fx.dir(tx.conn(), "/music/A").await;
        let art = fx.dir(tx.conn(), "/music/_art").await;
        let release = fx.release(tx.conn(), "A").await;
        fx.track_in(tx.conn(), dir, "/music/A/01.mp3", Some(release)).await;
        fx.image(tx.conn(), dir, "/music/A/cover.jpg").await;
        let by_mbid = fx
            .image(tx.conn(), art, "/music/_art/0D1F3A5B-0000-4000-8000-000000000001.jpg")
            .await;

        let resolved = resolve_release(
            tx.conn(),
            &settings(),
            release,
            "0d1f3a5b-0000-4000-8000-000000000001",
        )
        .await
        .unwrap();
        assert_eq!(resolved, Some(ResolvedArtwork::Image(by_mbid)));
    }

    #[tokio::test]
    async fn test_release_embedded_prefers_resolution() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;

        let dir = fx.dir(tx.conn(), "/music/A").await;
        let release = fx.release(tx.conn(), "A").await;
        let t1 = fx.track_in(tx.conn(), dir, "/music/A/01.mp3", Some(release)).await;
        let t2 = fx.track_in(tx.conn(), dir, "/music/A/02.mp3", Some(release)).await;

        fx.embedded(tx.conn(), t1, ImageType::FrontCover, 300, 300, "small").await;
        let big = fx.embedded(tx.conn(), t2, ImageType::FrontCover, 1200, 1200, "big").await;
        fx.embedded(tx.conn(), t1, ImageType::Media, 2000, 2000, "media").await;

        let resolved = resolve_release(tx.conn(), &settings(), release, "").await.unwrap();
        assert_eq!(resolved, Some(ResolvedArtwork::Embedded(big)));
    }

    #[tokio::test]
    async fn test_medium_and_track_inherit() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;

        let dir = fx.dir(tx.conn(), "/music/A").await;
        let release = fx.release(tx.conn(), "A").await;
        let medium = fx.medium(tx.conn(), release, 1, "Bonus: Live").await;
        let track = fx.track_in(tx.conn(), dir, "/music/A/01.mp3", Some(release)).await;
        fx.set_medium(tx.conn(), track, medium).await;

        let cover = fx.image(tx.conn(), dir, "/music/A/cover.jpg").await;

        let resolved = resolve_medium(tx.conn(), &settings(), medium, "Bonus: Live", Some(cover))
            .await
            .unwrap();
        assert_eq!(resolved, Some(ResolvedArtwork::Inherited(cover)));

        let disc = fx.image(tx.conn(), dir, "/music/A/Bonus_ Live.jpg").await;
        let resolved = resolve_medium(tx.conn(), &settings(), medium, "Bonus: Live", Some(cover))
            .await
            .unwrap();
        assert_eq!(resolved, Some(ResolvedArtwork::Image(disc)));

        let track_art = resolve_track(tx.conn(), track, Some(disc), Some(cover)).await.unwrap();
        assert_eq!(track_art.media, Some(ResolvedArtwork::Inherited(disc)));
        assert_eq!(track_art.preferred, Some(ResolvedArtwork::Inherited(disc)));

        let no_medium = resolve_track(tx.conn(), track, None, Some(cover)).await.unwrap();
        assert_eq!(no_medium.media, None);
        assert_eq!(no_medium.preferred, Some(ResolvedArtwork::Inherited(cover)));
    }

    #[tokio::test]
    async fn test_track_prefers_own_front_cover_over_release() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;

        let dir = fx.dir(tx.conn(), "/music/A").await;
        let release = fx.release(tx.conn(), "A").await;
        let track = fx.track_in(tx.conn(), dir, "/music/A/01.mp3", Some(release)).await;
        let front = fx.embedded(tx.conn(), track, ImageType::FrontCover, 500, 500, "f").await;
        let cover = fx.image(tx.conn(), dir, "/music/A/cover.jpg").await;

        let resolved = resolve_track(tx.conn(), track, None, Some(cover)).await.unwrap();
        assert_eq!(resolved.preferred, Some(ResolvedArtwork::Embedded(front)));
    }

    #[tokio::test]
    async fn test_artist_climbs_from_release_directories() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;

        let artist_dir = fx.dir(tx.conn(), "/music/Artist").await;
        let a = fx.dir(tx.conn(), "/music/Artist/Album A").await;
        let b = fx.dir(tx.conn(), "/music/Artist/Album B").await;
        let artist = fx.artist(tx.conn(), "Artist").await;
        for (dir, path) in [(a, "/music/Artist/Album A/01.mp3"), (b, "/music/Artist/Album B/01.mp3")] {
            let track = fx.track_in(tx.conn(), dir, path, None).await;
            fx.link(tx.conn(), track, artist, crate::model::TrackArtistLinkType::ReleaseArtist).await;
        }
        let image = fx.image(tx.conn(), artist_dir, "/music/Artist/artist.jpg").await;

        let resolved = resolve_artist(tx.conn(), &settings(), artist, "").await.unwrap();
        assert_eq!(resolved, Some(ResolvedArtwork::Image(image)));
    }

    #[tokio::test]
    async fn test_artist_release_fallback_is_optional() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;

        let dir = fx.dir(tx.conn(), "/music/A").await;
        let artist = fx.artist(tx.conn(), "A").await;
        let release = fx.release(tx.conn(), "A").await;
        let track = fx.track_in(tx.conn(), dir, "/music/A/01.mp3", Some(release)).await;
        fx.link(tx.conn(), track, artist, crate::model::TrackArtistLinkType::ReleaseArtist).await;
        let guest = fx.artist(tx.conn(), "Guest").await;
        fx.link(tx.conn(), track, guest, crate::model::TrackArtistLinkType::Artist).await;
        let cover = fx.image(tx.conn(), dir, "/music/A/cover.jpg").await;
        crate::db::artwork::set_preferred_artwork(
            tx.conn(),
            crate::db::artwork::ArtworkTarget::Release,
            release,
            Some(cover),
        )
        .await
        .unwrap();

        let without = resolve_artist(tx.conn(), &settings(), artist, "").await.unwrap();
        assert_eq!(without, None);

        let with = ArtworkSettings {
            artist_image_fallback_to_release: true,
            ..settings()
        };
        let resolved = resolve_artist(tx.conn(), &with, artist, "").await.unwrap();
        assert_eq!(resolved, Some(ResolvedArtwork::Inherited(cover)));

        // Track artists do not inherit release artwork
        let resolved = resolve_artist(tx.conn(), &with, guest, "").await.unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn test_artist_release_fallback_skips_releases_without_artwork() {
        let (db, _dir) = temp_db().await;
        let mut tx = db.write_tx().await.unwrap();
        let fx = LibraryFixture::new(tx.conn(), "/music").await;

        let artist = fx.artist(tx.conn(), "A").await;
        let old_dir = fx.dir(tx.conn(), "/music/A/Old").await;
        let new_dir = fx.dir(tx.conn(), "/music/A/New").await;
        let old = fx.release(tx.conn(), "Old").await;
        let new = fx.release(tx.conn(), "New").await;
        for (dir, path, release, date) in [
            (old_dir, "/music/A/Old/01.mp3", old, "1990"),
            (new_dir, "/music/A/New/01.mp3", new, "2010"),
        ] {
            let track = fx.track_in(tx.conn(), dir, path, Some(release)).await;
            sqlx::query("UPDATE track SET original_date = ? WHERE id = ?")
                .bind(date)
                .bind(track)
                .execute(tx.conn())
                .await
                .unwrap();
            fx.link(tx.conn(), track, artist, crate::model::TrackArtistLinkType::ReleaseArtist).await;
        }
        let cover = fx.image(tx.conn(), new_dir, "/music/A/New/cover.jpg").await;
        crate::db::artwork::set_preferred_artwork(
            tx.conn(),
            crate::db::artwork::ArtworkTarget::Release,
            new,
            Some(cover),
        )
        .await
        .unwrap();

        let with = ArtworkSettings {
            artist_image_fallback_to_release: true,
            ..settings()
        };
        let resolved = resolve_artist(tx.conn(), &with, artist, "").await.unwrap();
        assert_eq!(resolved, Some(ResolvedArtwork::Inherited(cover)));
    }
}
