//! Writing decoded files into the index.
//!
//! Runs inside the ScanFiles write transaction, one call per file. Every
//! function here only touches the rows belonging to that file (plus the
//! shared entities it references, created on demand).

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteConnection;

use crate::db::{artist, artist_info, cluster, files, image, library, lyrics, playlist, release, track};
use crate::library::context::ScanStats;
use crate::metadata::artist_info::ArtistInfoFile;
use crate::metadata::lyrics::Lyrics;
use crate::metadata::playlist::PlayList;
use crate::metadata::{ArtistList, AudioFileInfo};
use crate::model::{MediaLibraryInfo, TrackArtistLinkType};
use crate::queue::FileScanResult;
use crate::scanner::walk::is_within_roots;
use crate::scanner::{ParsedFile, ScanError, ScanErrorKind, WalkedFile};

/// Settings that change how files are written.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestSettings {
    pub allow_artist_mbid_fallback: bool,
    pub skip_duplicate_recording_mbid: bool,
}

/// Writes scan results for a set of libraries.
pub struct Ingester<'a> {
    libraries: &'a [MediaLibraryInfo],
    roots: Vec<PathBuf>,
    settings: IngestSettings,
}

impl<'a> Ingester<'a> {
    pub fn new(libraries: &'a [MediaLibraryInfo], settings: IngestSettings) -> Self {
        Self {
            libraries,
            roots: libraries.iter().map(|l| l.root.clone()).collect(),
            settings,
        }
    }

    /// The innermost library containing `path`.
    fn library_of(&self, path: &Path) -> Option<&'a MediaLibraryInfo> {
        self.libraries
            .iter()
            .filter(|l| path.starts_with(&l.root))
            .max_by_key(|l| l.root.components().count())
    }

    /// Apply one decode result, updating `stats`.
    pub async fn apply(
        &self,
        conn: &mut SqliteConnection,
        result: FileScanResult,
        stats: &mut ScanStats,
    ) -> sqlx::Result<()> {
        let FileScanResult { file, kind, parsed, .. } = result;
        let path = file.path.to_string_lossy().to_string();

        let Some(media_library) = self.library_of(&file.path) else {
            tracing::warn!(target: "library::ingest", path = %file.path.display(), "File is outside every library, skipped");
            stats.skips += 1;
            return Ok(());
        };

        stats.deletions += files::delete_from_other_kinds(&mut *conn, kind, &path).await?;

        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::debug!(target: "library::ingest", path = %file.path.display(), error = %error, "Cannot decode file");
                stats.add_error(ScanError::new(&file.path, error));
                if files::delete_by_path(&mut *conn, kind, &path).await? {
                    stats.deletions += 1;
                }
                return Ok(());
            }
        };

        let directory_id = match file.path.parent() {
            Some(parent) => {
                Some(library::get_or_create_directory(&mut *conn, parent, media_library).await?)
            }
            None => None,
        };

        match parsed {
            ParsedFile::Audio(info) => {
                self.apply_audio(conn, &file, &path, *info, media_library, directory_id, stats)
                    .await
            }
            ParsedFile::Image { width, height } => {
                let existed = image::find_by_path(&mut *conn, &path).await?.is_some();
                let record = image::ImageRecord {
                    absolute_file_path: path,
                    stem: file_stem(&file.path),
                    file_size: file.file_size,
                    last_write_time: file.last_write_time,
                    width: i64::from(width),
                    height: i64::from(height),
                    directory_id,
                    media_library_id: Some(media_library.id),
                };
                image::upsert(conn, &record).await?;
                count_write(stats, existed);
                Ok(())
            }
            ParsedFile::Lyrics(parsed) => {
                self.apply_lyrics(conn, &file, path, parsed, directory_id, stats).await
            }
            ParsedFile::PlayList(parsed) => {
                self.apply_playlist(conn, &file, path, parsed, directory_id, stats).await
            }
            ParsedFile::ArtistInfo(parsed) => {
                self.apply_artist_info(conn, &file, path, parsed, directory_id, stats).await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_audio(
        &self,
        conn: &mut SqliteConnection,
        file: &WalkedFile,
        path: &str,
        info: AudioFileInfo,
        media_library: &MediaLibraryInfo,
        directory_id: Option<i64>,
        stats: &mut ScanStats,
    ) -> sqlx::Result<()> {
        let meta = &info.track;
        let mut existing_id = track::find_by_path(&mut *conn, path).await?.map(|t| t.id);

        // A file moved since the last scan keeps its row (and its id)
        if existing_id.is_none() {
            if let Some(mbid) = non_empty(&meta.mbid) {
                let candidates = track::find_by_track_mbid(&mut *conn, mbid).await?;
                if let [moved] = candidates.as_slice() {
                    if !Path::new(&moved.absolute_file_path).exists() {
                        tracing::debug!(
                            target: "library::ingest",
                            from = %moved.absolute_file_path,
                            to = %file.path.display(),
                            "Track moved"
                        );
                        existing_id = Some(moved.id);
                    }
                }
            }
        }

        if self.settings.skip_duplicate_recording_mbid {
            if let Some(recording) = non_empty(&meta.recording_mbid) {
                let others = track::find_paths_by_recording_mbid(&mut *conn, recording, path).await?;
                let duplicate = others.iter().map(Path::new).find(|p| {
                    is_within_roots(p, &self.roots) && p.exists()
                });
                if let Some(other) = duplicate {
                    tracing::debug!(
                        target: "library::ingest",
                        path = %file.path.display(),
                        other = %other.display(),
                        "Skipping duplicate recording"
                    );
                    if let Some(id) = existing_id {
                        track::delete(&mut *conn, id).await?;
                        stats.deletions += 1;
                    }
                    stats.skips += 1;
                    return Ok(());
                }
            }
        }

        if info.properties.duration_ms == 0 {
            stats.add_error(ScanError::new(&file.path, ScanErrorKind::BadAudioDuration));
            if let Some(id) = existing_id {
                track::delete(&mut *conn, id).await?;
                stats.deletions += 1;
            }
            return Ok(());
        }

        let release_meta = meta.medium.as_ref().and_then(|m| m.release.as_ref().map(|r| (m, r)));
        let (release_id, medium_id) = match (release_meta, directory_id) {
            (Some((medium_meta, release_meta)), Some(directory_id)) => {
                let parent_directory_id = match file.path.parent() {
                    Some(dir) => library::find_directory_by_path(&mut *conn, dir)
                        .await?
                        .and_then(|d| d.parent_id),
                    None => None,
                };
                let location = release::TrackLocation {
                    directory_id,
                    parent_directory_id,
                };
                let release_id = release::get_or_create(&mut *conn, release_meta, location).await?;
                let medium_id = release::get_or_create_medium(&mut *conn, release_id, medium_meta).await?;
                (Some(release_id), Some(medium_id))
            }
            _ => (None, None),
        };

        let name = if meta.title.is_empty() {
            file.path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        } else {
            meta.title.clone()
        };

        let record = track::TrackRecord {
            absolute_file_path: path.to_string(),
            file_size: file.file_size,
            last_write_time: file.last_write_time,
            name,
            track_number: meta.position.map(i64::from),
            date: meta.date.clone(),
            original_date: meta.original_date.clone(),
            duration_ms: info.properties.duration_ms as i64,
            bitrate: i64::from(info.properties.bitrate),
            sample_rate: i64::from(info.properties.sample_rate),
            channel_count: i64::from(info.properties.channel_count),
            bits_per_sample: i64::from(info.properties.bits_per_sample),
            recording_mbid: meta.recording_mbid.clone().unwrap_or_default(),
            track_mbid: meta.mbid.clone().unwrap_or_default(),
            copyright: meta.copyright.clone(),
            comment: meta.comment.clone(),
            artist_display_name: meta.artist_display_name.clone(),
            media_library_id: Some(media_library.id),
            directory_id,
            release_id,
            medium_id,
        };
        let track_id = track::upsert(&mut *conn, existing_id, &record).await?;
        count_write(stats, existing_id.is_some());

        track::clear_artist_links(&mut *conn, track_id).await?;
        let release_artists = release_meta.map(|(_, r)| &r.artists);
        let roles: [(TrackArtistLinkType, Option<&ArtistList>); 8] = [
            (TrackArtistLinkType::Artist, Some(&meta.artists)),
            (TrackArtistLinkType::ReleaseArtist, release_artists),
            (TrackArtistLinkType::Composer, Some(&meta.composers)),
            (TrackArtistLinkType::Conductor, Some(&meta.conductors)),
            (TrackArtistLinkType::Lyricist, Some(&meta.lyricists)),
            (TrackArtistLinkType::Mixer, Some(&meta.mixers)),
            (TrackArtistLinkType::Producer, Some(&meta.producers)),
            (TrackArtistLinkType::Remixer, Some(&meta.remixers)),
        ];
        for (link_type, artists) in roles {
            for credited in artists.into_iter().flatten() {
                if credited.name.is_empty() {
                    continue;
                }
                let artist_id = artist::get_or_create(
                    &mut *conn,
                    credited,
                    self.settings.allow_artist_mbid_fallback,
                )
                .await?;
                let link = track::NewArtistLink {
                    track_id,
                    artist_id,
                    link_type,
                    artist_name: &credited.name,
                    artist_sort_name: credited.sort_name.as_deref().unwrap_or(""),
                    // get_or_create always lands on the artist carrying the MBID
                    artist_mbid_matched: non_empty(&credited.mbid).is_some(),
                };
                track::add_artist_link(&mut *conn, &link).await?;
            }
        }

        let mut cluster_ids = Vec::new();
        for (cluster_type, values) in [
            (cluster::GENRE, &meta.genres),
            (cluster::MOOD, &meta.moods),
            (cluster::LANGUAGE, &meta.languages),
            (cluster::GROUPING, &meta.groupings),
        ] {
            if values.is_empty() {
                continue;
            }
            let type_id = cluster::get_or_create_type(&mut *conn, cluster_type).await?;
            for value in values {
                cluster_ids.push(cluster::get_or_create(&mut *conn, type_id, value).await?);
            }
        }
        track::set_clusters(&mut *conn, track_id, &cluster_ids).await?;

        track::clear_embedded_image_links(&mut *conn, track_id).await?;
        for embedded in &info.images {
            let embedded_id = image::get_or_create_embedded(&mut *conn, embedded).await?;
            track::add_embedded_image_link(
                &mut *conn,
                track_id,
                embedded_id,
                embedded.index,
                embedded.image_type.as_i64(),
                &embedded.description,
            )
            .await?;
        }
        for (index, reason) in &info.image_errors {
            stats.add_error(ScanError::new(
                &file.path,
                ScanErrorKind::EmbeddedImage {
                    index: *index,
                    reason: reason.clone(),
                },
            ));
        }

        let embedded_lyrics = meta.lyrics.as_deref().map(crate::metadata::lyrics::parse);
        lyrics::set_embedded(conn, track_id, embedded_lyrics.as_ref()).await?;

        Ok(())
    }

    async fn apply_lyrics(
        &self,
        conn: &mut SqliteConnection,
        file: &WalkedFile,
        path: String,
        parsed: Lyrics,
        directory_id: Option<i64>,
        stats: &mut ScanStats,
    ) -> sqlx::Result<()> {
        let existed = files::find_stamp(&mut *conn, crate::model::FileKind::Lyrics, &path)
            .await?
            .is_some();
        let record = lyrics::LyricsFile {
            absolute_file_path: path,
            stem: file_stem(&file.path),
            file_size: file.file_size,
            last_write_time: file.last_write_time,
            directory_id,
        };
        lyrics::upsert_external(conn, &record, &parsed).await?;
        count_write(stats, existed);
        Ok(())
    }

    async fn apply_playlist(
        &self,
        conn: &mut SqliteConnection,
        file: &WalkedFile,
        path: String,
        parsed: PlayList,
        directory_id: Option<i64>,
        stats: &mut ScanStats,
    ) -> sqlx::Result<()> {
        let existed = files::find_stamp(&mut *conn, crate::model::FileKind::PlayList, &path)
            .await?
            .is_some();
        let record = playlist::PlayListRecord {
            absolute_file_path: path,
            file_size: file.file_size,
            last_write_time: file.last_write_time,
            name: parsed.name,
            files: parsed.files,
            directory_id,
        };
        playlist::upsert(conn, &record).await?;
        count_write(stats, existed);
        Ok(())
    }

    async fn apply_artist_info(
        &self,
        conn: &mut SqliteConnection,
        file: &WalkedFile,
        path: String,
        parsed: ArtistInfoFile,
        directory_id: Option<i64>,
        stats: &mut ScanStats,
    ) -> sqlx::Result<()> {
        let existed = artist_info::find_by_path(&mut *conn, &path).await?.is_some();
        let artist_id = artist::get_or_create(
            &mut *conn,
            &parsed.artist,
            self.settings.allow_artist_mbid_fallback,
        )
        .await?;

        let record = artist_info::ArtistInfoRecord {
            absolute_file_path: path,
            file_size: file.file_size,
            last_write_time: file.last_write_time,
            name: parsed.artist.name.clone(),
            sort_name: parsed.artist.sort_name.clone().unwrap_or_default(),
            mbid: parsed.artist.mbid.clone().unwrap_or_default(),
            artist_type: parsed.artist_type,
            gender: parsed.gender,
            disambiguation: parsed.disambiguation,
            biography: parsed.biography,
            mbid_matched: non_empty(&parsed.artist.mbid).is_some(),
            artist_id,
            directory_id,
        };
        artist_info::upsert(conn, &record).await?;
        count_write(stats, existed);
        Ok(())
    }
}

fn count_write(stats: &mut ScanStats, existed: bool) {
    if existed {
        stats.updates += 1;
    } else {
        stats.additions += 1;
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
