//! Core data models for the library index.
//!
//! Row types map 1:1 onto the tables created by `migrations/` and derive
//! [`sqlx::FromRow`]. MBID columns store the empty string when unset; use the
//! `mbid()` accessors to get an `Option`.
//!
//! # Database Schema
//!
//! - `media_library` / `directory` - configured roots and the directory tree
//! - `track`, `release`, `medium`, `artist` - the audio catalogue
//! - `track_artist_link` - track × artist with a name snapshot
//! - `image`, `track_embedded_image`, `artwork` - artwork sources
//! - `artist_info`, `track_lyrics`, `playlist_file` - sidecar files
//! - `cluster_type` / `cluster` - tag groupings (genre, mood, ...)

use std::path::PathBuf;

use sqlx::FromRow;

/// Kinds of files the scanner knows how to index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Audio,
    Image,
    Lyrics,
    PlayList,
    ArtistInfo,
}

impl FileKind {
    pub const ALL: [FileKind; 5] = [
        FileKind::Audio,
        FileKind::Image,
        FileKind::Lyrics,
        FileKind::PlayList,
        FileKind::ArtistInfo,
    ];

    /// Table holding one row per file of this kind.
    pub fn table(self) -> &'static str {
        match self {
            FileKind::Audio => "track",
            FileKind::Image => "image",
            FileKind::Lyrics => "track_lyrics",
            FileKind::PlayList => "playlist_file",
            FileKind::ArtistInfo => "artist_info",
        }
    }
}

/// Size and modification time recorded for an indexed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct FileStamp {
    pub file_size: i64,
    /// Unix time in milliseconds
    pub last_write_time: i64,
}

/// A media library as synced from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLibraryInfo {
    pub id: i64,
    pub name: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone, FromRow)]
pub struct Directory {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub parent_id: Option<i64>,
    pub media_library_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub sort_name: String,
    pub mbid: String,
    pub preferred_artwork_id: Option<i64>,
}

impl Artist {
    pub fn mbid(&self) -> Option<&str> {
        (!self.mbid.is_empty()).then_some(self.mbid.as_str())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Release {
    pub id: i64,
    pub name: String,
    pub sort_name: String,
    pub mbid: String,
    pub group_mbid: String,
    pub total_disc: Option<i64>,
    pub is_compilation: bool,
    pub barcode: String,
    pub comment: String,
    pub artist_display_name: String,
    pub preferred_artwork_id: Option<i64>,
}

impl Release {
    pub fn mbid(&self) -> Option<&str> {
        (!self.mbid.is_empty()).then_some(self.mbid.as_str())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Medium {
    pub id: i64,
    pub release_id: i64,
    pub position: Option<i64>,
    pub name: String,
    pub media: String,
    pub track_count: Option<i64>,
    pub preferred_artwork_id: Option<i64>,
}

/// A track row, without the purely descriptive tag columns.
#[derive(Debug, Clone, FromRow)]
pub struct Track {
    pub id: i64,
    pub absolute_file_path: String,
    pub file_size: i64,
    pub last_write_time: i64,
    pub name: String,
    pub track_number: Option<i64>,
    pub duration_ms: i64,
    pub recording_mbid: String,
    pub track_mbid: String,
    pub directory_id: Option<i64>,
    pub release_id: Option<i64>,
    pub medium_id: Option<i64>,
    pub preferred_artwork_id: Option<i64>,
    pub preferred_media_artwork_id: Option<i64>,
}

/// Role of an artist on a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackArtistLinkType {
    Artist,
    ReleaseArtist,
    Composer,
    Conductor,
    Lyricist,
    Mixer,
    Producer,
    Remixer,
}

impl TrackArtistLinkType {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Artist => 0,
            Self::ReleaseArtist => 1,
            Self::Composer => 2,
            Self::Conductor => 3,
            Self::Lyricist => 4,
            Self::Mixer => 5,
            Self::Producer => 6,
            Self::Remixer => 7,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TrackArtistLink {
    pub id: i64,
    pub track_id: i64,
    pub artist_id: i64,
    #[sqlx(rename = "type")]
    pub link_type: i64,
    pub artist_name: String,
    pub artist_sort_name: String,
    pub artist_mbid_matched: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct ArtistInfo {
    pub id: i64,
    pub absolute_file_path: String,
    pub name: String,
    pub sort_name: String,
    pub mbid: String,
    pub mbid_matched: bool,
    pub artist_id: i64,
    pub directory_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Image {
    pub id: i64,
    pub absolute_file_path: String,
    pub stem: String,
    pub file_size: i64,
    pub last_write_time: i64,
    pub width: i64,
    pub height: i64,
    pub directory_id: Option<i64>,
}

/// Picture role, following the ID3v2 APIC picture types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Unknown,
    Other,
    FileIcon,
    OtherFileIcon,
    FrontCover,
    BackCover,
    LeafletPage,
    Media,
    LeadArtist,
    Artist,
    Conductor,
    Band,
    Composer,
    Lyricist,
    RecordingLocation,
    DuringRecording,
    DuringPerformance,
    MovieScreenCapture,
    ColouredFish,
    Illustration,
    BandLogo,
    PublisherLogo,
}

impl ImageType {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Other => 1,
            Self::FileIcon => 2,
            Self::OtherFileIcon => 3,
            Self::FrontCover => 4,
            Self::BackCover => 5,
            Self::LeafletPage => 6,
            Self::Media => 7,
            Self::LeadArtist => 8,
            Self::Artist => 9,
            Self::Conductor => 10,
            Self::Band => 11,
            Self::Composer => 12,
            Self::Lyricist => 13,
            Self::RecordingLocation => 14,
            Self::DuringRecording => 15,
            Self::DuringPerformance => 16,
            Self::MovieScreenCapture => 17,
            Self::ColouredFish => 18,
            Self::Illustration => 19,
            Self::BandLogo => 20,
            Self::PublisherLogo => 21,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Cluster {
    pub id: i64,
    pub cluster_type_id: i64,
    pub name: String,
    pub track_count: i64,
    pub release_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct TrackLyrics {
    pub id: i64,
    pub absolute_file_path: Option<String>,
    pub stem: String,
    pub language: String,
    pub synchronized: bool,
    pub track_id: Option<i64>,
    pub directory_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PlayListFile {
    pub id: i64,
    pub absolute_file_path: String,
    pub name: String,
    /// JSON array of the listed paths, as written in the file
    pub files: String,
    pub directory_id: Option<i64>,
}
