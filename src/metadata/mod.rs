//! File metadata extraction.
//!
//! Uses the lofty crate for format-independent tag access on audio files and
//! the image crate for picture headers. Sidecar text formats (lyrics,
//! playlists, artist.nfo) have small dedicated parsers in the submodules.
//!
//! Everything here is pure extraction: nothing touches the database. The
//! scanner wraps these readers behind [`crate::scanner::FileScanner`].

pub mod artist_info;
pub mod image;
pub mod lyrics;
pub mod playlist;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use sha2::{Digest, Sha256};
use smallvec::SmallVec;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::ImageType;

/// An artist reference as found in tags or sidecar files.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtistMetadata {
    pub mbid: Option<String>,
    pub name: String,
    pub sort_name: Option<String>,
}

impl ArtistMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Most tracks credit one or two artists per role.
pub type ArtistList = SmallVec<[ArtistMetadata; 2]>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleaseMetadata {
    pub name: String,
    pub sort_name: String,
    pub mbid: Option<String>,
    pub group_mbid: Option<String>,
    pub artists: ArtistList,
    pub artist_display_name: String,
    pub medium_count: Option<u32>,
    pub is_compilation: bool,
    pub barcode: String,
    pub comment: String,
    pub release_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediumMetadata {
    pub position: Option<u32>,
    /// Disc subtitle
    pub name: String,
    pub media: String,
    pub track_count: Option<u32>,
    pub release: Option<ReleaseMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackMetadata {
    pub title: String,
    pub position: Option<u32>,
    pub date: String,
    pub original_date: String,
    pub recording_mbid: Option<String>,
    pub mbid: Option<String>,
    pub artists: ArtistList,
    pub artist_display_name: String,
    pub composers: ArtistList,
    pub conductors: ArtistList,
    pub lyricists: ArtistList,
    pub mixers: ArtistList,
    pub producers: ArtistList,
    pub remixers: ArtistList,
    pub genres: Vec<String>,
    pub moods: Vec<String>,
    pub languages: Vec<String>,
    pub groupings: Vec<String>,
    pub copyright: String,
    pub comment: String,
    pub medium: Option<MediumMetadata>,
    /// Unsynchronized lyrics embedded in the tags
    pub lyrics: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioProperties {
    pub duration_ms: u64,
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channel_count: u8,
    pub bits_per_sample: u8,
}

/// A picture embedded in an audio file.
///
/// `(size, hash)` identifies identical pictures shared across tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub index: usize,
    pub image_type: ImageType,
    pub mime_type: String,
    pub description: String,
    pub size: usize,
    pub hash: String,
    pub width: u32,
    pub height: u32,
}

/// Everything extracted from one audio file.
#[derive(Debug, Clone, Default)]
pub struct AudioFileInfo {
    pub properties: AudioProperties,
    pub track: TrackMetadata,
    pub images: Vec<EmbeddedImage>,
    /// Pictures that could not be decoded: (index, reason)
    pub image_errors: Vec<(usize, String)>,
}

/// Read tags, audio properties and embedded pictures from an audio file.
pub fn read(path: &Path) -> Result<AudioFileInfo> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file for probing: {e}")))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read file metadata: {e}")))?;

    let props = tagged_file.properties();
    let properties = AudioProperties {
        duration_ms: props.duration().as_millis() as u64,
        bitrate: props.audio_bitrate().unwrap_or(0),
        sample_rate: props.sample_rate().unwrap_or(0),
        channel_count: props.channels().unwrap_or(0),
        bits_per_sample: props.bit_depth().unwrap_or(0),
    };

    let mut info = AudioFileInfo {
        properties,
        ..Default::default()
    };

    // Get the primary tag, or fall back to the first available tag
    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return Ok(info);
    };

    info.track = track_from_tag(tag);

    for (index, picture) in tag.pictures().iter().enumerate() {
        match embedded_image(index, picture) {
            Ok(image) => info.images.push(image),
            Err(reason) => info.image_errors.push((index, reason)),
        }
    }

    Ok(info)
}

fn track_from_tag(tag: &Tag) -> TrackMetadata {
    let text = |key: ItemKey| tag.get_string(&key).map(str::trim).unwrap_or("").to_string();
    let non_empty = |key: ItemKey| {
        let value = text(key);
        (!value.is_empty()).then_some(value)
    };
    let values = |key: ItemKey| -> Vec<String> {
        tag.get_strings(&key)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    let artists = artist_list(
        values(ItemKey::TrackArtist),
        values(ItemKey::MusicBrainzArtistId),
        values(ItemKey::TrackArtistSortOrder),
    );
    let release_artists = artist_list(
        values(ItemKey::AlbumArtist),
        values(ItemKey::MusicBrainzReleaseArtistId),
        values(ItemKey::AlbumArtistSortOrder),
    );

    let album = tag.album().map(|s| s.trim().to_string()).unwrap_or_default();
    let release_mbid = non_empty(ItemKey::MusicBrainzReleaseId);

    let release = (!album.is_empty() || release_mbid.is_some()).then(|| ReleaseMetadata {
        name: album,
        sort_name: text(ItemKey::AlbumTitleSortOrder),
        mbid: release_mbid,
        group_mbid: non_empty(ItemKey::MusicBrainzReleaseGroupId),
        artist_display_name: display_name(&release_artists),
        artists: release_artists,
        medium_count: tag.disk_total(),
        is_compilation: matches!(text(ItemKey::FlagCompilation).as_str(), "1" | "true"),
        barcode: text(ItemKey::Barcode),
        comment: String::new(),
        release_types: values(ItemKey::Unknown("RELEASETYPE".to_string())),
    });

    let medium = release.map(|release| MediumMetadata {
        position: tag.disk(),
        name: text(ItemKey::SetSubtitle),
        media: text(ItemKey::OriginalMediaType),
        track_count: tag.track_total(),
        release: Some(release),
    });

    let date = non_empty(ItemKey::RecordingDate)
        .or_else(|| tag.year().map(|y| y.to_string()))
        .unwrap_or_default();

    TrackMetadata {
        title: tag.title().map(|s| s.trim().to_string()).unwrap_or_default(),
        position: tag.track(),
        date,
        original_date: text(ItemKey::OriginalReleaseDate),
        recording_mbid: non_empty(ItemKey::MusicBrainzRecordingId),
        mbid: non_empty(ItemKey::MusicBrainzTrackId),
        artist_display_name: display_name(&artists),
        artists,
        composers: artist_list(values(ItemKey::Composer), Vec::new(), Vec::new()),
        conductors: artist_list(values(ItemKey::Conductor), Vec::new(), Vec::new()),
        lyricists: artist_list(values(ItemKey::Lyricist), Vec::new(), Vec::new()),
        mixers: artist_list(values(ItemKey::MixEngineer), Vec::new(), Vec::new()),
        producers: artist_list(values(ItemKey::Producer), Vec::new(), Vec::new()),
        remixers: artist_list(values(ItemKey::Remixer), Vec::new(), Vec::new()),
        genres: values(ItemKey::Genre),
        moods: values(ItemKey::Mood),
        languages: values(ItemKey::Language),
        groupings: values(ItemKey::ContentGroup),
        copyright: text(ItemKey::CopyrightMessage),
        comment: text(ItemKey::Comment),
        medium,
        lyrics: non_empty(ItemKey::Lyrics),
    }
}

/// Pair artist names with MBIDs and sort names.
///
/// Multi-valued MBID/sort tags are only trusted when they line up one to one
/// with the names.
pub fn artist_list(names: Vec<String>, mbids: Vec<String>, sort_names: Vec<String>) -> ArtistList {
    let mbids_match = mbids.len() == names.len();
    let sorts_match = sort_names.len() == names.len();

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| ArtistMetadata {
            name,
            mbid: mbids_match.then(|| mbids[i].clone()),
            sort_name: sorts_match.then(|| sort_names[i].clone()),
        })
        .collect()
}

fn display_name(artists: &[ArtistMetadata]) -> String {
    artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn embedded_image(index: usize, picture: &Picture) -> std::result::Result<EmbeddedImage, String> {
    let data = picture.data();
    if data.is_empty() {
        return Err("empty picture".to_string());
    }

    let (width, height) = image::probe_bytes(data).map_err(|e| e.to_string())?;

    Ok(EmbeddedImage {
        index,
        image_type: image_type(picture.pic_type()),
        mime_type: picture
            .mime_type()
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        description: picture.description().unwrap_or("").to_string(),
        size: data.len(),
        hash: content_hash(data),
        width,
        height,
    })
}

/// Hex digest identifying picture content.
pub fn content_hash(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{:x}", digest)[..32].to_string()
}

fn image_type(pic_type: PictureType) -> ImageType {
    match pic_type {
        PictureType::Other => ImageType::Other,
        PictureType::Icon => ImageType::FileIcon,
        PictureType::OtherIcon => ImageType::OtherFileIcon,
        PictureType::CoverFront => ImageType::FrontCover,
        PictureType::CoverBack => ImageType::BackCover,
        PictureType::Leaflet => ImageType::LeafletPage,
        PictureType::Media => ImageType::Media,
        PictureType::LeadArtist => ImageType::LeadArtist,
        PictureType::Artist => ImageType::Artist,
        PictureType::Conductor => ImageType::Conductor,
        PictureType::Band => ImageType::Band,
        PictureType::Composer => ImageType::Composer,
        PictureType::Lyricist => ImageType::Lyricist,
        PictureType::RecordingLocation => ImageType::RecordingLocation,
        PictureType::DuringRecording => ImageType::DuringRecording,
        PictureType::DuringPerformance => ImageType::DuringPerformance,
        PictureType::ScreenCapture => ImageType::MovieScreenCapture,
        PictureType::BrightFish => ImageType::ColouredFish,
        PictureType::Illustration => ImageType::Illustration,
        PictureType::BandLogo => ImageType::BandLogo,
        PictureType::PublisherLogo => ImageType::PublisherLogo,
        _ => ImageType::Unknown,
    }
}
