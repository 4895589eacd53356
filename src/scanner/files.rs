//! Built-in decoders.

use std::path::Path;

use super::{FileScanner, ParsedFile, ScanErrorKind};
use crate::metadata::{self, artist_info, lyrics, playlist};
use crate::model::FileKind;

fn lowercase(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim_start_matches('.').to_lowercase())
        .collect()
}

/// Text sidecar files are small; anything else is almost certainly not text.
const MAX_TEXT_FILE_SIZE: u64 = 4 * 1024 * 1024;

fn read_text(path: &Path) -> Result<String, ScanErrorKind> {
    let len = std::fs::metadata(path)?.len();
    if len > MAX_TEXT_FILE_SIZE {
        return Err(ScanErrorKind::Io(format!("file too large ({len} bytes)")));
    }
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Audio files, read through lofty.
#[derive(Debug, Clone)]
pub struct AudioFileScanner {
    extensions: Vec<String>,
}

impl AudioFileScanner {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: lowercase(extensions),
        }
    }
}

impl FileScanner for AudioFileScanner {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn kind(&self) -> FileKind {
        FileKind::Audio
    }

    fn supported_extensions(&self) -> &[String] {
        &self.extensions
    }

    fn scan(&self, path: &Path) -> Result<ParsedFile, ScanErrorKind> {
        let info = metadata::read(path).map_err(|e| ScanErrorKind::AudioFile(e.to_string()))?;

        let props = &info.properties;
        if props.sample_rate == 0 && props.channel_count == 0 && props.duration_ms == 0 {
            return Err(ScanErrorKind::NoAudioTrack);
        }

        Ok(ParsedFile::Audio(Box::new(info)))
    }
}

/// Standalone image files. Only the header is read.
#[derive(Debug, Clone)]
pub struct ImageFileScanner {
    extensions: Vec<String>,
}

impl ImageFileScanner {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: lowercase(extensions),
        }
    }
}

impl FileScanner for ImageFileScanner {
    fn name(&self) -> &'static str {
        "image"
    }

    fn kind(&self) -> FileKind {
        FileKind::Image
    }

    fn supported_extensions(&self) -> &[String] {
        &self.extensions
    }

    fn scan(&self, path: &Path) -> Result<ParsedFile, ScanErrorKind> {
        let (width, height) = metadata::image::probe_file(path)
            .map_err(|e| ScanErrorKind::ImageFile(e.to_string()))?;
        Ok(ParsedFile::Image { width, height })
    }
}

#[derive(Debug, Clone)]
pub struct LyricsFileScanner {
    extensions: Vec<String>,
}

impl LyricsFileScanner {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: lowercase(extensions),
        }
    }
}

impl FileScanner for LyricsFileScanner {
    fn name(&self) -> &'static str {
        "lyrics"
    }

    fn kind(&self) -> FileKind {
        FileKind::Lyrics
    }

    fn supported_extensions(&self) -> &[String] {
        &self.extensions
    }

    fn scan(&self, path: &Path) -> Result<ParsedFile, ScanErrorKind> {
        let contents = read_text(path).map_err(|e| ScanErrorKind::LyricsFile(e.to_string()))?;
        let parsed = lyrics::parse(&contents);
        if parsed.lines.is_empty() {
            return Err(ScanErrorKind::LyricsFile("no lyrics found".to_string()));
        }
        Ok(ParsedFile::Lyrics(parsed))
    }
}

#[derive(Debug, Clone)]
pub struct PlayListFileScanner {
    extensions: Vec<String>,
}

impl PlayListFileScanner {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: lowercase(extensions),
        }
    }
}

impl FileScanner for PlayListFileScanner {
    fn name(&self) -> &'static str {
        "playlist"
    }

    fn kind(&self) -> FileKind {
        FileKind::PlayList
    }

    fn supported_extensions(&self) -> &[String] {
        &self.extensions
    }

    fn scan(&self, path: &Path) -> Result<ParsedFile, ScanErrorKind> {
        let contents =
            read_text(path).map_err(|e| ScanErrorKind::PlayListFile(e.to_string()))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(ParsedFile::PlayList(playlist::parse(&contents, &stem)))
    }
}

/// `artist.nfo` sidecars, selected by exact file name.
#[derive(Debug, Clone)]
pub struct ArtistInfoFileScanner {
    file_names: Vec<String>,
}

impl ArtistInfoFileScanner {
    pub fn new(file_names: &[String]) -> Self {
        Self {
            file_names: file_names.iter().map(|n| n.to_lowercase()).collect(),
        }
    }
}

impl FileScanner for ArtistInfoFileScanner {
    fn name(&self) -> &'static str {
        "artist-info"
    }

    fn kind(&self) -> FileKind {
        FileKind::ArtistInfo
    }

    fn supported_extensions(&self) -> &[String] {
        &[]
    }

    fn supported_files(&self) -> &[String] {
        &self.file_names
    }

    fn scan(&self, path: &Path) -> Result<ParsedFile, ScanErrorKind> {
        let contents =
            read_text(path).map_err(|e| ScanErrorKind::ArtistInfoFile(e.to_string()))?;
        match artist_info::parse(&contents) {
            Ok(info) => Ok(ParsedFile::ArtistInfo(info)),
            Err(artist_info::ArtistInfoError::MissingArtistName) => {
                Err(ScanErrorKind::MissingArtistName)
            }
            Err(e) => Err(ScanErrorKind::ArtistInfoFile(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lyrics_scanner_parses_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("01 Song.lrc");
        std::fs::write(&path, "[00:01.00]Hello\n[00:02.00]World\n").unwrap();

        let scanner = LyricsFileScanner::new(&["lrc".to_string()]);
        match scanner.scan(&path).unwrap() {
            ParsedFile::Lyrics(lyrics) => {
                assert!(lyrics.synchronized);
                assert_eq!(lyrics.lines.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_lyrics_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.lrc");
        std::fs::write(&path, "\n\n").unwrap();

        let scanner = LyricsFileScanner::new(&["lrc".to_string()]);
        assert!(matches!(
            scanner.scan(&path),
            Err(ScanErrorKind::LyricsFile(_))
        ));
    }

    #[test]
    fn test_playlist_scanner_uses_stem_as_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Favourites.m3u");
        std::fs::write(&path, "a.mp3\nb.mp3\n").unwrap();

        let scanner = PlayListFileScanner::new(&["m3u".to_string()]);
        match scanner.scan(&path).unwrap() {
            ParsedFile::PlayList(playlist) => {
                assert_eq!(playlist.name, "Favourites");
                assert_eq!(playlist.files, vec!["a.mp3", "b.mp3"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_artist_info_without_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artist.nfo");
        std::fs::write(&path, "<artist><name></name></artist>").unwrap();

        let scanner = ArtistInfoFileScanner::new(&["artist.nfo".to_string()]);
        assert!(matches!(
            scanner.scan(&path),
            Err(ScanErrorKind::MissingArtistName)
        ));
    }

    #[test]
    fn test_audio_scanner_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.mp3");
        std::fs::write(&path, b"not really an mp3").unwrap();

        let scanner = AudioFileScanner::new(&["mp3".to_string()]);
        assert!(matches!(
            scanner.scan(&path),
            Err(ScanErrorKind::AudioFile(_))
        ));
    }

    #[test]
    fn test_image_scanner_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let scanner = ImageFileScanner::new(&["jpg".to_string()]);
        assert!(matches!(
            scanner.scan(&path),
            Err(ScanErrorKind::ImageFile(_))
        ));
    }
}
