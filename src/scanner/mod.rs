//! File discovery and decoding.
//!
//! - [`walk`] - streams the files below a library root
//! - [`FileScanner`] - one decoder per content kind
//! - [`ScannerRegistry`] - maps a path to the decoder that handles it
//!
//! Decoders are plain blocking functions; the file scan queue runs them on
//! worker threads.

mod error;
mod files;
pub mod walk;

pub use error::{ScanError, ScanErrorKind};
pub use files::{
    ArtistInfoFileScanner, AudioFileScanner, ImageFileScanner, LyricsFileScanner,
    PlayListFileScanner,
};
pub use walk::{WalkedFile, walk};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::ScannerConfig;
use crate::metadata::AudioFileInfo;
use crate::metadata::artist_info::ArtistInfoFile;
use crate::metadata::lyrics::Lyrics;
use crate::metadata::playlist::PlayList;
use crate::model::FileKind;

/// Decoded content of one file.
#[derive(Debug, Clone)]
pub enum ParsedFile {
    Audio(Box<AudioFileInfo>),
    Image { width: u32, height: u32 },
    Lyrics(Lyrics),
    PlayList(PlayList),
    ArtistInfo(ArtistInfoFile),
}

impl ParsedFile {
    pub fn kind(&self) -> FileKind {
        match self {
            ParsedFile::Audio(_) => FileKind::Audio,
            ParsedFile::Image { .. } => FileKind::Image,
            ParsedFile::Lyrics(_) => FileKind::Lyrics,
            ParsedFile::PlayList(_) => FileKind::PlayList,
            ParsedFile::ArtistInfo(_) => FileKind::ArtistInfo,
        }
    }
}

/// A decoder for one kind of file.
pub trait FileScanner: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> FileKind;

    /// Lower-case extensions, without the dot.
    fn supported_extensions(&self) -> &[String];

    /// Exact (lower-case) file names. Checked before extensions.
    fn supported_files(&self) -> &[String] {
        &[]
    }

    /// Decode a file. Runs on a blocking worker thread.
    fn scan(&self, path: &Path) -> Result<ParsedFile, ScanErrorKind>;
}

/// Maps file names and extensions to decoders.
#[derive(Clone, Default)]
pub struct ScannerRegistry {
    by_file_name: HashMap<String, Arc<dyn FileScanner>>,
    by_extension: HashMap<String, Arc<dyn FileScanner>>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in decoders, configured from settings.
    pub fn from_config(config: &ScannerConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AudioFileScanner::new(&config.audio_extensions)));
        registry.register(Arc::new(ImageFileScanner::new(&config.image_extensions)));
        registry.register(Arc::new(LyricsFileScanner::new(&config.lyrics_extensions)));
        registry.register(Arc::new(PlayListFileScanner::new(
            &config.playlist_extensions,
        )));
        registry.register(Arc::new(ArtistInfoFileScanner::new(
            &config.artist_info_file_names,
        )));
        registry
    }

    /// Register a decoder. Later registrations win on conflicts.
    pub fn register(&mut self, scanner: Arc<dyn FileScanner>) {
        for name in scanner.supported_files() {
            self.by_file_name
                .insert(name.to_lowercase(), Arc::clone(&scanner));
        }
        for ext in scanner.supported_extensions() {
            self.by_extension
                .insert(ext.to_lowercase(), Arc::clone(&scanner));
        }
    }

    /// Pick the decoder for `path`: exact file name first, then extension.
    pub fn select(&self, path: &Path) -> Option<Arc<dyn FileScanner>> {
        let by_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| self.by_file_name.get(&name.to_lowercase()));
        if let Some(scanner) = by_name {
            return Some(Arc::clone(scanner));
        }

        let ext = path.extension()?.to_str()?.to_lowercase();
        self.by_extension.get(&ext).cloned()
    }

    pub fn kind_of(&self, path: &Path) -> Option<FileKind> {
        self.select(path).map(|s| s.kind())
    }
}

impl std::fmt::Debug for ScannerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerRegistry")
            .field("file_names", &self.by_file_name.keys().collect::<Vec<_>>())
            .field("extensions", &self.by_extension.keys().collect::<Vec<_>>())
            .finish()
    }
}
