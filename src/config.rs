//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\music-indexer\config.toml
//! - macOS: ~/Library/Application Support/music-indexer/config.toml
//! - Linux: ~/.config/music-indexer/config.toml
//!
//! The config file is human-readable and editable. Every section is optional;
//! missing keys fall back to their defaults.
//!
//! ```toml
//! [database]
//! path = "/var/lib/music-indexer/index.db"
//!
//! [[libraries]]
//! name = "Main"
//! path = "/srv/music"
//!
//! [scanner]
//! allow_artist_mbid_fallback = true
//! release_image_file_names = ["cover", "front", "folder", "default"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Index database settings
    pub database: DatabaseConfig,

    /// Media library roots to scan
    pub libraries: Vec<LibraryConfig>,

    /// Scanner behaviour
    pub scanner: ScannerConfig,
}

/// Database location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite index (None = default location)
    pub path: Option<PathBuf>,
}

/// A configured media library root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Display name
    pub name: String,
    /// Absolute root directory
    pub path: PathBuf,
}

/// Scanner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// File scan worker threads (0 = half the available CPUs)
    pub thread_count: usize,

    pub audio_extensions: Vec<String>,
    pub image_extensions: Vec<String>,
    pub lyrics_extensions: Vec<String>,
    pub playlist_extensions: Vec<String>,

    /// Exact file names handled by the artist info scanner
    pub artist_info_file_names: Vec<String>,

    /// Reuse an MBID-tagged artist when a name-only reference uniquely matches it
    pub allow_artist_mbid_fallback: bool,

    /// Skip audio files whose recording MBID is already indexed elsewhere
    pub skip_duplicate_recording_mbid: bool,

    /// Use the first release's artwork when an artist has no image of its own
    pub artist_image_fallback_to_release: bool,

    /// Image stems searched for release artwork, in priority order (`*` wildcard)
    pub release_image_file_names: Vec<String>,

    /// Image stems searched for medium artwork, in priority order (`*` wildcard)
    pub medium_image_file_names: Vec<String>,

    /// Image stems searched for artist artwork, in priority order (`*` wildcard)
    pub artist_image_file_names: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            thread_count: 0,
            audio_extensions: strings(&[
                "mp3", "flac", "ogg", "oga", "opus", "m4a", "m4b", "mp4", "aac", "alac", "wav",
                "aif", "aiff", "ape", "wv", "mpc", "wma",
            ]),
            image_extensions: strings(&["jpg", "jpeg", "png", "gif", "webp", "bmp"]),
            lyrics_extensions: strings(&["lrc", "txt"]),
            playlist_extensions: strings(&["m3u", "m3u8"]),
            artist_info_file_names: strings(&["artist.nfo"]),
            allow_artist_mbid_fallback: true,
            skip_duplicate_recording_mbid: false,
            artist_image_fallback_to_release: false,
            release_image_file_names: strings(&["cover", "front", "folder", "default"]),
            medium_image_file_names: strings(&["discsubtitle"]),
            artist_image_file_names: strings(&["artist"]),
        }
    }
}

impl ScannerConfig {
    /// Resolve the number of file scan workers.
    pub fn effective_thread_count(&self) -> usize {
        if self.thread_count > 0 {
            return self.thread_count;
        }

        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        (cpus / 2).max(1)
    }
}

impl Config {
    /// Check that every configured library root is usable.
    ///
    /// A failure here is fatal: no scan step may start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for library in &self.libraries {
            if library.name.trim().is_empty() {
                return Err(ConfigError::InvalidLibrary(
                    library.path.clone(),
                    "empty library name".to_string(),
                ));
            }
            if !library.path.is_absolute() {
                return Err(ConfigError::InvalidLibrary(
                    library.path.clone(),
                    "path must be absolute".to_string(),
                ));
            }
            if !library.path.is_dir() {
                return Err(ConfigError::InvalidLibrary(
                    library.path.clone(),
                    "not a readable directory".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-indexer"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Default location of the index database
pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("music-indexer").join("index.db"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match load_from(&path) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            tracing::error!("{}", e);
            tracing::warn!("Using default configuration");
            Config::default()
        }
    }
}

/// Load configuration from an explicit file, failing on any error.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &dir.join("config.toml"))
}

/// Save configuration to an explicit file (atomic write-then-rename).
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Invalid media library {0}: {1}")]
    InvalidLibrary(PathBuf, String),

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
