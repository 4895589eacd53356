//! Per-file scan failures.
//!
//! These never abort a scan: they are recorded in the run statistics and the
//! file is skipped.

use std::path::PathBuf;

/// Why a single file could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanErrorKind {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("cannot read audio file: {0}")]
    AudioFile(String),

    #[error("no audio track found")]
    NoAudioTrack,

    #[error("bad audio duration")]
    BadAudioDuration,

    #[error("cannot read embedded image #{index}: {reason}")]
    EmbeddedImage { index: usize, reason: String },

    #[error("cannot read image file: {0}")]
    ImageFile(String),

    #[error("cannot read lyrics file: {0}")]
    LyricsFile(String),

    #[error("cannot read playlist file: {0}")]
    PlayListFile(String),

    #[error("cannot read artist info file: {0}")]
    ArtistInfoFile(String),

    #[error("missing artist name")]
    MissingArtistName,
}

impl From<std::io::Error> for ScanErrorKind {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// A file-level failure, as kept in the scan statistics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {kind}", path.display())]
pub struct ScanError {
    pub path: PathBuf,
    pub kind: ScanErrorKind,
}

impl ScanError {
    pub fn new(path: impl Into<PathBuf>, kind: ScanErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::new("/music/a.flac", ScanErrorKind::BadAudioDuration);
        assert_eq!(err.to_string(), "/music/a.flac: bad audio duration");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(ScanErrorKind::from(io), ScanErrorKind::Io(_)));
    }
}
