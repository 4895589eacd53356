//! Image header probing.
//!
//! Only dimensions are needed for ranking artwork, so images are never fully
//! decoded.

use std::io::Cursor;
use std::path::Path;

use crate::error::{Error, Result};

/// Width and height of an image file on disk.
pub fn probe_file(path: &Path) -> Result<(u32, u32)> {
    ::image::image_dimensions(path).map_err(|e| Error::metadata(path, e.to_string()))
}

/// Width and height of an in-memory image.
pub fn probe_bytes(data: &[u8]) -> std::result::Result<(u32, u32), ::image::ImageError> {
    ::image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(::image::ImageError::IoError)?
        .into_dimensions()
}
