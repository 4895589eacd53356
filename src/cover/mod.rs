//! Preferred artwork selection.
//!
//! Artwork comes from two sources, both indexed during the file scan:
//!
//! 1. **Image files** - `cover.jpg`, `front.png`, `<mbid>.jpg`, ... next to the audio
//! 2. **Embedded pictures** - deduplicated by size and content hash
//!
//! - [`sidecar`] turns configured image names into directory searches
//! - [`resolver`] runs the per-entity priority chains
//!
//! Nothing here writes to the database; the artwork scan steps compare the
//! resolved ids with the stored ones and update what changed.

pub mod resolver;
pub mod sidecar;

pub use resolver::{ArtworkSettings, ResolvedArtwork, TrackArtwork};
