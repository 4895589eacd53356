//! The scan pipeline steps.

mod artist_reconciliation;
mod artwork;
mod cluster_stats;
mod duplicates;
mod lyrics;
mod optimize;
mod orphans;
mod playlist;
mod removed_files;
mod scan_files;

use std::sync::Arc;

pub use artist_reconciliation::ArtistReconciliation;
pub use artwork::{ArtworkEntity, AssociateArtwork};
pub use cluster_stats::ComputeClusterStats;
pub use duplicates::DuplicateFileCheck;
pub use lyrics::AssociateExternalLyrics;
pub use optimize::Optimize;
pub use orphans::RemoveOrphanedDbEntries;
pub use playlist::AssociatePlayListTracks;
pub use removed_files::RemovedFileCheck;
pub use scan_files::ScanFiles;

use crate::config::ScannerConfig;
use crate::cover::ArtworkSettings;
use crate::library::context::ScanStep;
use crate::library::ingest::IngestSettings;
use crate::scanner::ScannerRegistry;

/// Every step, in run order.
pub fn default_steps(config: &ScannerConfig, registry: &ScannerRegistry) -> Vec<Box<dyn ScanStep>> {
    let ingest = IngestSettings {
        allow_artist_mbid_fallback: config.allow_artist_mbid_fallback,
        skip_duplicate_recording_mbid: config.skip_duplicate_recording_mbid,
    };
    let artwork = Arc::new(ArtworkSettings::from(config));

    vec![
        Box::new(RemovedFileCheck::new(registry.clone())),
        Box::new(ScanFiles::new(registry.clone(), config.effective_thread_count(), ingest)),
        Box::new(ArtistReconciliation::new(config.allow_artist_mbid_fallback)),
        Box::new(AssociateArtwork::new(ArtworkEntity::Artist, Arc::clone(&artwork))),
        Box::new(AssociateArtwork::new(ArtworkEntity::Release, Arc::clone(&artwork))),
        Box::new(AssociateArtwork::new(ArtworkEntity::Medium, Arc::clone(&artwork))),
        Box::new(AssociateArtwork::new(ArtworkEntity::Track, artwork)),
        Box::new(AssociateExternalLyrics),
        Box::new(AssociatePlayListTracks),
        Box::new(RemoveOrphanedDbEntries),
        Box::new(Optimize),
        Box::new(ComputeClusterStats),
        Box::new(DuplicateFileCheck),
    ]
}
