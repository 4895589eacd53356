//! State shared by the scan steps of one run.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::Db;
use crate::db::settings::ScanSettings;
use crate::db::track::DuplicateTrack;
use crate::error::Result;
use crate::model::MediaLibraryInfo;
use crate::scanner::ScanError;

/// Stored errors are capped; [`ScanStats::errors_count`] keeps counting.
pub const MAX_STORED_ERRORS: usize = 5000;

/// Options for one scan run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Re-read every file, even when size and mtime are unchanged
    pub full_scan: bool,
    /// Run the optimize step even when nothing changed
    pub force_optimize: bool,
}

/// Pipeline steps, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanStepKind {
    #[default]
    RemovedFileCheck,
    ScanFiles,
    ArtistReconciliation,
    AssociateArtistImages,
    AssociateReleaseImages,
    AssociateMediumImages,
    AssociateTrackImages,
    AssociateExternalLyrics,
    AssociatePlayListTracks,
    RemoveOrphanedDbEntries,
    Optimize,
    ComputeClusterStats,
    DuplicateFileCheck,
}

impl ScanStepKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::RemovedFileCheck => "removed-file-check",
            Self::ScanFiles => "scan-files",
            Self::ArtistReconciliation => "artist-reconciliation",
            Self::AssociateArtistImages => "associate-artist-images",
            Self::AssociateReleaseImages => "associate-release-images",
            Self::AssociateMediumImages => "associate-medium-images",
            Self::AssociateTrackImages => "associate-track-images",
            Self::AssociateExternalLyrics => "associate-external-lyrics",
            Self::AssociatePlayListTracks => "associate-playlist-tracks",
            Self::RemoveOrphanedDbEntries => "remove-orphaned-db-entries",
            Self::Optimize => "optimize",
            Self::ComputeClusterStats => "compute-cluster-stats",
            Self::DuplicateFileCheck => "duplicate-file-check",
        }
    }
}

impl fmt::Display for ScanStepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress of the running step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStepStats {
    pub step: ScanStepKind,
    /// Zero-based position of the step in the pipeline
    pub step_index: usize,
    pub step_count: usize,
    /// Best estimate of the work in this step; may be 0 when unknown
    pub total_elems: u64,
    pub processed_elems: u64,
}

impl ScanStepStats {
    /// Percentage of this step completed, 0-100.
    pub fn progress(&self) -> u8 {
        if self.total_elems == 0 {
            return 0;
        }
        let percent = self.processed_elems.min(self.total_elems) * 100 / self.total_elems;
        percent as u8
    }
}

/// Why a track was reported by the duplicate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateReason {
    SameRecordingMbid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDuplicate {
    pub track_id: i64,
    pub path: String,
    pub reason: DuplicateReason,
}

impl From<DuplicateTrack> for ScanDuplicate {
    fn from(track: DuplicateTrack) -> Self {
        Self {
            track_id: track.id,
            path: track.absolute_file_path,
            reason: DuplicateReason::SameRecordingMbid,
        }
    }
}

/// Totals for the whole run.
#[derive(Debug, Clone)]
pub struct ScanStats {
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,

    /// Files seen during the walk, supported or not
    pub files_walked: u64,
    /// Files handed to a decoder
    pub scans: u64,
    /// Supported files left alone because they were unchanged
    pub skips: u64,
    pub additions: u64,
    pub deletions: u64,
    pub updates: u64,
    /// Files that could not be indexed because of an internal error
    pub failures: u64,

    pub errors: Vec<ScanError>,
    pub errors_count: u64,
    pub duplicates: Vec<ScanDuplicate>,
}

impl Default for ScanStats {
    fn default() -> Self {
        Self {
            started: Utc::now(),
            finished: None,
            files_walked: 0,
            scans: 0,
            skips: 0,
            additions: 0,
            deletions: 0,
            updates: 0,
            failures: 0,
            errors: Vec::new(),
            errors_count: 0,
            duplicates: Vec::new(),
        }
    }
}

impl ScanStats {
    /// Rows added, removed or modified so far.
    pub fn changes(&self) -> u64 {
        self.additions + self.deletions + self.updates
    }

    pub fn add_error(&mut self, error: ScanError) {
        self.errors_count += 1;
        if self.errors.len() < MAX_STORED_ERRORS {
            self.errors.push(error);
        }
    }

    /// Fold counters gathered separately (one file's writes) into these.
    pub fn merge(&mut self, other: ScanStats) {
        self.files_walked += other.files_walked;
        self.scans += other.scans;
        self.skips += other.skips;
        self.additions += other.additions;
        self.deletions += other.deletions;
        self.updates += other.updates;
        self.failures += other.failures;

        self.errors_count += other.errors_count - other.errors.len() as u64;
        for error in other.errors {
            self.add_error(error);
        }
        self.duplicates.extend(other.duplicates);
    }
}

/// Receives step progress after every batch.
pub type ProgressCallback = Arc<dyn Fn(&ScanStepStats) + Send + Sync>;

/// A callback that ignores progress.
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// Everything a step may read or update during a run.
pub struct ScanContext {
    pub db: Db,
    pub options: ScanOptions,
    pub libraries: Vec<MediaLibraryInfo>,
    /// Settings stored by the previous completed run
    pub previous_settings: ScanSettings,
    pub stats: ScanStats,
    pub current_step: ScanStepStats,
    abort: Arc<AtomicBool>,
    progress: ProgressCallback,
}

impl ScanContext {
    pub fn new(
        db: Db,
        options: ScanOptions,
        libraries: Vec<MediaLibraryInfo>,
        previous_settings: ScanSettings,
        abort: Arc<AtomicBool>,
        progress: ProgressCallback,
    ) -> Self {
        Self {
            db,
            options,
            libraries,
            previous_settings,
            stats: ScanStats::default(),
            current_step: ScanStepStats::default(),
            abort,
            progress,
        }
    }

    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn library_roots(&self) -> Vec<std::path::PathBuf> {
        self.libraries.iter().map(|l| l.root.clone()).collect()
    }

    /// Enter a new step; resets the element counters.
    pub fn begin_step(&mut self, step: ScanStepKind, step_index: usize, step_count: usize) {
        self.current_step = ScanStepStats {
            step,
            step_index,
            step_count,
            total_elems: 0,
            processed_elems: 0,
        };
    }

    pub fn set_total(&mut self, total: u64) {
        self.current_step.total_elems = total;
    }

    /// Count `n` more elements as processed and notify the callback.
    pub fn advance(&mut self, n: u64) {
        self.current_step.processed_elems += n;
        self.report_progress();
    }

    pub fn report_progress(&self) {
        (self.progress)(&self.current_step);
    }
}

/// One stage of the scan pipeline.
#[async_trait]
pub trait ScanStep: Send + Sync {
    fn kind(&self) -> ScanStepKind;

    /// Whether the step has anything to do given what ran before it.
    fn need_process(&self, ctx: &ScanContext) -> bool;

    /// Run the step. Returns early, without error, when the scan is aborted.
    async fn process(&self, ctx: &mut ScanContext) -> Result<()>;
}
