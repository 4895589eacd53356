//! Library scanning.
//!
//! [`ScanService`] runs the scan pipeline over the configured media
//! libraries: it removes rows for vanished files, indexes new and modified
//! files, then reconciles everything derived from them (artist bindings,
//! artwork, lyrics and playlist associations, orphans, statistics).
//!
//! A run can be aborted at any time through [`ScanService::abort_handle`].
//! Committed batches stay committed and the next run picks up from there.

mod context;
mod ingest;
pub mod steps;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

pub use context::{
    DuplicateReason, MAX_STORED_ERRORS, ProgressCallback, ScanContext, ScanDuplicate, ScanOptions,
    ScanStats, ScanStep, ScanStepKind, ScanStepStats, no_progress,
};
pub use ingest::{IngestSettings, Ingester};

use crate::config::Config;
use crate::db::settings::{self, ScanSettings};
use crate::db::{Db, library};
use crate::error::Result;
use crate::scanner::ScannerRegistry;

/// Result of one run.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// The run stopped early; later steps did not run
    pub aborted: bool,
    pub stats: ScanStats,
}

pub struct ScanService {
    db: Db,
    config: Config,
    registry: ScannerRegistry,
    abort: Arc<AtomicBool>,
}

impl ScanService {
    /// A service using the built-in decoders.
    pub fn new(db: Db, config: Config) -> Self {
        let registry = ScannerRegistry::from_config(&config.scanner);
        Self::with_registry(db, config, registry)
    }

    pub fn with_registry(db: Db, config: Config, registry: ScannerRegistry) -> Self {
        Self {
            db,
            config,
            registry,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the returned flag stops the running scan at the next batch.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Run every step of the pipeline once.
    ///
    /// Fails before any step starts when the configuration is invalid or the
    /// index cannot be opened. An abort is reported through
    /// [`ScanOutcome::aborted`], not as an error.
    pub async fn run(&self, options: ScanOptions, progress: ProgressCallback) -> Result<ScanOutcome> {
        self.config.validate()?;
        self.abort.store(false, Ordering::SeqCst);

        let (libraries, previous_settings) = {
            let mut tx = self.db.write_tx().await?;
            let libraries = library::sync_media_libraries(tx.conn(), &self.config.libraries).await?;
            let previous = settings::load(tx.conn()).await?;
            tx.commit().await?;
            (libraries, previous)
        };

        tracing::info!(
            target: "library::scan",
            libraries = libraries.len(),
            full_scan = options.full_scan,
            "Scan started"
        );

        let mut ctx = ScanContext::new(
            self.db.clone(),
            options,
            libraries,
            previous_settings,
            self.abort_handle(),
            progress,
        );

        let steps = steps::default_steps(&self.config.scanner, &self.registry);
        let step_count = steps.len();
        for (index, step) in steps.iter().enumerate() {
            if ctx.aborted() {
                break;
            }

            ctx.begin_step(step.kind(), index, step_count);
            if !step.need_process(&ctx) {
                tracing::debug!(target: "library::scan", step = %step.kind(), "Step skipped");
                continue;
            }

            tracing::info!(target: "library::scan", step = %step.kind(), "Step started");
            ctx.report_progress();
            step.process(&mut ctx).await?;
            tracing::info!(
                target: "library::scan",
                step = %step.kind(),
                processed = ctx.current_step.processed_elems,
                "Step finished"
            );
        }

        let aborted = ctx.aborted();
        if aborted {
            tracing::warn!(target: "library::scan", step = %ctx.current_step.step, "Scan aborted");
        } else {
            let current = ScanSettings {
                allow_artist_mbid_fallback: self.config.scanner.allow_artist_mbid_fallback,
                artist_image_fallback_to_release: self.config.scanner.artist_image_fallback_to_release,
            };
            let mut tx = self.db.write_tx().await?;
            settings::store(tx.conn(), current).await?;
            tx.commit().await?;
        }

        let mut stats = ctx.stats;
        stats.finished = Some(Utc::now());
        tracing::info!(
            target: "library::scan",
            additions = stats.additions,
            updates = stats.updates,
            deletions = stats.deletions,
            skips = stats.skips,
            errors = stats.errors_count,
            duplicates = stats.duplicates.len(),
            "Scan finished"
        );

        Ok(ScanOutcome { aborted, stats })
    }
}
