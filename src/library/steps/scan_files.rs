//! Walk the library roots and index new or modified files.
//!
//! Decoding happens on the [`FileScanQueue`] workers. This step only walks,
//! filters unchanged files, and writes decoded results back in small write
//! transactions while the workers keep going.

use std::pin::pin;

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::Connection;

use crate::db::{cursor, files};
use crate::error::Result;
use crate::library::context::{ScanContext, ScanStats, ScanStep, ScanStepKind};
use crate::library::ingest::{IngestSettings, Ingester};
use crate::model::{FileKind, FileStamp};
use crate::queue::{FileScanQueue, FileScanTask};
use crate::scanner::{ScannerRegistry, WalkedFile, walk};

/// Results written per write transaction.
const WRITE_BATCH_SIZE: usize = 10;
/// Files queued per worker thread before the walk pauses.
const IN_FLIGHT_PER_THREAD: usize = 100;

pub struct ScanFiles {
    registry: ScannerRegistry,
    thread_count: usize,
    settings: IngestSettings,
}

impl ScanFiles {
    pub fn new(registry: ScannerRegistry, thread_count: usize, settings: IngestSettings) -> Self {
        Self {
            registry,
            thread_count,
            settings,
        }
    }

    async fn needs_scan(&self, ctx: &ScanContext, file: &WalkedFile, kind: FileKind) -> Result<bool> {
        if ctx.options.full_scan {
            return Ok(true);
        }

        let path = file.path.to_string_lossy();
        let stamp = {
            let mut tx = ctx.db.read_tx().await?;
            files::find_stamp(tx.conn(), kind, &path).await?
        };
        let current = FileStamp {
            file_size: file.file_size,
            last_write_time: file.last_write_time,
        };
        Ok(stamp != Some(current))
    }

    /// Write up to one batch of decoded results. Returns how many were written.
    async fn write_results(&self, ctx: &mut ScanContext, queue: &FileScanQueue) -> Result<usize> {
        let results = queue.pop_results(WRITE_BATCH_SIZE);
        if results.is_empty() {
            return Ok(0);
        }
        let count = results.len();

        let ingester = Ingester::new(&ctx.libraries, self.settings);
        let mut tx = ctx.db.write_tx().await?;
        for result in results {
            let path = result.file.path.clone();

            // A file is written completely or not at all
            let mut savepoint = tx.conn().begin().await?;
            let mut file_stats = ScanStats::default();
            match ingester.apply(&mut savepoint, result, &mut file_stats).await {
                Ok(()) => {
                    savepoint.commit().await?;
                    ctx.stats.merge(file_stats);
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    tracing::warn!(target: "library::scan_files", path = %path.display(), error = %e, "Cannot index file");
                    ctx.stats.failures += 1;
                }
            }
        }
        tx.commit().await?;

        ctx.advance(count as u64);
        Ok(count)
    }
}

#[async_trait]
impl ScanStep for ScanFiles {
    fn kind(&self) -> ScanStepKind {
        ScanStepKind::ScanFiles
    }

    fn need_process(&self, _ctx: &ScanContext) -> bool {
        true
    }

    async fn process(&self, ctx: &mut ScanContext) -> Result<()> {
        // The previous index size is the best guess for the walk
        let mut estimate = 0;
        {
            let mut tx = ctx.db.read_tx().await?;
            for kind in FileKind::ALL {
                estimate += cursor::count(tx.conn(), kind.into()).await?;
            }
        }
        ctx.set_total(estimate as u64);

        let queue = FileScanQueue::new(self.thread_count, ctx.abort_flag())?;
        let max_in_flight = IN_FLIGHT_PER_THREAD * queue.thread_count();

        let roots = ctx.library_roots();
        for root in roots {
            tracing::info!(target: "library::scan_files", root = %root.display(), "Scanning library root");
            let mut files = pin!(walk(root));

            while let Some(file) = files.next().await {
                if ctx.aborted() {
                    return Ok(());
                }
                ctx.stats.files_walked += 1;

                let Some(scanner) = self.registry.select(&file.path) else {
                    continue;
                };
                if !self.needs_scan(ctx, &file, scanner.kind()).await? {
                    ctx.stats.skips += 1;
                    ctx.advance(1);
                    continue;
                }

                tracing::debug!(target: "library::scan_files", path = %file.path.display(), scanner = scanner.name(), "Queued for scan");
                ctx.stats.scans += 1;
                queue.push(FileScanTask { file, scanner });

                while queue.results_count() > max_in_flight / 2 {
                    self.write_results(ctx, &queue).await?;
                }
                queue.wait(max_in_flight).await?;
            }
        }

        queue.wait(0).await?;
        while self.write_results(ctx, &queue).await? > 0 {
            if ctx.aborted() {
                return Ok(());
            }
        }

        if ctx.current_step.total_elems < ctx.current_step.processed_elems {
            ctx.set_total(ctx.current_step.processed_elems);
            ctx.report_progress();
        }

        Ok(())
    }
}
