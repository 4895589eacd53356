//! Preferred artwork association for artists, releases, mediums and tracks.
//!
//! Each entity table is walked in id ranges. Ranges are resolved concurrently
//! on the [`JobQueue`], each job in its own read transaction; only rows whose
//! resolved artwork differs from the stored one come back, and those are
//! written in small batches.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cover::ArtworkSettings;
use crate::cover::resolver;
use crate::db::Db;
use crate::db::artwork::{self, ArtworkTarget};
use crate::db::cursor::{self, IdRange, Table};
use crate::error::Result;
use crate::library::context::{ScanContext, ScanStep, ScanStepKind};
use crate::queue::job::{DEFAULT_CONCURRENCY, DEFAULT_DRAIN_THRESHOLD};
use crate::queue::{JobHandler, JobQueue};

/// Rows resolved by one job.
const RANGE_SIZE: usize = 100;
const WRITE_BATCH_SIZE: usize = 50;

/// Entity kinds carrying a preferred artwork, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkEntity {
    Artist,
    Release,
    Medium,
    Track,
}

impl ArtworkEntity {
    fn table(self) -> Table {
        match self {
            ArtworkEntity::Artist => Table::Artist,
            ArtworkEntity::Release => Table::Release,
            ArtworkEntity::Medium => Table::Medium,
            ArtworkEntity::Track => Table::Track,
        }
    }

    fn step(self) -> ScanStepKind {
        match self {
            ArtworkEntity::Artist => ScanStepKind::AssociateArtistImages,
            ArtworkEntity::Release => ScanStepKind::AssociateReleaseImages,
            ArtworkEntity::Medium => ScanStepKind::AssociateMediumImages,
            ArtworkEntity::Track => ScanStepKind::AssociateTrackImages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArtworkUpdate {
    target: ArtworkTarget,
    id: i64,
    artwork_id: Option<i64>,
}

#[derive(Debug, Default)]
struct RangeOutcome {
    rows: u64,
    updates: Vec<ArtworkUpdate>,
}

impl RangeOutcome {
    fn check(&mut self, target: ArtworkTarget, id: i64, stored: Option<i64>, resolved: Option<i64>) {
        if stored != resolved {
            self.updates.push(ArtworkUpdate {
                target,
                id,
                artwork_id: resolved,
            });
        }
    }
}

async fn resolve_range(
    db: Db,
    settings: Arc<ArtworkSettings>,
    entity: ArtworkEntity,
    range: IdRange,
) -> Result<RangeOutcome> {
    let mut tx = db.read_tx().await?;
    let conn = tx.conn();
    let mut outcome = RangeOutcome::default();

    match entity {
        ArtworkEntity::Artist => {
            for row in artwork::artists_in_range(&mut *conn, range).await? {
                let resolved = resolver::resolve_artist(&mut *conn, &settings, row.id, &row.mbid).await?;
                outcome.check(ArtworkTarget::Artist, row.id, row.preferred_artwork_id, resolver::artwork_id(resolved));
                outcome.rows += 1;
            }
        }
        ArtworkEntity::Release => {
            for row in artwork::releases_in_range(&mut *conn, range).await? {
                let resolved = resolver::resolve_release(&mut *conn, &settings, row.id, &row.mbid).await?;
                outcome.check(ArtworkTarget::Release, row.id, row.preferred_artwork_id, resolver::artwork_id(resolved));
                outcome.rows += 1;
            }
        }
        ArtworkEntity::Medium => {
            for row in artwork::mediums_in_range(&mut *conn, range).await? {
                let resolved =
                    resolver::resolve_medium(&mut *conn, &settings, row.id, &row.name, row.release_artwork_id)
                        .await?;
                outcome.check(ArtworkTarget::Medium, row.id, row.preferred_artwork_id, resolver::artwork_id(resolved));
                outcome.rows += 1;
            }
        }
        ArtworkEntity::Track => {
            for row in artwork::tracks_in_range(&mut *conn, range).await? {
                let resolved =
                    resolver::resolve_track(&mut *conn, row.id, row.medium_artwork_id, row.release_artwork_id)
                        .await?;
                outcome.check(
                    ArtworkTarget::TrackMedia,
                    row.id,
                    row.preferred_media_artwork_id,
                    resolver::artwork_id(resolved.media),
                );
                outcome.check(
                    ArtworkTarget::Track,
                    row.id,
                    row.preferred_artwork_id,
                    resolver::artwork_id(resolved.preferred),
                );
                outcome.rows += 1;
            }
        }
    }

    Ok(outcome)
}

/// Collects changed rows from finished jobs and writes them out.
struct ArtworkWriter<'a> {
    ctx: &'a mut ScanContext,
    pending: VecDeque<ArtworkUpdate>,
}

impl ArtworkWriter<'_> {
    async fn flush(&mut self) -> Result<()> {
        while !self.pending.is_empty() {
            let n = self.pending.len().min(WRITE_BATCH_SIZE);
            let batch: Vec<ArtworkUpdate> = self.pending.drain(..n).collect();

            let mut tx = self.ctx.db.write_tx().await?;
            for update in &batch {
                artwork::set_preferred_artwork(tx.conn(), update.target, update.id, update.artwork_id).await?;
            }
            tx.commit().await?;

            self.ctx.stats.updates += batch.len() as u64;
        }
        Ok(())
    }
}

#[async_trait]
impl<'a> JobHandler<Result<RangeOutcome>> for ArtworkWriter<'a> {
    async fn on_jobs_done(&mut self, outputs: Vec<Result<RangeOutcome>>) -> Result<()> {
        let mut rows = 0;
        for output in outputs {
            let outcome = output?;
            rows += outcome.rows;
            self.pending.extend(outcome.updates);
        }
        self.flush().await?;
        self.ctx.advance(rows);
        Ok(())
    }
}

/// One of the four artwork association steps.
pub struct AssociateArtwork {
    entity: ArtworkEntity,
    settings: Arc<ArtworkSettings>,
}

impl AssociateArtwork {
    pub fn new(entity: ArtworkEntity, settings: Arc<ArtworkSettings>) -> Self {
        Self { entity, settings }
    }

    /// Resolve every row of `entity` and write the changes. Returns the
    /// number of rows updated.
    async fn associate(&self, ctx: &mut ScanContext, entity: ArtworkEntity) -> Result<u64> {
        let table = entity.table();
        let total = {
            let mut tx = ctx.db.read_tx().await?;
            cursor::count(tx.conn(), table).await?
        };
        ctx.set_total(ctx.current_step.total_elems + total as u64);
        let before = ctx.stats.updates;

        let mut queue = JobQueue::new(DEFAULT_CONCURRENCY, DEFAULT_DRAIN_THRESHOLD);
        let mut writer = ArtworkWriter {
            ctx,
            pending: VecDeque::new(),
        };

        let mut last_id = 0;
        while !writer.ctx.aborted() {
            let range = {
                let mut tx = writer.ctx.db.read_tx().await?;
                cursor::find_next_id_range(tx.conn(), table, last_id, RANGE_SIZE).await?
            };
            let Some(range) = range else {
                break;
            };
            last_id = range.last;

            let job = resolve_range(writer.ctx.db.clone(), Arc::clone(&self.settings), entity, range);
            queue.push(job, &mut writer).await?;
        }
        queue.finish(&mut writer).await?;

        let updated = writer.ctx.stats.updates - before;
        tracing::info!(target: "library::artwork", ?entity, updated, "Artwork associated");
        Ok(updated)
    }
}

#[async_trait]
impl ScanStep for AssociateArtwork {
    fn kind(&self) -> ScanStepKind {
        self.entity.step()
    }

    fn need_process(&self, ctx: &ScanContext) -> bool {
        if ctx.stats.changes() > 0 {
            return true;
        }
        self.entity == ArtworkEntity::Artist
            && ctx.previous_settings.artist_image_fallback_to_release
                != self.settings.artist_image_fallback_to_release
    }

    async fn process(&self, ctx: &mut ScanContext) -> Result<()> {
        let updated = self.associate(ctx, self.entity).await?;

        // Artists falling back to release artwork were resolved before it changed
        if self.entity == ArtworkEntity::Release
            && self.settings.artist_image_fallback_to_release
            && updated > 0
            && !ctx.aborted()
        {
            tracing::debug!(target: "library::artwork", updated, "Release artwork changed, refreshing artist fallback");
            self.associate(ctx, ArtworkEntity::Artist).await?;
        }
        Ok(())
    }
}
