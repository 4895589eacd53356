//! Report tracks sharing a recording MBID.

use async_trait::async_trait;

use crate::db::track;
use crate::error::Result;
use crate::library::context::{ScanContext, ScanDuplicate, ScanStep, ScanStepKind};

const BATCH_SIZE: usize = 200;

pub struct DuplicateFileCheck;

#[async_trait]
impl ScanStep for DuplicateFileCheck {
    fn kind(&self) -> ScanStepKind {
        ScanStepKind::DuplicateFileCheck
    }

    fn need_process(&self, _ctx: &ScanContext) -> bool {
        true
    }

    async fn process(&self, ctx: &mut ScanContext) -> Result<()> {
        ctx.stats.duplicates.clear();

        let mut last_id = 0;
        while !ctx.aborted() {
            let found = {
                let mut tx = ctx.db.read_tx().await?;
                track::find_duplicate_recordings(tx.conn(), last_id, BATCH_SIZE).await?
            };
            let Some(last) = found.last() else {
                break;
            };
            last_id = last.id;

            for duplicate in &found {
                tracing::debug!(
                    target: "library::duplicates",
                    path = %duplicate.absolute_file_path,
                    recording_mbid = %duplicate.recording_mbid,
                    "Duplicate recording"
                );
            }
            let n = found.len() as u64;
            ctx.stats.duplicates.extend(found.into_iter().map(ScanDuplicate::from));
            ctx.advance(n);
        }

        if !ctx.stats.duplicates.is_empty() {
            tracing::info!(target: "library::duplicates", count = ctx.stats.duplicates.len(), "Tracks share a recording MBID");
        }
        Ok(())
    }
}
