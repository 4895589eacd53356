//! Remove catalogue rows nothing refers to any more.

use async_trait::async_trait;

use crate::db::orphan::{self, OrphanKind};
use crate::error::Result;
use crate::library::context::{ScanContext, ScanStep, ScanStepKind};

const BATCH_SIZE: usize = 200;

pub struct RemoveOrphanedDbEntries;

impl RemoveOrphanedDbEntries {
    /// One pass over `kind`. Returns the number of rows deleted, or `None`
    /// when the scan was aborted.
    async fn remove_pass(&self, ctx: &mut ScanContext, kind: OrphanKind) -> Result<Option<u64>> {
        let mut removed = 0;
        let mut last_id = 0;
        loop {
            if ctx.aborted() {
                return Ok(None);
            }

            let ids = {
                let mut tx = ctx.db.read_tx().await?;
                orphan::find_orphan_ids(tx.conn(), kind, last_id, BATCH_SIZE).await?
            };
            let Some(last) = ids.last() else {
                return Ok(Some(removed));
            };
            last_id = *last;

            let mut tx = ctx.db.write_tx().await?;
            let deleted = orphan::delete(tx.conn(), kind, &ids).await?;
            tx.commit().await?;

            removed += deleted;
            ctx.stats.deletions += deleted;
            ctx.advance(ids.len() as u64);
        }
    }
}

#[async_trait]
impl ScanStep for RemoveOrphanedDbEntries {
    fn kind(&self) -> ScanStepKind {
        ScanStepKind::RemoveOrphanedDbEntries
    }

    fn need_process(&self, _ctx: &ScanContext) -> bool {
        true
    }

    async fn process(&self, ctx: &mut ScanContext) -> Result<()> {
        let mut total = 0;
        {
            let mut tx = ctx.db.read_tx().await?;
            for kind in OrphanKind::ALL {
                total += orphan::count_orphans(tx.conn(), kind).await?;
            }
        }
        ctx.set_total(total as u64);

        for kind in OrphanKind::ALL {
            // Removing a leaf directory can orphan its parent
            loop {
                let Some(removed) = self.remove_pass(ctx, kind).await? else {
                    return Ok(());
                };
                if removed > 0 {
                    tracing::debug!(target: "library::orphans", %kind, removed, "Removed orphaned rows");
                }
                if kind != OrphanKind::Directory || removed == 0 {
                    break;
                }
            }
        }

        Ok(())
    }
}
