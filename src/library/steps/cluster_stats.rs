//! Recompute cached per-cluster track and release counts.

use async_trait::async_trait;

use crate::db::cluster;
use crate::db::cursor::{self, IdRange, Table};
use crate::error::Result;
use crate::library::context::{ScanContext, ScanStep, ScanStepKind};

const BATCH_SIZE: usize = 100;

pub struct ComputeClusterStats;

#[async_trait]
impl ScanStep for ComputeClusterStats {
    fn kind(&self) -> ScanStepKind {
        ScanStepKind::ComputeClusterStats
    }

    fn need_process(&self, ctx: &ScanContext) -> bool {
        ctx.stats.changes() > 0
    }

    async fn process(&self, ctx: &mut ScanContext) -> Result<()> {
        let total = {
            let mut tx = ctx.db.read_tx().await?;
            cursor::count(tx.conn(), Table::Cluster).await?
        };
        ctx.set_total(total as u64);

        let mut last_id = 0;
        let mut changed = 0;
        while !ctx.aborted() {
            let ids = {
                let mut tx = ctx.db.read_tx().await?;
                cursor::find_ids_after(tx.conn(), Table::Cluster, last_id, BATCH_SIZE).await?
            };
            let (Some(&first), Some(&last)) = (ids.first(), ids.last()) else {
                break;
            };
            last_id = last;

            let mut tx = ctx.db.write_tx().await?;
            changed += cluster::update_stats(tx.conn(), IdRange { first, last }).await?;
            tx.commit().await?;

            ctx.advance(ids.len() as u64);
        }

        tracing::debug!(target: "library::cluster_stats", changed, "Cluster stats computed");
        Ok(())
    }
}
