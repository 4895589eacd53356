//! Refresh the query planner statistics.

use async_trait::async_trait;

use crate::error::Result;
use crate::library::context::{ScanContext, ScanStep, ScanStepKind};

pub struct Optimize;

#[async_trait]
impl ScanStep for Optimize {
    fn kind(&self) -> ScanStepKind {
        ScanStepKind::Optimize
    }

    fn need_process(&self, ctx: &ScanContext) -> bool {
        ctx.stats.changes() > 0 || ctx.options.force_optimize
    }

    async fn process(&self, ctx: &mut ScanContext) -> Result<()> {
        ctx.set_total(1);

        let mut tx = ctx.db.write_tx().await?;
        sqlx::query("ANALYZE").execute(tx.conn()).await?;
        sqlx::query("PRAGMA optimize").execute(tx.conn()).await?;
        tx.commit().await?;

        tracing::debug!(target: "library::optimize", "Index statistics refreshed");
        ctx.advance(1);
        Ok(())
    }
}
