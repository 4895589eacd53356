//! Drop index rows for files that are gone.
//!
//! A row is stale when its file no longer exists, has left every library
//! root, sits below an excluded directory, or is no longer handled by the
//! decoder kind it was indexed with.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rayon::prelude::*;

use crate::db::{cursor, files};
use crate::error::Result;
use crate::library::context::{ScanContext, ScanStep, ScanStepKind};
use crate::model::FileKind;
use crate::scanner::ScannerRegistry;
use crate::scanner::walk::is_within_roots;

const READ_BATCH_SIZE: usize = 200;
const WRITE_BATCH_SIZE: usize = 50;

pub struct RemovedFileCheck {
    registry: ScannerRegistry,
}

impl RemovedFileCheck {
    pub fn new(registry: ScannerRegistry) -> Self {
        Self { registry }
    }
}

fn is_still_indexable(path: &Path, kind: FileKind, roots: &[PathBuf], registry: &ScannerRegistry) -> bool {
    path.is_file() && is_within_roots(path, roots) && registry.kind_of(path) == Some(kind)
}

#[async_trait]
impl ScanStep for RemovedFileCheck {
    fn kind(&self) -> ScanStepKind {
        ScanStepKind::RemovedFileCheck
    }

    fn need_process(&self, _ctx: &ScanContext) -> bool {
        true
    }

    async fn process(&self, ctx: &mut ScanContext) -> Result<()> {
        let roots = ctx.library_roots();

        let mut total = 0;
        {
            let mut tx = ctx.db.read_tx().await?;
            for kind in FileKind::ALL {
                total += cursor::count(tx.conn(), kind.into()).await?;
            }
        }
        ctx.set_total(total as u64);

        for kind in FileKind::ALL {
            let mut last_id = 0;
            loop {
                if ctx.aborted() {
                    return Ok(());
                }

                let rows = {
                    let mut tx = ctx.db.read_tx().await?;
                    files::find_paths_after(tx.conn(), kind, last_id, READ_BATCH_SIZE).await?
                };
                let Some((last, _)) = rows.last() else {
                    break;
                };
                last_id = *last;
                let checked = rows.len() as u64;

                let registry = self.registry.clone();
                let roots = roots.clone();
                let stale: Vec<(i64, String)> = tokio::task::spawn_blocking(move || {
                    rows.into_par_iter()
                        .filter(|(_, path)| !is_still_indexable(Path::new(path), kind, &roots, &registry))
                        .collect()
                })
                .await?;

                for batch in stale.chunks(WRITE_BATCH_SIZE) {
                    let mut tx = ctx.db.write_tx().await?;
                    let mut removed = 0;
                    for (id, path) in batch {
                        if files::delete_by_id(tx.conn(), kind, *id).await? {
                            tracing::debug!(target: "library::removed_files", path = %path, "Removed file from index");
                            removed += 1;
                        }
                    }
                    tx.commit().await?;
                    ctx.stats.deletions += removed;
                }

                ctx.advance(checked);
            }
        }

        Ok(())
    }
}
