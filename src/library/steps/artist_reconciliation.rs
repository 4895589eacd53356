//! Re-bind artist references after the catalogue changed.
//!
//! Track artist links and artist info rows keep a snapshot of the name they
//! were created from. References matched by MBID are authoritative. Name-only
//! references are re-resolved when their artist was renamed or when the MBID
//! fallback policy now points them somewhere else.

use async_trait::async_trait;

use crate::db::artist::{self, ArtistRefSnapshot};
use crate::error::Result;
use crate::library::context::{ScanContext, ScanStep, ScanStepKind};

const BATCH_SIZE: usize = 50;

/// One family of references to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    LinkNameDrift,
    AmbiguousLinks,
    ArtistInfoNameDrift,
    AmbiguousArtistInfos,
}

impl Pass {
    const ALL: [Pass; 4] = [
        Pass::LinkNameDrift,
        Pass::AmbiguousLinks,
        Pass::ArtistInfoNameDrift,
        Pass::AmbiguousArtistInfos,
    ];

    async fn fetch(
        self,
        conn: &mut sqlx::SqliteConnection,
        allow_fallback: bool,
        last_id: i64,
    ) -> sqlx::Result<Vec<ArtistRefSnapshot>> {
        match self {
            Pass::LinkNameDrift => artist::find_links_with_name_drift(conn, last_id, BATCH_SIZE).await,
            Pass::AmbiguousLinks => {
                artist::find_ambiguous_links(conn, allow_fallback, last_id, BATCH_SIZE).await
            }
            Pass::ArtistInfoNameDrift => {
                artist::find_artist_infos_with_name_drift(conn, last_id, BATCH_SIZE).await
            }
            Pass::AmbiguousArtistInfos => {
                artist::find_ambiguous_artist_infos(conn, allow_fallback, last_id, BATCH_SIZE).await
            }
        }
    }

    async fn rebind(self, conn: &mut sqlx::SqliteConnection, id: i64, artist_id: i64) -> sqlx::Result<()> {
        match self {
            Pass::LinkNameDrift | Pass::AmbiguousLinks => artist::rebind_link(conn, id, artist_id).await,
            Pass::ArtistInfoNameDrift | Pass::AmbiguousArtistInfos => {
                artist::rebind_artist_info(conn, id, artist_id).await
            }
        }
    }
}

pub struct ArtistReconciliation {
    allow_mbid_fallback: bool,
}

impl ArtistReconciliation {
    pub fn new(allow_mbid_fallback: bool) -> Self {
        Self { allow_mbid_fallback }
    }

    /// Give MBID artists the name their tracks currently use.
    async fn refresh_names(&self, ctx: &mut ScanContext) -> Result<()> {
        let mut last_id = 0;
        loop {
            if ctx.aborted() {
                return Ok(());
            }

            let names = {
                let mut tx = ctx.db.read_tx().await?;
                artist::find_artists_with_stale_name(tx.conn(), last_id, BATCH_SIZE).await?
            };
            let Some(last) = names.last() else {
                return Ok(());
            };
            last_id = last.artist_id;

            let mut tx = ctx.db.write_tx().await?;
            for preferred in &names {
                artist::set_name(tx.conn(), preferred.artist_id, &preferred.name, &preferred.sort_name).await?;
                tracing::debug!(target: "library::artist_reconciliation", artist_id = preferred.artist_id, name = %preferred.name, "Renamed artist");
            }
            tx.commit().await?;

            ctx.stats.updates += names.len() as u64;
            ctx.advance(names.len() as u64);
        }
    }

    async fn run_pass(&self, ctx: &mut ScanContext, pass: Pass) -> Result<()> {
        let mut last_id = 0;
        loop {
            if ctx.aborted() {
                return Ok(());
            }

            let snapshots = {
                let mut tx = ctx.db.read_tx().await?;
                pass.fetch(tx.conn(), self.allow_mbid_fallback, last_id).await?
            };
            let Some(last) = snapshots.last() else {
                return Ok(());
            };
            last_id = last.id;

            let mut rebound = 0;
            let mut tx = ctx.db.write_tx().await?;
            for snapshot in &snapshots {
                let artist_id = artist::get_or_create_by_name(
                    tx.conn(),
                    &snapshot.name,
                    &snapshot.sort_name,
                    self.allow_mbid_fallback,
                )
                .await?;
                if artist_id == snapshot.artist_id {
                    continue;
                }

                pass.rebind(tx.conn(), snapshot.id, artist_id).await?;
                tracing::debug!(
                    target: "library::artist_reconciliation",
                    ?pass,
                    id = snapshot.id,
                    from = snapshot.artist_id,
                    to = artist_id,
                    "Rebound artist reference"
                );
                rebound += 1;
            }
            tx.commit().await?;

            ctx.stats.updates += rebound;
            ctx.advance(snapshots.len() as u64);
        }
    }
}

#[async_trait]
impl ScanStep for ArtistReconciliation {
    fn kind(&self) -> ScanStepKind {
        ScanStepKind::ArtistReconciliation
    }

    // Cheap when nothing drifted; drift can also come from outside the scan
    fn need_process(&self, _ctx: &ScanContext) -> bool {
        true
    }

    async fn process(&self, ctx: &mut ScanContext) -> Result<()> {
        let before = ctx.stats.updates;

        self.refresh_names(ctx).await?;
        for pass in Pass::ALL {
            self.run_pass(ctx, pass).await?;
        }

        tracing::info!(
            target: "library::artist_reconciliation",
            updated = ctx.stats.updates - before,
            "Artist references reconciled"
        );
        Ok(())
    }
}
