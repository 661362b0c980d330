//! Sync modes: mirror a playlist, export the ledger, migrate a legacy ledger.
//!
//! Each mode loads the stores up front, works in memory, and persists with
//! atomic writes only after all remote work for the run has finished.

pub mod reconcile;
pub mod resolve;

pub use reconcile::{ReconcileOutcome, Reconciler};
pub use resolve::{resolve_missing, CatalogDetails, RegistryDetails, ResolveReport};

use anyhow::Context;

use crate::download::Downloader;
use crate::netease::MusicApi;
use crate::registry::TrackRegistry;
use crate::state::{self, Ledger, StateDir};
use crate::types::QualityPreference;

/// Options for a playlist sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    pub dry_run: bool,
    pub quality: Option<QualityPreference>,
}

/// Remote collaborators and local state shared by every mode.
pub struct Syncer<'a> {
    pub state: &'a StateDir,
    pub api: &'a dyn MusicApi,
    pub registry: Option<&'a dyn TrackRegistry>,
}

impl Syncer<'_> {
    /// Mirror one playlist.
    ///
    /// When every track is already in the ledger nothing is written and
    /// `AllSkipped` is returned.
    pub async fn download(
        &self,
        playlist_id: u64,
        downloader: &dyn Downloader,
        options: DownloadOptions,
    ) -> anyhow::Result<ReconcileOutcome> {
        let ledger_store = self.state.ledger();
        let meta_store = self.state.meta();
        let mut ledger = ledger_store.load()?;
        let mut meta = meta_store.load()?;

        let playlist = self.api.playlist_detail(playlist_id).await?;
        tracing::info!(
            id = playlist.id,
            tracks = playlist.track_count,
            "Fetched playlist {}",
            playlist.name
        );

        let outcome = Reconciler::new(downloader)
            .registry(self.registry)
            .quality(options.quality)
            .dry_run(options.dry_run)
            .reconcile(&playlist, &mut ledger, &mut meta)
            .await?;

        match &outcome {
            ReconcileOutcome::AllSkipped { .. } => {
                println!("\nSkipped all tracks in the playlist.");
            }
            ReconcileOutcome::Updated(summary) => {
                // Metadata first: a crash in between re-acquires rather than
                // losing records.
                meta_store.save(&meta)?;
                ledger_store.save(&ledger)?;
                tracing::info!(
                    added = summary.added,
                    skipped = summary.skipped,
                    unavailable = summary.unavailable,
                    failed = summary.failed,
                    "Sync complete"
                );
            }
        }
        Ok(outcome)
    }

    /// Merge metadata ids into the ledger, write `songs_id.json`, and fetch
    /// detail for ledger ids the metadata store lacks.
    pub async fn export(&self) -> anyhow::Result<ResolveReport> {
        let ledger_store = self.state.ledger();
        let meta_store = self.state.meta();
        let ledger = ledger_store.load()?;
        self.export_from(ledger, &meta_store).await
    }

    /// Convert a legacy JSON ledger to the binary format, then export.
    pub async fn migrate(&self) -> anyhow::Result<ResolveReport> {
        let ledger_store = self.state.ledger();
        let ledger = ledger_store
            .load_legacy()
            .context("Reading legacy ledger")?;
        tracing::info!(entries = ledger.len(), "Migrating legacy ledger");
        ledger_store.save(&ledger)?;
        self.export_from(ledger, &self.state.meta()).await
    }

    async fn export_from(
        &self,
        mut ledger: Ledger,
        meta_store: &state::MetaStore,
    ) -> anyhow::Result<ResolveReport> {
        let mut meta = state::deduplicate(meta_store.load()?);
        let known = state::track_ids(&meta);
        let missing: Ledger = ledger.difference(&known).copied().collect();

        ledger.extend(known);
        self.state.ledger().save(&ledger)?;
        state::export_ids(&self.state.export_path(), &ledger)?;
        tracing::info!(
            entries = ledger.len(),
            missing = missing.len(),
            "Exported ledger to {}",
            self.state.export_path().display()
        );

        let mut report = ResolveReport::default();
        let mut missing = missing;
        if let Some(registry) = self.registry {
            let from_registry =
                resolve_missing(&mut meta, missing, &RegistryDetails(registry)).await?;
            report.fetched += from_registry.fetched;
            report.rounds += from_registry.rounds;
            missing = from_registry.gone;
        }
        let from_catalog = resolve_missing(&mut meta, missing, &CatalogDetails(self.api)).await?;
        report.fetched += from_catalog.fetched;
        report.rounds += from_catalog.rounds;
        report.gone = from_catalog.gone;

        if let Some(line) = report.gone_line() {
            println!("{line}");
        }
        meta_store.save(&meta)?;
        Ok(report)
    }
}
