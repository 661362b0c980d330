//! Diff a remote playlist against the ledger and acquire what is new.

use crate::download::{AcquireRequest, DownloadError, Downloader};
use crate::netease::{select_resource_id, Playlist, Track};
use crate::registry::TrackRegistry;
use crate::state::Ledger;
use crate::types::QualityPreference;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Every track was already in the ledger; nothing changed.
    AllSkipped { total: usize },
    Updated(ReconcileSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Declared playlist size.
    pub total: usize,
    pub skipped: usize,
    /// New tracks added to the ledger, whatever their acquisition result.
    pub added: usize,
    /// New tracks without a resource id under the active preference.
    pub unavailable: usize,
    /// New tracks whose download or registration failed.
    pub failed: usize,
}

pub struct Reconciler<'a> {
    downloader: &'a dyn Downloader,
    registry: Option<&'a dyn TrackRegistry>,
    quality: Option<QualityPreference>,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(downloader: &'a dyn Downloader) -> Self {
        Self {
            downloader,
            registry: None,
            quality: None,
            dry_run: false,
        }
    }

    pub fn registry(mut self, registry: Option<&'a dyn TrackRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn quality(mut self, quality: Option<QualityPreference>) -> Self {
        self.quality = quality;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Walk `playlist` in remote order, skipping ids already in `ledger` and
    /// acquiring the rest. Every new id is added to `ledger` and its record
    /// appended to `meta`, even when acquisition fails: the service will not
    /// produce a working resource for it later either.
    ///
    /// Nothing is persisted here. Errors are returned only for downloader
    /// misconfiguration, which would fail identically for every track.
    pub async fn reconcile(
        &self,
        playlist: &Playlist,
        ledger: &mut Ledger,
        meta: &mut Vec<Track>,
    ) -> Result<ReconcileOutcome, DownloadError> {
        if playlist.track_count != playlist.tracks.len() {
            tracing::warn!(
                declared = playlist.track_count,
                returned = playlist.tracks.len(),
                "Playlist track count disagrees with returned tracks"
            );
        }

        let mut summary = ReconcileSummary {
            total: playlist.track_count,
            ..Default::default()
        };

        for track in &playlist.tracks {
            if ledger.contains(&track.id) {
                println!("SKIP {} {}", track.name, track.url());
                summary.skipped += 1;
                continue;
            }

            self.acquire(track, &mut summary).await?;
            ledger.insert(track.id);
            meta.push(track.clone());
            summary.added += 1;
        }

        if summary.added == 0 && summary.skipped > 0 && summary.skipped == summary.total {
            return Ok(ReconcileOutcome::AllSkipped {
                total: summary.total,
            });
        }
        if let Some(line) = skip_summary_line(summary.skipped, summary.total) {
            println!("\n{line}");
        }
        Ok(ReconcileOutcome::Updated(summary))
    }

    async fn acquire(
        &self,
        track: &Track,
        summary: &mut ReconcileSummary,
    ) -> Result<(), DownloadError> {
        let resource = match self.quality {
            Some(pref) => match select_resource_id(track, pref.order()) {
                Ok(id) => Some(id),
                Err(_) => {
                    println!("UNAVAILABLE {} {}", track.name, track.url());
                    summary.unavailable += 1;
                    self.register(track, summary).await;
                    return Ok(());
                }
            },
            None => None,
        };

        if self.dry_run {
            tracing::info!(id = %track.id, "[DRY RUN] Would download {}", track.name);
        } else {
            let request = AcquireRequest {
                track: track.id,
                resource,
            };
            match self.downloader.acquire(&request).await {
                Ok(()) => tracing::info!(id = %track.id, "Downloaded {}", track.name),
                Err(e) if e.is_fatal_for_run() => return Err(e),
                Err(e) => {
                    println!("FAILED {} {}", track.name, track.url());
                    tracing::warn!(id = %track.id, "Download failed: {}", e);
                    summary.failed += 1;
                }
            }
        }

        self.register(track, summary).await;
        Ok(())
    }

    /// Record the track in the remote registry, if one is configured.
    async fn register(&self, track: &Track, summary: &mut ReconcileSummary) {
        let Some(registry) = self.registry else {
            return;
        };
        let result = match registry.exists(track.id).await {
            Ok(true) => Ok(()),
            Ok(false) => registry.insert(track).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            println!("UNREGISTERED {} {}", track.name, track.url());
            tracing::warn!(id = %track.id, "Registry update failed: {}", e);
            summary.failed += 1;
        }
    }
}

/// `Skipped k of n tracks in the playlist.` for a partial skip, else `None`.
pub fn skip_summary_line(skipped: usize, total: usize) -> Option<String> {
    if skipped == 0 || skipped == total {
        None
    } else {
        Some(format!(
            "Skipped {} of {} tracks in the playlist.",
            skipped, total
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netease::{ResourceId, TrackId};
    use crate::registry::RegistryError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDownloader {
        calls: Mutex<Vec<AcquireRequest>>,
        failing: HashSet<u64>,
        broken: bool,
    }

    #[async_trait]
    impl Downloader for FakeDownloader {
        async fn acquire(&self, request: &AcquireRequest) -> Result<(), DownloadError> {
            if self.broken {
                return Err(DownloadError::EmptyCommand);
            }
            self.calls.lock().unwrap().push(*request);
            if self.failing.contains(&request.track.0) {
                return Err(DownloadError::MissingResource(request.track.0));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRegistry {
        stored: Mutex<Vec<TrackId>>,
    }

    #[async_trait]
    impl TrackRegistry for FakeRegistry {
        async fn exists(&self, id: TrackId) -> Result<bool, RegistryError> {
            Ok(self.stored.lock().unwrap().contains(&id))
        }

        async fn insert(&self, track: &Track) -> Result<(), RegistryError> {
            self.stored.lock().unwrap().push(track.id);
            Ok(())
        }

        async fn fetch_in(&self, _ids: &[TrackId]) -> Result<Vec<Track>, RegistryError> {
            Ok(Vec::new())
        }
    }

    fn playlist(ids: &[u64]) -> Playlist {
        Playlist {
            id: 1,
            name: "test".into(),
            tracks: ids.iter().map(|&i| Track::new(i, format!("t{i}"))).collect(),
            track_count: ids.len(),
        }
    }

    fn ids(ledger: &Ledger) -> Vec<u64> {
        ledger.iter().map(|t| t.0).collect()
    }

    #[tokio::test]
    async fn test_first_run_acquires_everything() {
        let downloader = FakeDownloader::default();
        let mut ledger = Ledger::new();
        let mut meta = Vec::new();

        let outcome = Reconciler::new(&downloader)
            .reconcile(&playlist(&[1, 2, 3]), &mut ledger, &mut meta)
            .await
            .unwrap();

        let ReconcileOutcome::Updated(summary) = outcome else {
            panic!("expected Updated, got {outcome:?}");
        };
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.added, 3);
        assert_eq!(ids(&ledger), [1, 2, 3]);
        assert_eq!(meta.len(), 3);
        assert_eq!(downloader.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_second_run_skips_all_without_mutation() {
        let downloader = FakeDownloader::default();
        let reconciler = Reconciler::new(&downloader);
        let list = playlist(&[1, 2, 3]);
        let mut ledger = Ledger::new();
        let mut meta = Vec::new();
        reconciler.reconcile(&list, &mut ledger, &mut meta).await.unwrap();

        let ledger_before = ledger.clone();
        let meta_before = meta.clone();
        let outcome = reconciler.reconcile(&list, &mut ledger, &mut meta).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::AllSkipped { total: 3 });
        assert_eq!(ledger, ledger_before);
        assert_eq!(meta, meta_before);
        assert_eq!(downloader.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_partial_skip_keeps_ledger_monotonic() {
        let downloader = FakeDownloader::default();
        let mut ledger: Ledger = [TrackId(2), TrackId(99)].into_iter().collect();
        let before = ledger.clone();
        let mut meta = Vec::new();

        let outcome = Reconciler::new(&downloader)
            .reconcile(&playlist(&[1, 2, 3]), &mut ledger, &mut meta)
            .await
            .unwrap();

        let ReconcileOutcome::Updated(summary) = outcome else {
            panic!("expected Updated");
        };
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.added, 2);
        assert!(ledger.is_superset(&before));
        assert_eq!(ids(&ledger), [1, 2, 3, 99]);
        let requested: Vec<u64> = downloader
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.track.0)
            .collect();
        assert_eq!(requested, [1, 3]);
    }

    #[tokio::test]
    async fn test_failed_download_still_grows_ledger() {
        let downloader = FakeDownloader {
            failing: [2].into_iter().collect(),
            ..Default::default()
        };
        let mut ledger = Ledger::new();
        let mut meta = Vec::new();

        let outcome = Reconciler::new(&downloader)
            .reconcile(&playlist(&[1, 2]), &mut ledger, &mut meta)
            .await
            .unwrap();

        let ReconcileOutcome::Updated(summary) = outcome else {
            panic!("expected Updated");
        };
        assert_eq!(summary.failed, 1);
        assert_eq!(ids(&ledger), [1, 2]);
        assert_eq!(meta.len(), 2);
    }

    #[tokio::test]
    async fn test_broken_downloader_aborts_before_state_change() {
        let downloader = FakeDownloader {
            broken: true,
            ..Default::default()
        };
        let mut ledger = Ledger::new();
        let mut meta = Vec::new();

        let result = Reconciler::new(&downloader)
            .reconcile(&playlist(&[1]), &mut ledger, &mut meta)
            .await;

        assert!(result.is_err());
        assert!(ledger.is_empty());
        assert!(meta.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_records_without_downloading() {
        let downloader = FakeDownloader::default();
        let registry = FakeRegistry::default();
        let mut ledger = Ledger::new();
        let mut meta = Vec::new();

        Reconciler::new(&downloader)
            .registry(Some(&registry))
            .dry_run(true)
            .reconcile(&playlist(&[4, 5]), &mut ledger, &mut meta)
            .await
            .unwrap();

        assert!(downloader.calls.lock().unwrap().is_empty());
        assert_eq!(ids(&ledger), [4, 5]);
        assert_eq!(*registry.stored.lock().unwrap(), [TrackId(4), TrackId(5)]);
    }

    #[tokio::test]
    async fn test_registry_insert_skipped_when_present() {
        let downloader = FakeDownloader::default();
        let registry = FakeRegistry {
            stored: Mutex::new(vec![TrackId(1)]),
        };
        let mut ledger = Ledger::new();
        let mut meta = Vec::new();

        Reconciler::new(&downloader)
            .registry(Some(&registry))
            .reconcile(&playlist(&[1, 2]), &mut ledger, &mut meta)
            .await
            .unwrap();

        assert_eq!(*registry.stored.lock().unwrap(), [TrackId(1), TrackId(2)]);
    }

    struct UnreachableRegistry;

    #[async_trait]
    impl TrackRegistry for UnreachableRegistry {
        async fn exists(&self, _id: TrackId) -> Result<bool, RegistryError> {
            Err(RegistryError::Response("connection reset".into()))
        }

        async fn insert(&self, _track: &Track) -> Result<(), RegistryError> {
            Err(RegistryError::Response("connection reset".into()))
        }

        async fn fetch_in(&self, _ids: &[TrackId]) -> Result<Vec<Track>, RegistryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_registry_failure_counts_as_failed_and_keeps_track() {
        let downloader = FakeDownloader::default();
        let mut ledger = Ledger::new();
        let mut meta = Vec::new();

        let outcome = Reconciler::new(&downloader)
            .registry(Some(&UnreachableRegistry))
            .reconcile(&playlist(&[8]), &mut ledger, &mut meta)
            .await
            .unwrap();

        let ReconcileOutcome::Updated(summary) = outcome else {
            panic!("expected Updated");
        };
        assert_eq!(summary.failed, 1);
        assert_eq!(ids(&ledger), [8]);
        assert_eq!(downloader.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quality_selection_passes_resource_and_flags_unavailable() {
        let downloader = FakeDownloader::default();
        let tracks: Vec<Track> = serde_json::from_value(json!([
            {"id": 1, "name": "ok", "mMusic": null, "hMusic": {"dfsId": 42}},
            {"id": 2, "name": "gone", "hMusic": null, "mMusic": {"dfsId": null}},
        ]))
        .unwrap();
        let list = Playlist {
            id: 1,
            name: "q".into(),
            track_count: tracks.len(),
            tracks,
        };
        let mut ledger = Ledger::new();
        let mut meta = Vec::new();

        let outcome = Reconciler::new(&downloader)
            .quality(Some(QualityPreference::Balanced))
            .reconcile(&list, &mut ledger, &mut meta)
            .await
            .unwrap();

        let ReconcileOutcome::Updated(summary) = outcome else {
            panic!("expected Updated");
        };
        assert_eq!(summary.unavailable, 1);
        assert_eq!(ids(&ledger), [1, 2]);
        let calls = downloader.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].resource, Some(ResourceId(42)));
    }

    #[tokio::test]
    async fn test_all_skipped_uses_declared_count() {
        let downloader = FakeDownloader::default();
        let mut list = playlist(&[1, 2]);
        list.track_count = 3;
        let mut ledger: Ledger = [TrackId(1), TrackId(2)].into_iter().collect();
        let mut meta = Vec::new();

        let outcome = Reconciler::new(&downloader)
            .reconcile(&list, &mut ledger, &mut meta)
            .await
            .unwrap();

        // Under-reported by the service: not classified as all-skipped.
        assert!(matches!(outcome, ReconcileOutcome::Updated(ref s) if s.skipped == 2));
    }

    #[tokio::test]
    async fn test_new_tracks_prevent_all_skipped_when_count_under_declared() {
        let downloader = FakeDownloader::default();
        let mut list = playlist(&[1, 2, 3]);
        list.track_count = 2;
        let mut ledger: Ledger = [TrackId(1), TrackId(2)].into_iter().collect();
        let mut meta = Vec::new();

        let outcome = Reconciler::new(&downloader)
            .reconcile(&list, &mut ledger, &mut meta)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Updated(ref s) if s.added == 1 && s.skipped == 2
        ));
        assert_eq!(ids(&ledger), [1, 2, 3]);
        assert_eq!(meta.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_playlist_is_not_all_skipped() {
        let downloader = FakeDownloader::default();
        let mut ledger = Ledger::new();
        let mut meta = Vec::new();
        let outcome = Reconciler::new(&downloader)
            .reconcile(&playlist(&[]), &mut ledger, &mut meta)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Updated(ReconcileSummary::default()));
    }

    #[test]
    fn test_skip_summary_line() {
        assert_eq!(skip_summary_line(0, 3), None);
        assert_eq!(skip_summary_line(3, 3), None);
        assert_eq!(
            skip_summary_line(1, 3).as_deref(),
            Some("Skipped 1 of 3 tracks in the playlist.")
        );
    }
}
