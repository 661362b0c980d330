//! Fill in metadata for ledger ids that have no detail record.

use async_trait::async_trait;

use crate::netease::{MusicApi, Track, TrackId};
use crate::registry::TrackRegistry;
use crate::state::Ledger;

/// Anything that can return detail records for a batch of ids.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_details(&self, ids: &[TrackId]) -> anyhow::Result<Vec<Track>>;
}

/// Detail lookups against the music catalog.
pub struct CatalogDetails<'a>(pub &'a dyn MusicApi);

#[async_trait]
impl<'a> DetailSource for CatalogDetails<'a> {
    async fn fetch_details(&self, ids: &[TrackId]) -> anyhow::Result<Vec<Track>> {
        Ok(self.0.songs_detail(ids).await?)
    }
}

/// Detail lookups against the remote registry.
pub struct RegistryDetails<'a>(pub &'a dyn TrackRegistry);

#[async_trait]
impl<'a> DetailSource for RegistryDetails<'a> {
    async fn fetch_details(&self, ids: &[TrackId]) -> anyhow::Result<Vec<Track>> {
        Ok(self.0.fetch_in(ids).await?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Records appended to the metadata store.
    pub fetched: usize,
    /// Ids the source stopped returning.
    pub gone: Ledger,
    pub rounds: usize,
}

impl ResolveReport {
    /// `Cannot fetch n tracks. Probably they are gone.`, if any are.
    pub fn gone_line(&self) -> Option<String> {
        if self.gone.is_empty() {
            None
        } else {
            Some(format!(
                "Cannot fetch {} tracks. Probably they are gone.",
                self.gone.len()
            ))
        }
    }
}

/// Fetch detail for `missing` in rounds, appending what comes back to `meta`.
///
/// Each round asks for every still-missing id in one batch. Rounds continue
/// while the missing set strictly shrinks, so the loop ends after at most
/// `missing.len() + 1` rounds; when a round makes no progress the leftovers
/// are reported as gone. Only records for requested ids are kept.
pub async fn resolve_missing(
    meta: &mut Vec<Track>,
    missing: Ledger,
    source: &dyn DetailSource,
) -> anyhow::Result<ResolveReport> {
    let mut report = ResolveReport::default();
    let mut missing = missing;
    let mut budget = missing.len();

    while !missing.is_empty() {
        let ids: Vec<TrackId> = missing.iter().copied().collect();
        let details = source.fetch_details(&ids).await?;
        report.rounds += 1;

        let mut returned = Ledger::new();
        for track in details {
            if missing.contains(&track.id) && returned.insert(track.id) {
                meta.push(track);
            }
        }
        report.fetched += returned.len();

        let still_missing: Ledger = missing.difference(&returned).copied().collect();
        tracing::debug!(
            round = report.rounds,
            fetched = returned.len(),
            remaining = still_missing.len(),
            "Detail round"
        );

        if still_missing.len() >= budget {
            report.gone = still_missing;
            break;
        }
        budget = still_missing.len();
        missing = still_missing;
    }

    Ok(report)
}
