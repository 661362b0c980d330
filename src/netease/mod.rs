//! NetEase Cloud Music service: playlist and track detail lookups, plus the
//! track model and quality selection shared by the rest of the crate.

mod client;
pub mod error;
pub mod quality;
pub mod types;

pub use client::NeteaseClient;
pub use error::NeteaseError;
pub use quality::select_resource_id;
pub use types::{Playlist, ResourceId, Track, TrackId};

use async_trait::async_trait;

/// Remote catalog lookups the sync core depends on.
#[async_trait]
pub trait MusicApi: Send + Sync {
    /// Fetch a playlist with its tracks and declared track count.
    async fn playlist_detail(&self, id: u64) -> Result<Playlist, NeteaseError>;

    /// Fetch detail records for a batch of tracks.
    ///
    /// Ids the service no longer knows are silently absent from the result.
    async fn songs_detail(&self, ids: &[TrackId]) -> Result<Vec<Track>, NeteaseError>;
}
