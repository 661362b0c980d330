//! Remote track registry: an optional shared store of track records that
//! other machines or tools can query.

pub mod error;
mod leancloud;

pub use error::RegistryError;
pub use leancloud::LeanCloudRegistry;

use async_trait::async_trait;

use crate::netease::{Track, TrackId};

#[async_trait]
pub trait TrackRegistry: Send + Sync {
    /// Whether a record with this id is already stored.
    async fn exists(&self, id: TrackId) -> Result<bool, RegistryError>;

    async fn insert(&self, track: &Track) -> Result<(), RegistryError>;

    /// Records whose id is in `ids`. Unknown ids are absent from the result.
    async fn fetch_in(&self, ids: &[TrackId]) -> Result<Vec<Track>, RegistryError>;
}
