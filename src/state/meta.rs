//! The metadata store: full track records, kept for export and analysis.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::atomic::{atomic_write, pretty_json};
use super::error::StateError;
use super::ledger::Ledger;
use crate::netease::{Track, TrackId};

#[derive(Debug, Clone)]
pub struct MetaStore {
    path: PathBuf,
}

impl MetaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records; an absent file is an empty store.
    pub fn load(&self) -> Result<Vec<Track>, StateError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StateError::corrupt(&self.path, "not valid UTF-8"))
            }
            Err(e) => return Err(StateError::io(&self.path, e)),
        };
        let tracks: Vec<Track> =
            serde_json::from_str(&text).map_err(|e| StateError::corrupt(&self.path, e))?;
        tracing::debug!(records = tracks.len(), "Loaded metadata store");
        Ok(tracks)
    }

    /// Persist `tracks`, deduplicated by id.
    pub fn save(&self, tracks: &[Track]) -> Result<(), StateError> {
        let unique = deduplicate(tracks.to_vec());
        if unique.len() != tracks.len() {
            tracing::debug!(
                dropped = tracks.len() - unique.len(),
                "Dropped duplicate metadata records"
            );
        }
        atomic_write(&self.path, unique.as_slice(), pretty_json)
    }
}

/// Collapse records sharing an id. The first occurrence keeps its position,
/// the last occurrence provides the content.
pub fn deduplicate(tracks: Vec<Track>) -> Vec<Track> {
    let mut index: HashMap<TrackId, usize> = HashMap::with_capacity(tracks.len());
    let mut unique: Vec<Track> = Vec::with_capacity(tracks.len());
    for track in tracks {
        match index.get(&track.id) {
            Some(&i) => unique[i] = track,
            None => {
                index.insert(track.id, unique.len());
                unique.push(track);
            }
        }
    }
    unique
}

/// Ids present in `tracks`.
pub fn track_ids(tracks: &[Track]) -> Ledger {
    tracks.iter().map(|t| t.id).collect()
}
