//! The ledger: every track id ever processed, in a compact binary file.

use std::collections::BTreeSet;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use bincode::Options;

use super::atomic::{atomic_write, pretty_json};
use super::error::{SerializeError, StateError};
use crate::netease::TrackId;

/// Set of processed track ids. Only ever grows.
pub type Ledger = BTreeSet<TrackId>;

const MAGIC: &[u8; 8] = b"FM163LG\x01";

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

fn encode(ledger: &Ledger, out: &mut dyn Write) -> Result<(), SerializeError> {
    out.write_all(MAGIC)?;
    codec().serialize_into(out, ledger)?;
    Ok(())
}

fn decode(path: &Path, bytes: &[u8]) -> Result<Ledger, StateError> {
    let payload = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| StateError::corrupt(path, "missing ledger header"))?;
    codec()
        .deserialize(payload)
        .map_err(|e| StateError::corrupt(path, e))
}

#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger; an absent file is an empty ledger.
    pub fn load(&self) -> Result<Ledger, StateError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let ledger = decode(&self.path, &bytes)?;
                tracing::debug!(entries = ledger.len(), "Loaded ledger");
                Ok(ledger)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Ledger::new()),
            Err(e) => Err(StateError::io(&self.path, e)),
        }
    }

    pub fn save(&self, ledger: &Ledger) -> Result<(), StateError> {
        atomic_write(&self.path, ledger, encode)
    }

    /// Read a ledger written by the pre-binary releases: a JSON array of ids,
    /// unsorted and possibly with duplicates.
    pub fn load_legacy(&self) -> Result<Ledger, StateError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => StateError::corrupt(&self.path, "legacy ledger is not UTF-8"),
            _ => StateError::io(&self.path, e),
        })?;
        let ids: Vec<TrackId> =
            serde_json::from_str(&text).map_err(|e| StateError::corrupt(&self.path, e))?;
        Ok(ids.into_iter().collect())
    }
}

/// Write `ids` ascending as a pretty JSON array (`songs_id.json`).
pub fn export_ids(path: &Path, ledger: &Ledger) -> Result<(), StateError> {
    let ids: Vec<TrackId> = ledger.iter().copied().collect();
    atomic_write(path, ids.as_slice(), pretty_json)
}
