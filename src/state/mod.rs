//! Local sync state.
//!
//! Everything lives in one data directory:
//! - `history`: the ledger of processed track ids (binary)
//! - `meta.json`: full track records
//! - `songs_id.json`: exported ledger, for other tools
//!
//! Files are only ever replaced through [`atomic::atomic_write`], so each is
//! always either its previous or its new complete version.

pub mod atomic;
pub mod error;
pub mod ledger;
pub mod meta;

pub use error::StateError;
pub use ledger::{export_ids, Ledger, LedgerStore};
pub use meta::{deduplicate, track_ids, MetaStore};

use std::path::{Path, PathBuf};

/// Root of the on-disk state. Passed explicitly so tests can use a temp dir.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger(&self) -> LedgerStore {
        LedgerStore::new(self.root.join("history"))
    }

    pub fn meta(&self) -> MetaStore {
        MetaStore::new(self.root.join("meta.json"))
    }

    pub fn export_path(&self) -> PathBuf {
        self.root.join("songs_id.json")
    }
}
