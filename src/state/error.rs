//! Error types for the local stores.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error produced by a serializer passed to `atomic_write`.
pub type SerializeError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum StateError {
    /// A store file exists but cannot be decoded.
    #[error("Store file {path} is corrupt: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    /// A value could not be serialized; the destination was left untouched.
    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: SerializeError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StateError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::CorruptState {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Internal errors ask the user to file a bug rather than fix their setup.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::CorruptState { .. } | Self::Serialize { .. })
    }
}
