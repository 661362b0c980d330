//! Process exit statuses, following the BSD sysexits convention.

use crate::config::ConfigError;
use crate::download::DownloadError;
use crate::state::StateError;

pub const EX_GENERAL: u8 = 1;
pub const EX_USAGE: u8 = 64;
pub const EX_SOFTWARE: u8 = 70;
pub const EX_IOERR: u8 = 74;
pub const EX_CONFIG: u8 = 78;

/// Map a failed run to its exit status.
///
/// Remote failures (API errors, oversized playlists, registry errors) fall
/// through to `EX_GENERAL`.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<ConfigError>() {
        return match e {
            ConfigError::Usage(_) => EX_USAGE,
            ConfigError::Io { .. } => EX_IOERR,
            ConfigError::DataDirConflict { .. }
            | ConfigError::NoHomeDir
            | ConfigError::Parse { .. }
            | ConfigError::Invalid { .. } => EX_CONFIG,
        };
    }
    if let Some(e) = err.downcast_ref::<StateError>() {
        return if e.is_internal() { EX_SOFTWARE } else { EX_IOERR };
    }
    if let Some(e) = err.downcast_ref::<DownloadError>() {
        return match e {
            DownloadError::EmptyCommand | DownloadError::MissingResource(_) => EX_CONFIG,
            DownloadError::Spawn { .. } | DownloadError::ExitStatus { .. } => EX_IOERR,
        };
    }
    EX_GENERAL
}
