use thiserror::Error;

/// Acquisition failures. `ExitStatus` and `MissingResource` are reported per
/// track; see [`DownloadError::is_fatal_for_run`] for the ones that abort.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Downloader command is empty")]
    EmptyCommand,

    #[error("Failed to start downloader `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Downloader exited with {status} for track {track}")]
    ExitStatus {
        track: u64,
        status: std::process::ExitStatus,
    },

    #[error("Command uses {{dfs_id}} but track {0} has no resource id")]
    MissingResource(u64),
}

impl DownloadError {
    /// Configuration problems that will fail the same way for every track.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, DownloadError::EmptyCommand | DownloadError::Spawn { .. })
    }
}
