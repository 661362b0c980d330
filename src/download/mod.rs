//! Track acquisition. Audio bytes are fetched by an external program; this
//! module only builds its command line and checks how it exited.

pub mod error;

pub use error::DownloadError;

use async_trait::async_trait;
use tokio::process::Command;

use crate::netease::{ResourceId, TrackId};

/// Default external downloader: `ncm -s <track id>`.
pub const DEFAULT_COMMAND: [&str; 3] = ["ncm", "-s", "{id}"];

/// What the downloader is asked to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireRequest {
    pub track: TrackId,
    /// Resource picked by the quality selector, when one is active.
    pub resource: Option<ResourceId>,
}

#[async_trait]
pub trait Downloader: Send + Sync {
    async fn acquire(&self, request: &AcquireRequest) -> Result<(), DownloadError>;
}

/// Runs an external command per track.
///
/// `{id}` in any argument is replaced by the track id and `{dfs_id}` by the
/// selected resource id. Destinations are keyed by track id on the
/// downloader's side, so re-running for the same track is harmless.
#[derive(Debug, Clone)]
pub struct CommandDownloader {
    command: Vec<String>,
}

impl CommandDownloader {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    fn render(&self, request: &AcquireRequest) -> Result<Vec<String>, DownloadError> {
        if self.command.is_empty() {
            return Err(DownloadError::EmptyCommand);
        }
        self.command
            .iter()
            .map(|arg| {
                let mut arg = arg.replace("{id}", &request.track.to_string());
                if arg.contains("{dfs_id}") {
                    let resource = request
                        .resource
                        .ok_or(DownloadError::MissingResource(request.track.0))?;
                    arg = arg.replace("{dfs_id}", &resource.to_string());
                }
                Ok(arg)
            })
            .collect()
    }
}

impl Default for CommandDownloader {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect())
    }
}

#[async_trait]
impl Downloader for CommandDownloader {
    async fn acquire(&self, request: &AcquireRequest) -> Result<(), DownloadError> {
        let argv = self.render(request)?;
        let (program, args) = argv.split_first().ok_or(DownloadError::EmptyCommand)?;
        tracing::debug!(track = %request.track, command = ?argv, "Running downloader");

        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|source| DownloadError::Spawn {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DownloadError::ExitStatus {
                track: request.track.0,
                status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(track: u64, resource: Option<u64>) -> AcquireRequest {
        AcquireRequest {
            track: TrackId(track),
            resource: resource.map(ResourceId),
        }
    }

    fn command(args: &[&str]) -> CommandDownloader {
        CommandDownloader::new(args.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_default_command_renders_track_id() {
        let argv = CommandDownloader::default()
            .render(&request(186016, None))
            .unwrap();
        assert_eq!(argv, ["ncm", "-s", "186016"]);
    }

    #[test]
    fn test_render_resource_placeholder() {
        let argv = command(&["dl", "--out={id}.mp3", "{dfs_id}"])
            .render(&request(1, Some(42)))
            .unwrap();
        assert_eq!(argv, ["dl", "--out=1.mp3", "42"]);
    }

    #[test]
    fn test_render_resource_placeholder_without_resource() {
        let err = command(&["dl", "{dfs_id}"])
            .render(&request(9, None))
            .unwrap_err();
        assert!(matches!(err, DownloadError::MissingResource(9)));
    }

    #[test]
    fn test_render_empty_command() {
        let err = command(&[]).render(&request(1, None)).unwrap_err();
        assert!(matches!(err, DownloadError::EmptyCommand));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_acquire_success_and_failure_status() {
        assert!(command(&["true", "{id}"])
            .acquire(&request(1, None))
            .await
            .is_ok());
        let err = command(&["false"])
            .acquire(&request(2, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ExitStatus { track: 2, .. }));
    }

    #[tokio::test]
    async fn test_acquire_missing_program_is_spawn_error() {
        let err = command(&["fm163-rs-no-such-downloader"])
            .acquire(&request(1, None))
            .await
            .unwrap_err();
        assert!(err.is_fatal_for_run());
    }
}
