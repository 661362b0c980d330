use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::cli::{Cli, Mode};
use crate::download::DEFAULT_COMMAND;
use crate::retry::RetryConfig;
use crate::types::QualityPreference;

/// Name of the optional settings file inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Usage(String),

    #[error("Data directory {} exists and is not a directory", path.display())]
    DataDirConflict { path: PathBuf },

    #[error("Cannot determine the home directory; pass --data-dir or set FM163_HOME")]
    NoHomeDir,

    #[error("Invalid {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Contents of `config.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub downloader: DownloaderSection,
    pub leancloud: Option<LeanCloudSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloaderSection {
    /// argv template; `{id}` and `{dfs_id}` are substituted per track.
    pub command: Option<Vec<String>>,
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeanCloudSection {
    pub app_id: String,
    pub app_key: String,
    pub server_url: String,
}

impl std::fmt::Debug for LeanCloudSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeanCloudSection")
            .field("app_id", &self.app_id)
            .field("app_key", &"<redacted>")
            .field("server_url", &self.server_url)
            .finish()
    }
}

impl FileConfig {
    /// Read `path`, treating an absent file as all defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config
            .downloader
            .command
            .as_ref()
            .is_some_and(|c| c.is_empty())
        {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "downloader.command must not be empty".into(),
            });
        }
        Ok(config)
    }
}

/// Application configuration, resolved from the command line and
/// `<data_dir>/config.toml`.
#[derive(Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub downloader_command: Vec<String>,
    pub leancloud: Option<LeanCloudSection>,
    pub retry: RetryConfig,
    pub quality: Option<QualityPreference>,
    pub mode: Mode,
}

/// Expand ~ to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".fm163"))
        .ok_or(ConfigError::NoHomeDir)
}

/// Create the data directory if needed. A non-directory in its place is a
/// configuration error, not something to overwrite.
pub fn ensure_data_dir(path: &Path) -> Result<(), ConfigError> {
    if path.exists() && !path.is_dir() {
        return Err(ConfigError::DataDirConflict {
            path: path.to_path_buf(),
        });
    }
    std::fs::create_dir_all(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let mode = cli.mode()?;
        let data_dir = match cli.data_dir() {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        ensure_data_dir(&data_dir)?;

        let config_path = data_dir.join(CONFIG_FILE);
        let file = FileConfig::load(&config_path)?;
        let downloader_command = file
            .downloader
            .command
            .unwrap_or_else(|| DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect());

        // Without a quality preference no resource id is ever selected.
        let needs_resource = downloader_command.iter().any(|arg| arg.contains("{dfs_id}"));
        if matches!(mode, Mode::Download { .. }) && needs_resource && cli.quality.is_none() {
            return Err(ConfigError::Invalid {
                path: config_path,
                reason: "downloader.command uses {dfs_id}, which requires --quality".into(),
            });
        }

        Ok(Self {
            data_dir,
            downloader_command,
            leancloud: file.leancloud,
            retry: RetryConfig::default(),
            quality: cli.quality,
            mode,
        })
    }
}
