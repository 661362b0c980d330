use std::path::PathBuf;

use clap::Parser;

use crate::config::ConfigError;
use crate::types::*;

#[derive(Parser, Debug)]
#[command(
    name = "fm163-rs",
    version,
    about = "Mirror NetEase Cloud Music playlists, downloading each track once"
)]
#[command(group(clap::ArgGroup::new("mode").args(["dry_run", "export", "migrate"])))]
pub struct Cli {
    /// Playlist id, or a playlist URL with an `id` query parameter
    #[arg(value_parser = parse_playlist_id)]
    pub playlist: Option<u64>,

    /// Dry run: record history and metadata without downloading
    #[arg(short = 'D', long)]
    pub dry_run: bool,

    /// Export history to songs_id.json and fill in missing metadata
    #[arg(short = 'j', long)]
    pub export: bool,

    /// Migrate a legacy JSON history file, then export
    #[arg(short = 'm', long)]
    pub migrate: bool,

    /// Pick a resource id by quality before downloading
    #[arg(short = 'q', long, value_enum)]
    pub quality: Option<QualityPreference>,

    /// Data directory for history and metadata
    #[arg(long, env = "FM163_HOME")]
    pub data_dir: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

/// What this invocation does. Decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Download { playlist: u64, dry_run: bool },
    Export,
    Migrate,
}

impl Cli {
    pub fn mode(&self) -> Result<Mode, ConfigError> {
        if self.export {
            return Ok(Mode::Export);
        }
        if self.migrate {
            return Ok(Mode::Migrate);
        }
        match self.playlist {
            Some(playlist) => Ok(Mode::Download {
                playlist,
                dry_run: self.dry_run,
            }),
            None => Err(ConfigError::Usage("a PLAYLIST id or URL is required".into())),
        }
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.as_deref().map(crate::config::expand_tilde)
    }
}

/// Accept a numeric playlist id or a playlist URL.
///
/// NetEase web URLs carry the query after a `/#` pseudo-fragment
/// (`http://music.163.com/#/playlist?id=123`), which is dropped before
/// parsing.
pub fn parse_playlist_id(s: &str) -> Result<u64, String> {
    if let Ok(id) = s.parse::<u64>() {
        return Ok(id);
    }
    let url = reqwest::Url::parse(&s.replace("/#", ""))
        .map_err(|_| format!("Invalid url: '{s}' is neither a playlist id nor a url"))?;
    let value = url
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| format!("Invalid url: '{s}' does not contain query key 'id'"))?;
    value
        .parse::<u64>()
        .map_err(|_| format!("Invalid url: '{s}' contains an empty or noninteger id"))
}
