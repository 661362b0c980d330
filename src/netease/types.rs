use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Catalog id of a track. Never reused by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Binary resource id (`dfsId`) of one encoding of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Deserialize a field that may be absent, `null`, or a value.
///
/// Combined with `#[serde(default)]`: absent -> `None`, `null` -> `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// One encoding/bitrate option of a track (`hMusic`, `mMusic`, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityVariant {
    #[serde(
        rename = "dfsId",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub dfs_id: Option<Option<ResourceId>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QualityVariant {
    /// The resource id, if present and not null.
    pub fn resource_id(&self) -> Option<ResourceId> {
        self.dfs_id.flatten()
    }
}

/// A remote track record.
///
/// Quality fields keep the absent/null distinction of the wire format so the
/// record round-trips through `meta.json` unchanged. Fields this crate does
/// not interpret are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,

    #[serde(default)]
    pub name: String,

    #[serde(
        rename = "hMusic",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub h_music: Option<Option<QualityVariant>>,

    #[serde(
        rename = "mMusic",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub m_music: Option<Option<QualityVariant>>,

    #[serde(
        rename = "lMusic",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub l_music: Option<Option<QualityVariant>>,

    #[serde(
        rename = "bMusic",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub b_music: Option<Option<QualityVariant>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Track {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: TrackId(id),
            name: name.into(),
            h_music: None,
            m_music: None,
            l_music: None,
            b_music: None,
            extra: Map::new(),
        }
    }

    /// Public web page of the track, used in progress lines.
    pub fn url(&self) -> String {
        format!("http://music.163.com/#/song?id={}", self.id)
    }
}

/// A playlist as returned by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub id: u64,
    pub name: String,
    pub tracks: Vec<Track>,
    /// Count declared by the service; may disagree with `tracks.len()`.
    pub track_count: usize,
}
