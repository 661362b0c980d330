use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::error::NeteaseError;
use super::types::{Playlist, Track, TrackId};
use super::MusicApi;
use crate::retry::{self, RetryAction, RetryConfig};

const DEFAULT_BASE_URL: &str = "http://music.163.com";

/// The playlist endpoint never returns more tracks than this.
pub const MAX_PLAYLIST_TRACKS: usize = 1000;

/// Ids per song-detail request; longer query strings get rejected.
const DETAIL_CHUNK_SIZE: usize = 400;

pub struct NeteaseClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for NeteaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeteaseClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl NeteaseClient {
    pub fn new(retry: RetryConfig) -> Result<Self, NeteaseError> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("http://music.163.com/"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("fm163-rs/", env!("CARGO_PKG_VERSION"))),
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            retry,
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, NeteaseError> {
        let url = format!("{}{}", self.base_url, path);
        retry::retry_with_backoff(
            &self.retry,
            |e: &NeteaseError| {
                if e.is_retryable() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            || async {
                debug!(url = %url, "GET");
                let response = self.client.get(&url).query(query).send().await?;
                if !response.status().is_success() {
                    return Err(NeteaseError::HttpStatus {
                        status: response.status().as_u16(),
                        endpoint: path.to_string(),
                    });
                }
                Ok(response.json::<Value>().await?)
            },
        )
        .await
    }
}

#[async_trait]
impl MusicApi for NeteaseClient {
    async fn playlist_detail(&self, id: u64) -> Result<Playlist, NeteaseError> {
        let body = self
            .get_json("/api/playlist/detail", &[("id", id.to_string())])
            .await?;
        parse_playlist(id, body)
    }

    async fn songs_detail(&self, ids: &[TrackId]) -> Result<Vec<Track>, NeteaseError> {
        let mut songs = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(DETAIL_CHUNK_SIZE) {
            let list = serde_json::to_string(chunk)?;
            let body = self
                .get_json("/api/song/detail", &[("ids", list)])
                .await?;
            songs.extend(parse_songs(body)?);
        }
        Ok(songs)
    }
}

fn check_code(body: &Value, endpoint: &str) -> Result<(), NeteaseError> {
    match body.get("code").and_then(Value::as_i64) {
        Some(200) | None => Ok(()),
        Some(code) => Err(NeteaseError::ApiResponse {
            endpoint: endpoint.to_string(),
            code,
        }),
    }
}

/// Parse a `/api/playlist/detail` response body.
pub(crate) fn parse_playlist(id: u64, mut body: Value) -> Result<Playlist, NeteaseError> {
    const ENDPOINT: &str = "playlist/detail";
    check_code(&body, ENDPOINT)?;

    // Older deployments answer under `result`, newer ones under `playlist`.
    let key = if body.get("result").is_some_and(Value::is_object) {
        "result"
    } else {
        "playlist"
    };
    let mut result = body
        .get_mut(key)
        .map(Value::take)
        .ok_or(NeteaseError::MissingField {
            endpoint: ENDPOINT.to_string(),
            field: "result",
        })?;

    let tracks_value = result
        .get_mut("tracks")
        .map(Value::take)
        .ok_or(NeteaseError::MissingField {
            endpoint: ENDPOINT.to_string(),
            field: "tracks",
        })?;
    let tracks: Vec<Track> = serde_json::from_value(tracks_value)?;

    let track_count = result
        .get("trackCount")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(tracks.len());

    if track_count > MAX_PLAYLIST_TRACKS {
        return Err(NeteaseError::TooManyTracks {
            playlist: id,
            declared: track_count,
            limit: MAX_PLAYLIST_TRACKS,
        });
    }

    let name = result
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Playlist {
        id,
        name,
        tracks,
        track_count,
    })
}

/// Parse a `/api/song/detail` response body.
pub(crate) fn parse_songs(mut body: Value) -> Result<Vec<Track>, NeteaseError> {
    const ENDPOINT: &str = "song/detail";
    check_code(&body, ENDPOINT)?;
    let songs = body
        .get_mut("songs")
        .map(Value::take)
        .ok_or(NeteaseError::MissingField {
            endpoint: ENDPOINT.to_string(),
            field: "songs",
        })?;
    Ok(serde_json::from_value(songs)?)
}
