use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde_json::{json, Value};

use super::error::RegistryError;
use super::TrackRegistry;
use crate::netease::{Track, TrackId};

const CLASS: &str = "Track";

/// Server-side cap on `limit` for a single query.
const QUERY_LIMIT: usize = 1000;

/// Bookkeeping fields LeanCloud adds to every stored object.
const SERVER_FIELDS: [&str; 4] = ["objectId", "createdAt", "updatedAt", "ACL"];

/// `TrackRegistry` over the LeanCloud REST storage API.
pub struct LeanCloudRegistry {
    client: Client,
    class_url: String,
}

impl std::fmt::Debug for LeanCloudRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeanCloudRegistry")
            .field("class_url", &self.class_url)
            .field("app_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl LeanCloudRegistry {
    pub fn new(server_url: &str, app_id: &str, app_key: &str) -> Result<Self, RegistryError> {
        let mut headers = HeaderMap::new();
        let header = |v: &str| {
            HeaderValue::from_str(v)
                .map_err(|_| RegistryError::Response("credential contains invalid characters".into()))
        };
        headers.insert(HeaderName::from_static("x-lc-id"), header(app_id)?);
        headers.insert(HeaderName::from_static("x-lc-key"), header(app_key)?);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            class_url: class_url(server_url),
        })
    }

    async fn query(&self, filter: Value, limit: usize) -> Result<Vec<Value>, RegistryError> {
        let response = self
            .client
            .get(&self.class_url)
            .query(&[
                ("where", filter.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        let mut body: Value = checked(response).await?.json().await?;
        match body.get_mut("results").map(Value::take) {
            Some(Value::Array(results)) => Ok(results),
            _ => Err(RegistryError::Response("missing `results`".to_string())),
        }
    }
}

fn class_url(server_url: &str) -> String {
    format!("{}/1.1/classes/{}", server_url.trim_end_matches('/'), CLASS)
}

async fn checked(response: Response) -> Result<Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    Err(RegistryError::HttpStatus {
        status: status.as_u16(),
        message,
    })
}

/// Turn a stored object back into a track record.
fn stored_to_track(mut object: Value) -> Result<Track, RegistryError> {
    if let Some(map) = object.as_object_mut() {
        for field in SERVER_FIELDS {
            map.remove(field);
        }
    }
    Ok(serde_json::from_value(object)?)
}

#[async_trait]
impl TrackRegistry for LeanCloudRegistry {
    async fn exists(&self, id: TrackId) -> Result<bool, RegistryError> {
        let found = self.query(json!({ "id": id }), 1).await?;
        Ok(!found.is_empty())
    }

    async fn insert(&self, track: &Track) -> Result<(), RegistryError> {
        let response = self.client.post(&self.class_url).json(track).send().await?;
        checked(response).await?;
        tracing::debug!(id = %track.id, "Registered track");
        Ok(())
    }

    async fn fetch_in(&self, ids: &[TrackId]) -> Result<Vec<Track>, RegistryError> {
        let mut tracks = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(QUERY_LIMIT) {
            let found = self
                .query(json!({ "id": { "$in": chunk } }), QUERY_LIMIT)
                .await?;
            for object in found {
                tracks.push(stored_to_track(object)?);
            }
        }
        Ok(tracks)
    }
}
