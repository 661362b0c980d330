use thiserror::Error;

#[derive(Error, Debug)]
pub enum NeteaseError {
    #[error("API response error for {endpoint} (code: {code})")]
    ApiResponse { endpoint: String, code: i64 },

    #[error("HTTP error {status} from {endpoint}")]
    HttpStatus { status: u16, endpoint: String },

    #[error("Unexpected response shape from {endpoint}: missing `{field}`")]
    MissingField {
        endpoint: String,
        field: &'static str,
    },

    #[error("Playlist {playlist} declares {declared} tracks, more than the {limit} the service returns")]
    TooManyTracks {
        playlist: u64,
        declared: usize,
        limit: usize,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl NeteaseError {
    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            NeteaseError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            NeteaseError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            NeteaseError::ApiResponse { .. }
            | NeteaseError::MissingField { .. }
            | NeteaseError::TooManyTracks { .. }
            | NeteaseError::Json(_) => false,
        }
    }
}
