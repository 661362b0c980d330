use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("LeanCloud error {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Unexpected LeanCloud response: {0}")]
    Response(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
