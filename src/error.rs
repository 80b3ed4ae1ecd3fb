//! Common error type and result alias.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Non-success answer from the generation API. The message carries the
    /// status code and body so rate-limit markers stay visible.
    #[error("Generation API error: {0}")]
    Api(String),

    /// The response held no image payload (safety rejection or API fault).
    #[error("AI did not generate an image. This might be due to a safety policy violation or an API issue.")]
    NoImage,

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::Archive(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
