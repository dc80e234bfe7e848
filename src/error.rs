//! Error types for thumbload_core.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single load, delivered inside a completion.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Image not found: {path}")]
    NotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Unsupported image format: {0}")]
    Unsupported(String),

    #[error("No embedded thumbnail available")]
    EmbeddedThumbnailUnavailable,

    #[error("Decoder panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => DecodeError::Io(e),
            image::ImageError::Unsupported(e) => DecodeError::Unsupported(e.to_string()),
            other => DecodeError::Decode(other.to_string()),
        }
    }
}

/// Result type alias for decode collaborators.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors raised while configuring or starting the loader.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Invalid loader configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Result type alias for loader setup.
pub type LoaderResult<T> = Result<T, LoaderError>;
