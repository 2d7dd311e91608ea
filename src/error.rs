//! Error handling and custom error types
//!
//! Provides unified error handling across the service using thiserror.

use crate::ai::CapabilityKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to extract themes from goals: {0}")]
    ExtractionFailed(String),

    #[error("Failed to generate image: {0}")]
    GenerationFailed(String),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Unsupported {kind} provider: {provider}")]
    UnsupportedProvider {
        kind: CapabilityKind,
        provider: String,
    },

    #[error("Failed to fetch image: {0}")]
    FetchFailed(String),

    #[error("Failed to upload image: {0}")]
    UploadFailed(String),

    #[error("Document store error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl Error {
    /// Whether the caller supplied bad input, as opposed to an upstream or
    /// internal failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
