//! Error types for feature encoding.

use embedder::EmbedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    /// A request field is missing, malformed or out of range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A projection or budget artifact is missing, unreadable, or does not
    /// fit the feature schema
    #[error("Model artifact unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// Projection input did not have the width the projector was fit on
    #[error("Projection failed: {0}")]
    Projection(String),
}

pub type Result<T> = std::result::Result<T, FeatureError>;
