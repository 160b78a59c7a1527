//! Error types for the embedder crate.

use thiserror::Error;

/// Errors that can occur while loading a model or embedding text
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Weights, tokenizer or config could not be found, fetched or parsed
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    /// Forward pass or tensor conversion failed
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl From<candle_core::Error> for EmbedError {
    fn from(err: candle_core::Error) -> Self {
        EmbedError::Inference(err.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, EmbedError>;
