//! Error types for the similarity crate.

use data_loader::MovieId;
use embedder::EmbedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Dimension mismatch: index has {expected} dims, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The id list and the vectors disagree on how many rows there are
    #[error("Index has {ids} ids but {rows} vectors")]
    RowCountMismatch { ids: usize, rows: usize },

    /// An index was paired with a corpus it was not built from
    #[error("Index does not match corpus: {0}")]
    CorpusMismatch(String),

    #[error("Search returned unknown movie id {0}")]
    UnknownMovie(MovieId),

    #[error("Index artifact {path} is unreadable: {reason}")]
    Artifact { path: String, reason: String },

    #[error("Index artifact version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// Search was requested before any index was published
    #[error("Similarity index has not been built")]
    NotBuilt,

    #[error("An index rebuild is already running")]
    RebuildInProgress,
}

pub type Result<T> = std::result::Result<T, IndexError>;
