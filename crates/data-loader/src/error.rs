//! Error types for the data-loader crate.
//!
//! Corpus builds fail in two ways: a source file cannot be read at all, or
//! a join key in an enrichment file is garbage. Everything softer than that
//! (a malformed literal list, a short CSV row) is logged and the row is
//! dropped or left empty, so those cases never surface here.

use thiserror::Error;

/// Errors that can occur while building, caching or reloading the corpus
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading or writing a file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The CSV reader could not make sense of the file as a whole
    #[error("CSV error in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    /// A required join key could not be parsed
    ///
    /// This aborts the build: a join against a half-parsed key column would
    /// silently attach the wrong credits or keywords to a movie.
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// The on-disk corpus cache could not be encoded or decoded
    #[error("Corpus cache error at {path}: {reason}")]
    Cache { path: String, reason: String },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
