//! # Data Loader Crate
//!
//! Builds the movie corpus that the similarity index is computed over.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (MovieRecord, Corpus)
//! - **parser**: Parse the four raw CSV files into rows
//! - **pylit**: Parse the Python-literal list columns inside those files
//! - **corpus**: Left-join the parsed files into a `Corpus`
//! - **cache**: Bincode cache of the joined corpus
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{CorpusCache, CorpusSources};
//! use std::path::Path;
//!
//! let sources = CorpusSources::in_dir(Path::new("data"));
//! let corpus = CorpusCache::new("cache/movies.bin").load_or_build(&sources, false)?;
//!
//! let toy_story = corpus.get(862).unwrap();
//! println!("{}", toy_story.embedding_text());
//! ```

pub mod cache;
pub mod corpus;
pub mod error;
pub mod parser;
pub mod pylit;
pub mod types;

pub use cache::{CorpusCache, CACHE_FORMAT_VERSION};
pub use corpus::CorpusSources;
pub use error::{DataLoadError, Result};
pub use types::{Corpus, MovieId, MovieRecord, CAST_TOP_N};
