//! # Similarity Crate
//!
//! Nearest-neighbor search over movie embeddings.
//!
//! ## Components
//!
//! - **flat**: exact inner-product index, scored in parallel with rayon
//! - **index**: `MovieIndex`, the flat index plus the corpus ids it was built from
//! - **builder**: embeds a corpus in batches and builds a `MovieIndex`
//! - **persist**: versioned single-file artifact; loading a missing file is `None`
//! - **state**: immutable corpus + index snapshots and the rebuild state machine
//!
//! ## Example Usage
//!
//! ```ignore
//! use similarity::{IndexBuilder, SearchSnapshot, SearchState};
//! use std::sync::Arc;
//!
//! let index = IndexBuilder::new(embedder.clone()).build(corpus.records())?;
//! similarity::save_index(&index, &cache_dir.join("index.bin"))?;
//!
//! let state = Arc::new(SearchState::new());
//! state.publish(SearchSnapshot::new(Arc::new(corpus), index)?);
//!
//! let query = embedder.embed_one("heist thriller in Los Angeles", true)?;
//! for (movie, score) in state.ready()?.search(&query, 10)? {
//!     println!("{:.3} {}", score, movie.title);
//! }
//! ```

pub mod builder;
pub mod error;
pub mod flat;
pub mod index;
pub mod persist;
pub mod state;

// Re-export commonly used types
pub use builder::{IndexBuilder, DEFAULT_BATCH_SIZE};
pub use error::{IndexError, Result};
pub use flat::FlatIpIndex;
pub use index::{MovieIndex, SearchHit};
pub use persist::{load_index, save_index, INDEX_FORMAT_VERSION};
pub use state::{IndexStatus, RebuildGuard, SearchSnapshot, SearchState};
