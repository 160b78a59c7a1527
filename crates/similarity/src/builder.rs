//! Batch index build over a corpus.

use crate::error::Result;
use crate::index::MovieIndex;
use data_loader::MovieRecord;
use embedder::TextEmbedder;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Embeds every record's `embedding_text` (normalized) and indexes the
/// vectors in corpus order.
pub struct IndexBuilder {
    embedder: Arc<dyn TextEmbedder>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn TextEmbedder>) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Configure texts per embedding call (default: 64)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build the index. Deterministic for a given corpus and embedder.
    #[instrument(skip(self, records), fields(movies = records.len()))]
    pub fn build(&self, records: &[MovieRecord]) -> Result<MovieIndex> {
        info!("Building similarity index over {} movies", records.len());

        let mut vectors = Vec::with_capacity(records.len());
        for (batch_no, batch) in records.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(MovieRecord::embedding_text).collect();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            vectors.extend(self.embedder.embed(&refs, true)?);
            debug!("Embedded batch {} ({} / {})", batch_no, vectors.len(), records.len());
        }

        let ids = records.iter().map(|r| r.id).collect();
        let index = MovieIndex::from_rows(self.embedder.dimension(), ids, &vectors)?;
        info!("Similarity index built: {} rows x {} dims", index.len(), index.dim());
        Ok(index)
    }
}
