//! A flat index paired with the corpus ids it was built from.
//!
//! Row positions alone are not an identity: they only mean something against
//! the exact corpus order used at build time. `MovieIndex` keeps that id
//! order next to the vectors, and refuses to be paired with a corpus whose
//! order differs.

use crate::error::{IndexError, Result};
use crate::flat::FlatIpIndex;
use data_loader::{Corpus, MovieId};

/// One search result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub movie_id: MovieId,
    /// Row position in the index
    pub position: usize,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieIndex {
    ids: Vec<MovieId>,
    flat: FlatIpIndex,
}

impl MovieIndex {
    pub fn new(ids: Vec<MovieId>, flat: FlatIpIndex) -> Result<Self> {
        if ids.len() != flat.len() {
            return Err(IndexError::RowCountMismatch {
                ids: ids.len(),
                rows: flat.len(),
            });
        }
        Ok(Self { ids, flat })
    }

    /// Build from `(id, vector)` rows in order
    pub fn from_rows(dim: usize, ids: Vec<MovieId>, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut flat = FlatIpIndex::new(dim);
        flat.add(vectors)?;
        Self::new(ids, flat)
    }

    pub fn ids(&self) -> &[MovieId] {
        &self.ids
    }

    pub fn flat(&self) -> &FlatIpIndex {
        &self.flat
    }

    pub fn dim(&self) -> usize {
        self.flat.dim()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        Ok(self
            .flat
            .search(query, k)?
            .into_iter()
            .map(|(position, score)| SearchHit {
                movie_id: self.ids[position],
                position,
                score,
            })
            .collect())
    }

    /// Check that `corpus` has exactly the ids this index was built from, in
    /// the same order.
    pub fn verify_against(&self, corpus: &Corpus) -> Result<()> {
        if corpus.len() != self.ids.len() {
            return Err(IndexError::CorpusMismatch(format!(
                "index has {} rows, corpus has {} movies",
                self.ids.len(),
                corpus.len()
            )));
        }
        let first_diff = self
            .ids
            .iter()
            .zip(corpus.records())
            .position(|(id, record)| *id != record.id);
        match first_diff {
            None => Ok(()),
            Some(pos) => Err(IndexError::CorpusMismatch(format!(
                "row {} is movie {} in the index but {} in the corpus",
                pos,
                self.ids[pos],
                corpus.records()[pos].id
            ))),
        }
    }
}
