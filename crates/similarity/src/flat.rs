//! Exact inner-product index.
//!
//! Vectors are stored row-major in one contiguous buffer and every query
//! scores every row. With unit vectors the inner product is the cosine
//! similarity, so higher is closer.

use crate::error::{IndexError, Result};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Rows scored per rayon task
const SCORE_CHUNK_ROWS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Descending score, then ascending row position
fn rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

impl FlatIpIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    /// Rebuild from a flat row-major buffer
    pub fn from_raw(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(IndexError::DimensionMismatch {
                expected: dim,
                got: data.len(),
            });
        }
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major vector buffer
    pub fn as_raw(&self) -> &[f32] {
        &self.data
    }

    /// Append rows. Nothing is added unless every row has the index width.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                got: bad.len(),
            });
        }
        self.data.reserve(vectors.len() * self.dim);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Top `k` rows as `(position, score)`.
    ///
    /// `k` past the end returns every row; `k = 0` returns nothing.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                got: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .par_chunks(self.dim * SCORE_CHUNK_ROWS)
            .enumerate()
            .flat_map_iter(|(chunk, rows)| {
                let base = chunk * SCORE_CHUNK_ROWS;
                rows.chunks_exact(self.dim)
                    .enumerate()
                    .map(move |(i, row)| (base + i, dot(query, row)))
            })
            .collect();

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank);
            scored.truncate(k);
        }
        scored.sort_unstable_by(rank);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> FlatIpIndex {
        let mut index = FlatIpIndex::new(2);
        index
            .add(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8], vec![1.0, 0.0]])
            .unwrap();
        index
    }

    #[test]
    fn test_ordering_and_ties() {
        let hits = index().search(&[1.0, 0.0], 4).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.0).collect();
        // rows 0 and 3 tie at 1.0; lower position first
        assert_eq!(positions, vec![0, 3, 2, 1]);
        assert!((hits[2].1 - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_k_bounds() {
        let idx = index();
        assert!(idx.search(&[1.0, 0.0], 0).unwrap().is_empty());
        assert_eq!(idx.search(&[1.0, 0.0], 100).unwrap().len(), 4);
        let top1 = idx.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(top1, vec![(1, 1.0)]);
    }

    #[test]
    fn test_partial_selection_matches_full_sort() {
        let mut idx = FlatIpIndex::new(1);
        let rows: Vec<Vec<f32>> = (0..3000).map(|i| vec![((i * 37) % 101) as f32]).collect();
        idx.add(&rows).unwrap();

        let full = idx.search(&[1.0], 3000).unwrap();
        let top = idx.search(&[1.0], 25).unwrap();
        assert_eq!(&full[..25], top.as_slice());
    }

    #[test]
    fn test_dimension_checks() {
        let mut idx = index();
        assert!(matches!(
            idx.search(&[1.0, 0.0, 0.0], 1),
            Err(IndexError::DimensionMismatch { expected: 2, got: 3 })
        ));
        assert!(idx.add(&[vec![1.0, 0.0], vec![1.0]]).is_err());
        assert_eq!(idx.len(), 4);
        assert!(FlatIpIndex::from_raw(3, vec![0.0; 4]).is_err());
    }

    #[test]
    fn test_empty_index() {
        let idx = FlatIpIndex::new(8);
        assert!(idx.is_empty());
        assert!(idx.search(&[0.0; 8], 5).unwrap().is_empty());
    }
}
