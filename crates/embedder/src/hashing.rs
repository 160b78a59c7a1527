//! Feature-hashing embedder.
//!
//! Each lowercase alphanumeric token is hashed to a bucket and a sign, and
//! the signed counts form the vector. Texts that share words land close
//! together, which is enough to exercise search and feature plumbing end to
//! end without model weights.

use crate::error::Result;
use crate::{l2_normalize, TextEmbedder};

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// FNV-1a, stable across platforms and compiler versions
    fn hash_token(token: &str) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = Self::hash_token(token);
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(crate::MINILM_DIMENSION)
    }
}

impl TextEmbedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[&str], normalize: bool) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = self.embed_text(text);
                if normalize {
                    l2_normalize(&mut vector);
                }
                vector
            })
            .collect())
    }
}
