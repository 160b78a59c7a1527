//! # Embedder Crate
//!
//! Sentence embeddings for movie text.
//!
//! Two backends implement [`TextEmbedder`]:
//!
//! - [`MiniLmEmbedder`]: all-MiniLM-L6-v2 on candle, mean pooled over the
//!   attention mask. 384 dimensions. This is what the rating model and the
//!   similarity index were fit against.
//! - [`HashingEmbedder`]: deterministic feature hashing with no weights to
//!   download, for offline development and tests.
//!
//! Normalization is chosen per call. Similarity search wants unit vectors
//! (so inner product is cosine); the PCA feature path was fit on raw
//! embeddings and must not be normalized.

pub mod error;
pub mod hashing;
pub mod minilm;

pub use error::{EmbedError, Result};
pub use hashing::HashingEmbedder;
pub use minilm::{MiniLmEmbedder, DEFAULT_MODEL_ID, MINILM_DIMENSION};

/// Something that can turn text into dense vectors.
///
/// Implementations must be deterministic: the same text and flag always
/// produce the same vector.
pub trait TextEmbedder: Send + Sync {
    /// Width of every vector this embedder returns
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one row per input, in input order.
    fn embed(&self, texts: &[&str], normalize: bool) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    fn embed_one(&self, text: &str, normalize: bool) -> Result<Vec<f32>> {
        self.embed(&[text], normalize)?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Inference("embedder returned no rows".to_string()))
    }
}

/// Scale `vector` to unit L2 norm in place. All-zero vectors are left alone.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn test_embed_one_through_trait_object() {
        let embedder: Box<dyn TextEmbedder> = Box::new(HashingEmbedder::new(16));
        let v = embedder.embed_one("space cowboys", true).unwrap();
        assert_eq!(v.len(), 16);
    }
}
