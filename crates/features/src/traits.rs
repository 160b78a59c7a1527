//! Core traits for the feature pipeline.
//!
//! The PCA transformer is consumed as an opaque artifact: anything that can
//! map an embedding to `N_PCA` numbers can sit behind the encoder.

use crate::error::Result;

/// Linear (or otherwise) reduction of an embedding.
///
/// `Send + Sync` so one loaded projector can be shared across request tasks.
pub trait Projector: Send + Sync {
    /// Width of the vectors this projector accepts
    fn input_dim(&self) -> usize;

    /// Width of the vectors it returns
    fn output_dim(&self) -> usize;

    /// Project one vector. Fails with `Projection` if `input` has the wrong
    /// width.
    fn project(&self, input: &[f32]) -> Result<Vec<f64>>;
}
