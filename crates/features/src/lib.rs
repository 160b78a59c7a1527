//! Feature encoding for the rating model.
//!
//! This crate provides:
//! - The 49-column feature schema and its training-time constants
//! - Genre and budget features, with per-decade budget imputation
//! - The `Projector` trait and the fitted PCA transformer behind it
//! - `FeatureEncoder`, which assembles a `FeatureVector` from a request
//!
//! ## Example Usage
//! ```ignore
//! use features::{BudgetImputationTable, FeatureEncoder, MovieAttributes, PcaProjection};
//!
//! let encoder = FeatureEncoder::new(
//!     embedder,
//!     Arc::new(PcaProjection::load(&models.join("pca_transformer.json"))?),
//!     Arc::new(BudgetImputationTable::load(&models.join("budget_medians.json"))?),
//! )?;
//!
//! let attrs = MovieAttributes::new(2010, 148, 0, "Action,Sci-Fi")?;
//! let features = encoder.encode(&attrs, "A thief who steals secrets through dreams.", None)?;
//! assert_eq!(features.get("Genre_Sci-Fi"), Some(1.0));
//! ```

pub mod budget;
pub mod encoder;
pub mod error;
pub mod genres;
pub mod pca;
pub mod schema;
pub mod traits;

// Re-export main types
pub use budget::{BudgetImputationTable, FALLBACK_LOG_BUDGET};
pub use encoder::{FeatureEncoder, MovieAttributes, DEFAULT_GENRES};
pub use error::{FeatureError, Result};
pub use pca::PcaProjection;
pub use schema::{FeatureVector, CURRENT_YEAR, FEATURE_COUNT, FEATURE_NAMES, N_PCA, RUNTIME_CAP, VALID_GENRES};
pub use traits::Projector;
