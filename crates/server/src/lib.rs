//! Floportop service layer.
//!
//! Wires the library crates into two services and an HTTP surface:
//! - `PredictionService`: request → feature vector → clipped rating
//! - `SearchService`: free-text similar-film search, index load and rebuild
//! - `http::router`: the axum routes over both
//!
//! Shared artifacts live on `AppContext` and load lazily.

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod prediction;
pub mod search;

pub use config::{EmbedderKind, ServiceConfig};
pub use context::{AppContext, AppContextBuilder, Lazy};
pub use error::{ErrorBody, Result, ServiceError};
pub use http::{router, AppState, MODEL_VERSION};
pub use prediction::{
    clip_rating, LinearRegressor, PredictionRequest, PredictionService, Regressor, RemoteRegressor,
};
pub use search::{build_corpus, build_index, SearchService, SimilarFilm};
