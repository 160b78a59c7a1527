//! Rating prediction.
//!
//! The regressor is an opaque artifact behind the `Regressor` trait. Two
//! implementations ship: a linear model exported to JSON, loaded in process,
//! and a remote model server reached over gRPC for models that can only be
//! run where they were trained.

use crate::context::AppContext;
use crate::error::{Result, ServiceError};
use features::{FeatureVector, MovieAttributes, FEATURE_COUNT, FEATURE_NAMES};
use model_client::RatingModelClient;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 10.0;

/// Something that can score feature vectors.
///
/// Returns raw, unclipped model outputs, one per row.
#[tonic::async_trait]
pub trait Regressor: Send + Sync {
    async fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>>;
}

/// Clamp a raw model output into the rating range.
///
/// Out-of-range values are clipped; a non-finite value means the model is
/// broken and is reported instead.
pub fn clip_rating(raw: f64) -> Result<f64> {
    if !raw.is_finite() {
        return Err(ServiceError::Internal(format!(
            "rating model produced a non-finite output ({})",
            raw
        )));
    }
    Ok(raw.clamp(MIN_RATING, MAX_RATING))
}

// =============================================================================
// Linear model artifact
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct LinearArtifact {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

/// `intercept + coefficients · features`, from a JSON artifact whose
/// feature names must match the schema exactly.
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearRegressor {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        if coefficients.len() != FEATURE_COUNT {
            return Err(ServiceError::ModelUnavailable(format!(
                "linear model has {} coefficients, schema has {} features",
                coefficients.len(),
                FEATURE_COUNT
            )));
        }
        Ok(Self {
            coefficients,
            intercept,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let artifact: LinearArtifact = serde_json::from_str(json)
            .map_err(|e| ServiceError::ModelUnavailable(format!("rating model: {}", e)))?;

        if artifact.feature_names != *FEATURE_NAMES {
            let first_diff = artifact
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .position(|(a, b)| a != b)
                .unwrap_or(artifact.feature_names.len().min(FEATURE_COUNT));
            return Err(ServiceError::ModelUnavailable(format!(
                "rating model feature names do not match the schema (first difference at column {})",
                first_diff
            )));
        }
        Self::new(artifact.coefficients, artifact.intercept)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| ServiceError::ModelUnavailable(format!("rating model {:?}: {}", path, e)))?;
        let model = Self::from_json_str(&json)?;
        info!("Loaded linear rating model from {:?}", path);
        Ok(model)
    }

    fn score(&self, row: &FeatureVector) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row.as_slice())
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

#[tonic::async_trait]
impl Regressor for LinearRegressor {
    async fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        Ok(rows.iter().map(|row| self.score(row)).collect())
    }
}

// =============================================================================
// Remote model server
// =============================================================================

pub struct RemoteRegressor {
    client: RatingModelClient,
}

impl RemoteRegressor {
    pub fn new(client: RatingModelClient) -> Self {
        Self { client }
    }
}

#[tonic::async_trait]
impl Regressor for RemoteRegressor {
    async fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        let payload = rows.iter().map(|r| r.as_slice().to_vec()).collect();
        Ok(self.client.predict(&FEATURE_NAMES, payload).await?)
    }
}

// =============================================================================
// PredictionService
// =============================================================================

/// A validated prediction request
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub attributes: MovieAttributes,
    pub overview: String,
    pub budget: Option<f64>,
}

#[derive(Clone)]
pub struct PredictionService {
    ctx: Arc<AppContext>,
}

impl PredictionService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Encode a request into the model's feature vector.
    ///
    /// Runs on a blocking thread: the first call may load the embedding
    /// model, and every call runs it.
    pub async fn encode_features(&self, request: &PredictionRequest) -> Result<FeatureVector> {
        if request.overview.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "overview is required and cannot be empty".to_string(),
            ));
        }

        let ctx = Arc::clone(&self.ctx);
        let request = request.clone();
        tokio::task::spawn_blocking(move || -> Result<FeatureVector> {
            let encoder = ctx.encoder()?;
            Ok(encoder.encode(&request.attributes, &request.overview, request.budget)?)
        })
        .await?
    }

    /// Predicted rating in `[1.0, 10.0]`
    #[instrument(skip(self, request), fields(start_year = request.attributes.start_year))]
    pub async fn predict(&self, request: &PredictionRequest) -> Result<f64> {
        let features = self.encode_features(request).await?;

        let ctx = Arc::clone(&self.ctx);
        let regressor = tokio::task::spawn_blocking(move || ctx.regressor()).await??;
        let raw = regressor
            .predict(std::slice::from_ref(&features))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Internal("rating model returned no output".to_string()))?;

        let rating = clip_rating(raw)?;
        debug!("Raw prediction {:.4}, clipped {:.4}", raw, rating);
        Ok(rating)
    }
}
