//! HTTP surface.
//!
//! Query parameters arrive as raw strings and are validated here and in the
//! feature encoder, so malformed input becomes a 400 with a `detail` message
//! rather than an extractor rejection.

use crate::context::AppContext;
use crate::error::{Result, ServiceError};
use crate::prediction::{PredictionRequest, PredictionService};
use crate::search::{SearchService, SimilarFilm};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use features::MovieAttributes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const MODEL_VERSION: &str = "v5";
const OVERVIEW_ECHO_CHARS: usize = 100;

#[derive(Clone)]
pub struct AppState {
    prediction: PredictionService,
    search: SearchService,
}

impl AppState {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            prediction: PredictionService::new(Arc::clone(&ctx)),
            search: SearchService::new(ctx),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", get(predict))
        .route("/similar-film", get(similar_film))
        .route("/rebuild-index", post(rebuild_index))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online",
        model_version: MODEL_VERSION,
    })
}

// =============================================================================
// /predict
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictParams {
    start_year: Option<String>,
    runtime_minutes: Option<String>,
    overview: Option<String>,
    is_adult: Option<String>,
    genres: Option<String>,
    budget: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictInput {
    start_year: i32,
    runtime_minutes: i32,
    overview: String,
    is_adult: u8,
    genres: String,
    budget: Option<f64>,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    predicted_rating: f64,
    input: PredictInput,
}

fn parse_budget(raw: Option<&str>) -> Result<Option<f64>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .ok()
            .filter(|b| b.is_finite())
            .map(Some)
            .ok_or_else(|| ServiceError::InvalidInput(format!("budget must be a number, got '{}'", s))),
    }
}

/// First 100 characters, with an ellipsis if anything was cut
fn echo_overview(overview: &str) -> String {
    if overview.chars().count() > OVERVIEW_ECHO_CHARS {
        let head: String = overview.chars().take(OVERVIEW_ECHO_CHARS).collect();
        format!("{}...", head)
    } else {
        overview.to_string()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

async fn predict(
    State(state): State<AppState>,
    Query(params): Query<PredictParams>,
) -> Result<Json<PredictResponse>> {
    let overview = params.overview.unwrap_or_default();
    if overview.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "overview is required and cannot be empty".to_string(),
        ));
    }

    let attributes = MovieAttributes::from_raw(
        params.start_year.as_deref(),
        params.runtime_minutes.as_deref(),
        params.is_adult.as_deref(),
        params.genres.as_deref(),
    )?;
    let budget = parse_budget(params.budget.as_deref())?;

    let request = PredictionRequest {
        attributes,
        overview,
        budget,
    };
    let rating = state.prediction.predict(&request).await?;
    info!(
        "Predicted {:.2} for a {} film ({} min)",
        rating, request.attributes.start_year, request.attributes.runtime_minutes
    );

    let PredictionRequest {
        attributes,
        overview,
        budget,
    } = request;
    Ok(Json(PredictResponse {
        predicted_rating: round2(rating),
        input: PredictInput {
            start_year: attributes.start_year,
            runtime_minutes: attributes.runtime_minutes,
            overview: echo_overview(&overview),
            is_adult: attributes.is_adult,
            genres: attributes.genres,
            budget,
        },
    }))
}

// =============================================================================
// /similar-film and /rebuild-index
// =============================================================================

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: Option<String>,
    k: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    query: String,
    count: usize,
    results: Vec<SimilarFilm>,
}

fn parse_k(raw: Option<&str>) -> Result<Option<usize>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ServiceError::InvalidInput(format!("k must be a positive integer, got '{}'", s))),
    }
}

async fn similar_film(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let query = params.query.unwrap_or_default();
    let k = parse_k(params.k.as_deref())?;

    let results = state.search.search(&query, k).await?;
    info!("Similar-film search returned {} results", results.len());
    Ok(Json(SearchResponse {
        count: results.len(),
        query,
        results,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct RebuildParams {
    #[serde(default)]
    force_reload: bool,
}

#[derive(Debug, Serialize)]
struct RebuildResponse {
    status: &'static str,
    message: &'static str,
    index_size: usize,
}

async fn rebuild_index(
    State(state): State<AppState>,
    Query(params): Query<RebuildParams>,
) -> Result<Json<RebuildResponse>> {
    info!("Rebuilding search index (force_reload={})", params.force_reload);
    let index_size = state.search.rebuild(params.force_reload).await?;
    Ok(Json(RebuildResponse {
        status: "success",
        message: "Search index built successfully",
        index_size,
    }))
}
