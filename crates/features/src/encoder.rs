//! Feature encoding: movie attributes + overview + budget -> `FeatureVector`.

use crate::budget::{budget_features, BudgetImputationTable};
use crate::error::{FeatureError, Result};
use crate::genres::{genre_count, genre_flags};
use crate::schema::*;
use crate::traits::Projector;
use embedder::TextEmbedder;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Genres assumed when a request leaves them out
pub const DEFAULT_GENRES: &str = "Drama";

/// Structured movie attributes, already validated
#[derive(Debug, Clone, PartialEq)]
pub struct MovieAttributes {
    pub start_year: i32,
    pub runtime_minutes: i32,
    /// 0 or 1
    pub is_adult: u8,
    /// Comma-separated genre names
    pub genres: String,
}

fn parse_required_int(field: &str, raw: Option<&str>) -> Result<i32> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FeatureError::InvalidInput(format!("{} is required", field)))?;
    raw.parse::<i32>()
        .map_err(|_| FeatureError::InvalidInput(format!("{} must be an integer, got '{}'", field, raw)))
}

impl MovieAttributes {
    pub fn new(start_year: i32, runtime_minutes: i32, is_adult: u8, genres: impl Into<String>) -> Result<Self> {
        if is_adult > 1 {
            return Err(FeatureError::InvalidInput(format!(
                "isAdult must be 0 or 1, got {}",
                is_adult
            )));
        }
        Ok(Self {
            start_year,
            runtime_minutes,
            is_adult,
            genres: genres.into(),
        })
    }

    /// Parse raw request fields.
    ///
    /// `startYear` and `runtimeMinutes` are required integers; `isAdult`
    /// defaults to 0 and `genres` to `"Drama"`.
    pub fn from_raw(
        start_year: Option<&str>,
        runtime_minutes: Option<&str>,
        is_adult: Option<&str>,
        genres: Option<&str>,
    ) -> Result<Self> {
        let start_year = parse_required_int("startYear", start_year)?;
        let runtime_minutes = parse_required_int("runtimeMinutes", runtime_minutes)?;
        let is_adult = match is_adult.map(str::trim).filter(|s| !s.is_empty()) {
            None => 0,
            Some("0") => 0,
            Some("1") => 1,
            Some(other) => {
                return Err(FeatureError::InvalidInput(format!(
                    "isAdult must be 0 or 1, got '{}'",
                    other
                )));
            }
        };
        let genres = genres.unwrap_or(DEFAULT_GENRES);
        Self::new(start_year, runtime_minutes, is_adult, genres)
    }

    /// `floor(startYear / 10) * 10`, rounding toward negative infinity.
    /// Widened so every `i32` year has a decade.
    pub fn decade(&self) -> i64 {
        i64::from(self.start_year).div_euclid(10) * 10
    }

    /// Years between `startYear` and `CURRENT_YEAR`; negative for future films
    pub fn movie_age(&self) -> i64 {
        i64::from(CURRENT_YEAR) - i64::from(self.start_year)
    }
}

/// Turns requests into model-ready feature vectors.
///
/// Holds the three artifacts the encoding depends on; all are shared and
/// read-only, so one encoder serves every request.
#[derive(Clone)]
pub struct FeatureEncoder {
    embedder: Arc<dyn TextEmbedder>,
    projector: Arc<dyn Projector>,
    budget_table: Arc<BudgetImputationTable>,
}

impl FeatureEncoder {
    /// Fails with `ModelUnavailable` when the projector does not fit the
    /// embedder's width or does not produce `N_PCA` components.
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        projector: Arc<dyn Projector>,
        budget_table: Arc<BudgetImputationTable>,
    ) -> Result<Self> {
        if projector.input_dim() != embedder.dimension() {
            return Err(FeatureError::ModelUnavailable(format!(
                "projector expects {} dims but embedder produces {}",
                projector.input_dim(),
                embedder.dimension()
            )));
        }
        if projector.output_dim() != N_PCA {
            return Err(FeatureError::ModelUnavailable(format!(
                "projector produces {} components, schema needs {}",
                projector.output_dim(),
                N_PCA
            )));
        }
        Ok(Self {
            embedder,
            projector,
            budget_table,
        })
    }

    /// Encode one movie.
    ///
    /// The overview is embedded without normalization: the projection was
    /// fit on raw embeddings.
    #[instrument(skip(self, overview), fields(start_year = attrs.start_year))]
    pub fn encode(&self, attrs: &MovieAttributes, overview: &str, budget: Option<f64>) -> Result<FeatureVector> {
        if overview.trim().is_empty() {
            return Err(FeatureError::InvalidInput("overview must not be empty".to_string()));
        }
        if attrs.is_adult > 1 {
            return Err(FeatureError::InvalidInput(format!(
                "isAdult must be 0 or 1, got {}",
                attrs.is_adult
            )));
        }

        let embedding = self.embedder.embed_one(overview, false)?;
        let pca = self.projector.project(&embedding)?;
        if pca.len() != N_PCA {
            return Err(FeatureError::Projection(format!(
                "expected {} components, got {}",
                N_PCA,
                pca.len()
            )));
        }

        let decade = attrs.decade();
        let (log_budget, has_budget) = budget_features(budget, decade, &self.budget_table);

        let mut values = [0.0; FEATURE_COUNT];
        values[MOVIE_AGE] = attrs.movie_age() as f64;
        values[DECADE] = decade as f64;
        values[RUNTIME_CAPPED] = attrs.runtime_minutes.min(RUNTIME_CAP) as f64;
        values[GENRE_COUNT] = genre_count(&attrs.genres) as f64;
        values[IS_ADULT] = attrs.is_adult as f64;
        values[GENRE_START..PCA_START].copy_from_slice(&genre_flags(&attrs.genres));
        values[PCA_START..LOG_BUDGET].copy_from_slice(&pca);
        values[LOG_BUDGET] = log_budget;
        values[HAS_BUDGET] = has_budget;

        debug!("Encoded features (decade {}, has_budget {})", decade, has_budget);
        Ok(FeatureVector::from_values(values))
    }
}
