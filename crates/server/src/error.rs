//! Service-level error taxonomy and its HTTP mapping.
//!
//! Library crates each report their own error enum; everything is folded
//! into `ServiceError` at the service boundary so handlers map one type to
//! status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use data_loader::DataLoadError;
use embedder::EmbedError;
use features::FeatureError;
use model_client::ModelClientError;
use serde::Serialize;
use similarity::IndexError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed or missing request fields
    #[error("{0}")]
    InvalidInput(String),

    /// An artifact failed to load or does not match the feature schema
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Search before any index exists. Not the same as zero results.
    #[error("Search index not built. Call POST /rebuild-index first.")]
    IndexNotBuilt,

    /// The corpus could not be built from the raw sources
    #[error("Corpus build failed: {0}")]
    UpstreamDataError(String),

    #[error("An index rebuild is already in progress")]
    RebuildInProgress,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::ModelUnavailable(_) | ServiceError::IndexNotBuilt => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::RebuildInProgress => StatusCode::CONFLICT,
            ServiceError::UpstreamDataError(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<EmbedError> for ServiceError {
    fn from(err: EmbedError) -> Self {
        match err {
            EmbedError::ModelUnavailable(msg) => ServiceError::ModelUnavailable(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<FeatureError> for ServiceError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
            FeatureError::ModelUnavailable(msg) => ServiceError::ModelUnavailable(msg),
            FeatureError::Embedding(e) => e.into(),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<IndexError> for ServiceError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotBuilt => ServiceError::IndexNotBuilt,
            IndexError::RebuildInProgress => ServiceError::RebuildInProgress,
            IndexError::Embedding(e) => e.into(),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<DataLoadError> for ServiceError {
    fn from(err: DataLoadError) -> Self {
        match err {
            // writing or reading our own cache is not an upstream problem
            DataLoadError::Cache { .. } | DataLoadError::IoError(_) => {
                ServiceError::Internal(err.to_string())
            }
            other => ServiceError::UpstreamDataError(other.to_string()),
        }
    }
}

impl From<ModelClientError> for ServiceError {
    fn from(err: ModelClientError) -> Self {
        match err {
            ModelClientError::ConnectionError(msg) => ServiceError::ModelUnavailable(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Internal(format!("background task failed: {}", err))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self);
        }
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServiceError::InvalidInput("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::ModelUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ServiceError::IndexNotBuilt.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ServiceError::UpstreamDataError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ServiceError::RebuildInProgress.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ServiceError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_library_error_conversion() {
        let err: ServiceError = FeatureError::InvalidInput("overview must not be empty".into()).into();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err: ServiceError =
            FeatureError::Embedding(EmbedError::ModelUnavailable("no weights".into())).into();
        assert!(matches!(err, ServiceError::ModelUnavailable(_)));

        let err: ServiceError = IndexError::NotBuilt.into();
        assert!(matches!(err, ServiceError::IndexNotBuilt));

        let err: ServiceError = DataLoadError::ParseError {
            file: "links.csv".into(),
            line: 3,
            reason: "invalid tmdbId".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::UpstreamDataError(_)));

        let err: ServiceError = ModelClientError::ConnectionError("refused".into()).into();
        assert!(matches!(err, ServiceError::ModelUnavailable(_)));
    }
}
