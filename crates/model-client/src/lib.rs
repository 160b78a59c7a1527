//! Client for a remote rating model served over gRPC.
//!
//! The trained regressor does not have to live in this process: any server
//! implementing `rating.RatingModel` can score feature rows for us. This
//! crate handles:
//! - Connection management (eager or lazy)
//! - Converting feature rows to protobuf messages
//! - Validating that the reply has one prediction per row

use thiserror::Error;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, error, info};

// Include the generated protobuf code
pub mod rating {
    tonic::include_proto!("rating");
}

use rating::{rating_model_client::RatingModelClient as GrpcRatingModelClient, FeatureRow, PredictRequest};

/// Errors that can occur when talking to the model server
#[derive(Error, Debug)]
pub enum ModelClientError {
    #[error("Failed to connect to model server: {0}")]
    ConnectionError(String),

    #[error("Prediction request failed: {0}")]
    PredictionError(String),

    #[error("Invalid response from model server: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, ModelClientError>;

/// Client for the rating model service.
///
/// Cheap to clone; clones share one underlying HTTP/2 channel.
#[derive(Debug, Clone)]
pub struct RatingModelClient {
    client: GrpcRatingModelClient<Channel>,
    service_addr: String,
    model_path: String,
}

fn endpoint(addr: &str) -> Result<Endpoint> {
    Channel::from_shared(addr.to_string())
        .map_err(|e| ModelClientError::ConnectionError(format!("invalid address {}: {}", addr, e)))
}

/// The server could not be reached, as opposed to rejecting the request.
///
/// Lazy channels only discover a dead server here, surfacing either as
/// `UNAVAILABLE` or as a status wrapping the transport error.
fn is_unreachable(status: &tonic::Status) -> bool {
    status.code() == tonic::Code::Unavailable
        || std::error::Error::source(status)
            .is_some_and(|source| source.is::<tonic::transport::Error>())
}

impl RatingModelClient {
    /// Connect to the model server now.
    ///
    /// `model_path` is passed through on every request so the server knows
    /// which artifact to score with.
    pub async fn connect(addr: impl Into<String>, model_path: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        info!("Connecting to model server at {}", addr);

        let channel = endpoint(&addr)?
            .connect()
            .await
            .map_err(|e| ModelClientError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client: GrpcRatingModelClient::new(channel),
            service_addr: addr,
            model_path: model_path.into(),
        })
    }

    /// Create a client that connects on first request.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_lazy(addr: impl Into<String>, model_path: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        let channel = endpoint(&addr)?.connect_lazy();
        debug!("Lazy model server channel for {}", addr);
        Ok(Self {
            client: GrpcRatingModelClient::new(channel),
            service_addr: addr,
            model_path: model_path.into(),
        })
    }

    /// Score feature rows.
    ///
    /// Returns raw model outputs, one per row, in row order.
    pub async fn predict(&self, feature_names: &[String], rows: Vec<Vec<f64>>) -> Result<Vec<f64>> {
        let expected_len = rows.len();
        debug!("Requesting predictions for {} rows", expected_len);

        let request = tonic::Request::new(PredictRequest {
            model_path: self.model_path.clone(),
            feature_names: feature_names.to_vec(),
            rows: rows.into_iter().map(|values| FeatureRow { values }).collect(),
        });

        let mut client = self.client.clone();
        let response = client.predict(request).await.map_err(|e| {
            error!("gRPC error while predicting: {}", e);
            if is_unreachable(&e) {
                ModelClientError::ConnectionError(e.to_string())
            } else {
                ModelClientError::PredictionError(e.to_string())
            }
        })?;

        let predictions = response.into_inner().predictions;
        if predictions.len() != expected_len {
            error!(
                "Mismatch in number of predictions: expected {}, got {}",
                expected_len,
                predictions.len()
            );
            return Err(ModelClientError::InvalidResponse(format!(
                "expected {} predictions, got {}",
                expected_len,
                predictions.len()
            )));
        }
        Ok(predictions)
    }

    /// Address of the model server this client talks to
    pub fn service_address(&self) -> &str {
        &self.service_addr
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rating::rating_model_server::{RatingModel, RatingModelServer};
    use rating::PredictResponse;
    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::transport::Server;
    use tonic::{Request, Response, Status};

    /// Scores each row as the sum of its values; `drop_one` makes it
    /// return one prediction too few.
    #[derive(Default)]
    struct MockRatingModel {
        drop_one: bool,
    }

    #[tonic::async_trait]
    impl RatingModel for MockRatingModel {
        async fn predict(
            &self,
            request: Request<PredictRequest>,
        ) -> std::result::Result<Response<PredictResponse>, Status> {
            let req = request.into_inner();
            if req.model_path.is_empty() {
                return Err(Status::invalid_argument("model_path is required"));
            }
            if req.model_path == "draining" {
                return Err(Status::unavailable("server is shutting down"));
            }
            let mut predictions: Vec<f64> = req.rows.iter().map(|r| r.values.iter().sum()).collect();
            if self.drop_one {
                predictions.pop();
            }
            Ok(Response::new(PredictResponse { predictions }))
        }
    }

    async fn start_mock_model_server(model: MockRatingModel) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock model server");
        let addr = listener.local_addr().expect("Failed to get local address");

        let handle = tokio::spawn(async move {
            Server::builder()
                .add_service(RatingModelServer::new(model))
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .expect("Mock model server failed");
        });

        (format!("http://{}", addr), handle)
    }

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[tokio::test]
    async fn test_predict_round_trip() {
        let (addr, handle) = start_mock_model_server(MockRatingModel::default()).await;
        let client = RatingModelClient::connect(addr.clone(), "models/rating_model.pkl")
            .await
            .expect("Failed to connect");
        assert_eq!(client.service_address(), addr);

        let predictions = client
            .predict(&names(), vec![vec![1.0, 2.5], vec![4.0, 3.0]])
            .await
            .unwrap();
        assert_eq!(predictions, vec![3.5, 7.0]);

        handle.abort();
    }

    #[tokio::test]
    async fn test_lazy_client_connects_on_first_request() {
        let (addr, handle) = start_mock_model_server(MockRatingModel::default()).await;
        let client = RatingModelClient::connect_lazy(addr, "m").unwrap();
        let predictions = client.predict(&names(), vec![vec![5.0, 1.0]]).await.unwrap();
        assert_eq!(predictions, vec![6.0]);
        handle.abort();
    }

    #[tokio::test]
    async fn test_short_response_is_rejected() {
        let (addr, handle) = start_mock_model_server(MockRatingModel { drop_one: true }).await;
        let client = RatingModelClient::connect(addr, "m").await.unwrap();
        let err = client.predict(&names(), vec![vec![1.0, 1.0]]).await.unwrap_err();
        assert!(matches!(err, ModelClientError::InvalidResponse(_)));
        handle.abort();
    }

    #[tokio::test]
    async fn test_server_error_is_prediction_error() {
        let (addr, handle) = start_mock_model_server(MockRatingModel::default()).await;
        let client = RatingModelClient::connect(addr, "").await.unwrap();
        let err = client.predict(&names(), vec![vec![1.0, 1.0]]).await.unwrap_err();
        assert!(matches!(err, ModelClientError::PredictionError(_)));
        handle.abort();
    }

    #[tokio::test]
    async fn test_unavailable_status_is_connection_error() {
        let (addr, handle) = start_mock_model_server(MockRatingModel::default()).await;
        let client = RatingModelClient::connect(addr, "draining").await.unwrap();
        let err = client.predict(&names(), vec![vec![1.0, 1.0]]).await.unwrap_err();
        assert!(matches!(err, ModelClientError::ConnectionError(_)));
        handle.abort();
    }

    #[tokio::test]
    async fn test_lazy_client_without_server_is_connection_error() {
        // bind then release a port so nothing is listening on it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = RatingModelClient::connect_lazy(addr, "m").unwrap();
        let err = client.predict(&names(), vec![vec![1.0, 1.0]]).await.unwrap_err();
        assert!(matches!(err, ModelClientError::ConnectionError(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_bad_address() {
        assert!(matches!(
            RatingModelClient::connect_lazy("not a uri", "m"),
            Err(ModelClientError::ConnectionError(_))
        ));
    }
}
