//! Route-level tests: the full axum router in process, with a hashing
//! embedder, an axis-aligned PCA and a linear rating model standing in for
//! the trained artifacts.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use data_loader::{Corpus, MovieRecord};
use embedder::{HashingEmbedder, TextEmbedder};
use features::{BudgetImputationTable, PcaProjection, FEATURE_COUNT, N_PCA};
use serde_json::Value;
use server::{AppContext, AppState, EmbedderKind, LinearRegressor, ServiceConfig};
use similarity::{IndexBuilder, SearchSnapshot};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const DIM: usize = 32;

fn axis_pca() -> PcaProjection {
    let components = (0..N_PCA)
        .map(|i| {
            let mut row = vec![0.0; DIM];
            row[i] = 1.0;
            row
        })
        .collect();
    PcaProjection::new(vec![0.0; DIM], components).unwrap()
}

fn context(root: &Path, intercept: f64) -> Arc<AppContext> {
    let mut config = ServiceConfig::with_root(root);
    config.embedder = EmbedderKind::Hashing;
    config.max_k = 5;

    let embedder: Arc<dyn TextEmbedder> = Arc::new(HashingEmbedder::new(DIM));
    let budget = BudgetImputationTable::new(HashMap::from([(2020, 17.5)]), 16.0);
    let regressor = LinearRegressor::new(vec![0.0; FEATURE_COUNT], intercept).unwrap();

    Arc::new(
        AppContext::builder(config)
            .with_embedder(embedder)
            .with_projector(Arc::new(axis_pca()))
            .with_budget_table(Arc::new(budget))
            .with_regressor(Arc::new(regressor))
            .build(),
    )
}

fn app(ctx: Arc<AppContext>) -> Router {
    server::router(AppState::new(ctx))
}

async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn movie(id: u32, title: &str, overview: &str) -> MovieRecord {
    let mut record = MovieRecord::new(id, title);
    record.overview = overview.to_string();
    record.imdb_id = Some(format!("tt{:07}", id));
    record.genre_names = vec!["Crime".to_string()];
    record.directors = vec!["Someone".to_string()];
    record.vote_average = Some(7.0);
    record
}

fn publish_corpus(ctx: &AppContext) {
    let corpus = Corpus::from_records(vec![
        movie(1, "Heat", "a crew of thieves pulls one last job in los angeles"),
        movie(2, "Toy Story", "a cowboy doll is threatened by a new spaceman toy"),
        movie(3, "Alien", "a space crew answers a distress call"),
    ]);
    let embedder = ctx.embedder().unwrap();
    let index = IndexBuilder::new(embedder).build(corpus.records()).unwrap();
    ctx.search_state()
        .publish(SearchSnapshot::new(Arc::new(corpus), index).unwrap());
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = call(app(context(dir.path(), 6.0)), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["model_version"], "v5");
}

#[tokio::test]
async fn test_predict_echoes_input() {
    let dir = tempfile::tempdir().unwrap();
    let long_overview = "word ".repeat(40);
    let uri = format!(
        "/predict?startYear=2024&runtimeMinutes=120&overview={}&genres=Action,Sci-Fi",
        long_overview.replace(' ', "%20")
    );

    let (status, body) = call(app(context(dir.path(), 7.456)), "GET", &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_rating"], 7.46);
    assert_eq!(body["input"]["startYear"], 2024);
    assert_eq!(body["input"]["isAdult"], 0);
    assert_eq!(body["input"]["genres"], "Action,Sci-Fi");
    assert!(body["input"]["budget"].is_null());
    let echoed = body["input"]["overview"].as_str().unwrap();
    assert_eq!(echoed.len(), 103);
    assert!(echoed.ends_with("..."));
}

#[tokio::test]
async fn test_predict_is_clipped() {
    let dir = tempfile::tempdir().unwrap();
    let uri = "/predict?startYear=1999&runtimeMinutes=90&overview=x&budget=1000000";
    let (status, body) = call(app(context(dir.path(), 42.0)), "GET", uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_rating"], 10.0);
    assert_eq!(body["input"]["budget"], 1_000_000.0);
}

#[tokio::test]
async fn test_predict_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), 6.0);

    let (status, body) = call(
        app(Arc::clone(&ctx)),
        "GET",
        "/predict?startYear=2000&runtimeMinutes=90&overview=%20%20",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "overview is required and cannot be empty");

    let (status, _) = call(
        app(Arc::clone(&ctx)),
        "GET",
        "/predict?startYear=soon&runtimeMinutes=90&overview=plot",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        app(ctx),
        "GET",
        "/predict?startYear=2000&runtimeMinutes=90&overview=plot&isAdult=2",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_extreme_start_year() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), 6.0);
    for year in ["-2147483648", "2147483647"] {
        let uri = format!("/predict?startYear={}&runtimeMinutes=90&overview=x", year);
        let (status, body) = call(app(Arc::clone(&ctx)), "GET", &uri).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["predicted_rating"], 6.0);
    }
}

#[tokio::test]
async fn test_predict_without_artifacts_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServiceConfig::with_root(dir.path());
    config.embedder = EmbedderKind::Hashing;
    let ctx = Arc::new(AppContext::new(config));

    let (status, body) = call(
        app(ctx),
        "GET",
        "/predict?startYear=2000&runtimeMinutes=90&overview=plot",
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_similar_film_before_index() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = call(
        app(context(dir.path(), 6.0)),
        "GET",
        "/similar-film?query=heist",
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body["detail"],
        "Search index not built. Call POST /rebuild-index first."
    );
}

#[tokio::test]
async fn test_similar_film() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), 6.0);
    publish_corpus(&ctx);

    let (status, body) = call(
        app(Arc::clone(&ctx)),
        "GET",
        "/similar-film?query=space%20crew&k=2",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "space crew");
    assert_eq!(body["count"], 2);
    let first = &body["results"][0];
    assert!(first["imdb_id"].as_str().unwrap().starts_with("tt"));
    assert_eq!(first["genres"][0], "Crime");
    assert!(first["score"].is_number());

    let (status, _) = call(app(Arc::clone(&ctx)), "GET", "/similar-film?query=%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(app(Arc::clone(&ctx)), "GET", "/similar-film?query=crew&k=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // more than the corpus holds
    let (_, body) = call(app(ctx), "GET", "/similar-film?query=crew&k=50").await;
    assert_eq!(body["count"], 3);
}

const MOVIES_CSV: &str = "\
id,title,overview,genres,release_date,vote_average,vote_count
862,Toy Story,\"Led by Woody, Andy's toys live happily in his room.\",\"[{'id': 16, 'name': 'Animation'}]\",1995-10-30,7.7,5415
949,Heat,Obsessive master thief Neil McCauley leads a top-notch crew.,\"[{'id': 28, 'name': 'Action'}]\",1995-12-15,7.7,1886
";

const CREDITS_CSV: &str = "\
cast,crew,id
\"[{'name': 'Tom Hanks'}]\",\"[{'job': 'Director', 'name': 'John Lasseter'}]\",862
\"[{'name': 'Al Pacino'}]\",\"[{'job': 'Director', 'name': 'Michael Mann'}]\",949
";

const KEYWORDS_CSV: &str = "\
id,keywords
862,\"[{'id': 931, 'name': 'jealousy'}]\"
";

const LINKS_CSV: &str = "\
movieId,imdbId,tmdbId
1,114709,862
6,113277,949
";

#[tokio::test]
async fn test_rebuild_index_then_search() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("movies_metadata.csv"), MOVIES_CSV).unwrap();
    fs::write(data.join("credits.csv"), CREDITS_CSV).unwrap();
    fs::write(data.join("keywords.csv"), KEYWORDS_CSV).unwrap();
    fs::write(data.join("links.csv"), LINKS_CSV).unwrap();

    let ctx = context(dir.path(), 6.0);
    let (status, body) = call(app(Arc::clone(&ctx)), "POST", "/rebuild-index").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "success");
    assert_eq!(body["index_size"], 2);
    assert!(dir.path().join("cache/index.bin").exists());
    assert!(dir.path().join("cache/movies.bin").exists());

    let (status, body) = call(app(ctx), "GET", "/similar-film?query=thief").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    // a fresh process picks up the persisted pair
    let restarted = context(dir.path(), 6.0);
    let size = server::SearchService::new(Arc::clone(&restarted))
        .load_persisted()
        .await
        .unwrap();
    assert_eq!(size, Some(2));
    let (status, body) = call(app(restarted), "GET", "/similar-film?query=toys").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["imdb_id"].as_str().map(|s| s.len()), Some(9));
}

#[tokio::test]
async fn test_rebuild_without_sources_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = call(app(context(dir.path(), 6.0)), "POST", "/rebuild-index?force_reload=true").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].is_string());
}
