//! # Similar-film search
//!
//! Coordinates the corpus, the embedder and the published index:
//! 1. Startup: load a persisted corpus + index pair, if both exist
//! 2. Search: embed the query (normalized) and rank by inner product
//! 3. Rebuild: corpus (cached unless forced) → index → persist → publish
//!
//! Searches run against whatever snapshot was current when they started. A
//! rebuild holds the single rebuild slot until it publishes or fails.

use crate::context::AppContext;
use crate::error::{Result, ServiceError};
use data_loader::{Corpus, CorpusCache, MovieRecord};
use serde::Serialize;
use similarity::{IndexBuilder, MovieIndex, SearchSnapshot, load_index, save_index};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// One search result, detached from the snapshot it came from
#[derive(Debug, Clone, Serialize)]
pub struct SimilarFilm {
    pub title: String,
    pub imdb_id: Option<String>,
    pub overview: String,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub cast: Vec<String>,
    pub vote_average: Option<f32>,
    pub score: f32,
}

impl SimilarFilm {
    fn from_hit(record: &MovieRecord, score: f32) -> Self {
        Self {
            title: record.title.clone(),
            imdb_id: record.imdb_id.clone(),
            overview: record.overview.clone(),
            genres: record.genre_names.clone(),
            directors: record.directors.clone(),
            cast: record.cast_top.clone(),
            vote_average: record.vote_average,
            score,
        }
    }
}

/// Build (or load from cache) the corpus. Blocking.
pub fn build_corpus(ctx: &AppContext, force_reload: bool) -> Result<Corpus> {
    let config = ctx.config();
    let cache = CorpusCache::new(config.corpus_cache_path());
    Ok(cache.load_or_build(&config.corpus_sources(), force_reload)?)
}

/// Embed and index a corpus in order. Blocking.
pub fn build_index(ctx: &AppContext, corpus: &Corpus) -> Result<MovieIndex> {
    let embedder = ctx.embedder()?;
    Ok(IndexBuilder::new(embedder).build(corpus.records())?)
}

#[derive(Clone)]
pub struct SearchService {
    ctx: Arc<AppContext>,
}

impl SearchService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Publish the persisted corpus + index, if both exist.
    ///
    /// Returns the published size, or `None` when either artifact is
    /// missing. A pair that does not match is an error and nothing is
    /// published.
    pub async fn load_persisted(&self) -> Result<Option<usize>> {
        let ctx = Arc::clone(&self.ctx);
        tokio::task::spawn_blocking(move || -> Result<Option<usize>> {
            let config = ctx.config();
            let index = match load_index(&config.index_path())? {
                Some(index) => index,
                None => {
                    info!("No persisted index at {:?}", config.index_path());
                    return Ok(None);
                }
            };
            let corpus = match CorpusCache::new(config.corpus_cache_path()).load()? {
                Some(corpus) => corpus,
                None => {
                    warn!("Persisted index found but no corpus cache; rebuild required");
                    return Ok(None);
                }
            };

            let snapshot = SearchSnapshot::new(Arc::new(corpus), index)?;
            let size = snapshot.len();
            ctx.search_state().publish(snapshot);
            Ok(Some(size))
        })
        .await?
    }

    /// Top `k` films for a free-text query, best first.
    ///
    /// `k` defaults to the configured default and is capped at the
    /// configured maximum; asking for more than the corpus holds returns the
    /// whole corpus.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<Vec<SimilarFilm>> {
        if query.trim().is_empty() {
            return Err(ServiceError::InvalidInput("Query cannot be empty".to_string()));
        }

        let config = self.ctx.config();
        let k = k.unwrap_or(config.default_k);
        if k == 0 {
            return Err(ServiceError::InvalidInput("k must be at least 1".to_string()));
        }
        let k = k.min(config.max_k);

        let snapshot = self.ctx.search_state().ready()?;

        let ctx = Arc::clone(&self.ctx);
        let query = query.to_string();
        let results = tokio::task::spawn_blocking(move || -> Result<Vec<SimilarFilm>> {
            let embedder = ctx.embedder()?;
            let vector = embedder.embed_one(&query, true)?;
            Ok(snapshot
                .search(&vector, k)?
                .into_iter()
                .map(|(record, score)| SimilarFilm::from_hit(record, score))
                .collect())
        })
        .await??;

        debug!("Search returned {} results (k={})", results.len(), k);
        Ok(results)
    }

    /// Rebuild the corpus and index and publish them.
    ///
    /// Fails with `RebuildInProgress` if another rebuild holds the slot. The
    /// previous snapshot keeps serving until the new one is published; on
    /// failure it stays published.
    #[instrument(skip(self))]
    pub async fn rebuild(&self, force_reload: bool) -> Result<usize> {
        let guard = self.ctx.search_state().begin_rebuild()?;
        let start_time = Instant::now();

        let ctx = Arc::clone(&self.ctx);
        // the guard lives on the blocking task so a dropped request cannot
        // release the slot while the build is still running
        let size = tokio::task::spawn_blocking(move || -> Result<usize> {
            let config = ctx.config();
            let cache = CorpusCache::new(config.corpus_cache_path());
            let (corpus, built) = cache.load_or_build_unstored(&config.corpus_sources(), force_reload)?;
            let index = build_index(&ctx, &corpus)?;
            save_index(&index, &config.index_path())?;
            // the cached corpus must never be newer than the saved index
            if built {
                cache.store(&corpus)?;
            }

            let snapshot = SearchSnapshot::new(Arc::new(corpus), index)?;
            let size = snapshot.len();
            guard.publish(snapshot);
            Ok(size)
        })
        .await??;

        info!(
            "Rebuilt search index with {} movies in {:.2?}",
            size,
            start_time.elapsed()
        );
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbedderKind, ServiceConfig};
    use embedder::{EmbedError, HashingEmbedder, TextEmbedder};
    use similarity::IndexStatus;

    fn record(id: u32, title: &str, overview: &str) -> MovieRecord {
        let mut r = MovieRecord::new(id, title);
        r.overview = overview.to_string();
        r.genre_names = vec!["Drama".to_string()];
        r
    }

    fn service_with_snapshot(dir: &std::path::Path, max_k: usize) -> SearchService {
        let mut config = ServiceConfig::with_root(dir);
        config.embedder = EmbedderKind::Hashing;
        config.max_k = max_k;
        let embedder: Arc<dyn TextEmbedder> = Arc::new(HashingEmbedder::new(64));
        let ctx = Arc::new(
            AppContext::builder(config)
                .with_embedder(Arc::clone(&embedder))
                .build(),
        );

        let corpus = Corpus::from_records(vec![
            record(1, "Heat", "a crew of professional thieves in los angeles"),
            record(2, "Toy Story", "toys come to life when nobody is watching"),
            record(3, "Alien", "the crew of a space freighter meets a deadly creature"),
        ]);
        let index = IndexBuilder::new(embedder).build(corpus.records()).unwrap();
        ctx.search_state()
            .publish(SearchSnapshot::new(Arc::new(corpus), index).unwrap());
        SearchService::new(ctx)
    }

    #[tokio::test]
    async fn test_search_validation() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_snapshot(dir.path(), 100);

        assert!(matches!(
            service.search("   ", None).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            service.search("thieves", Some(0)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_search_k_is_clamped() {
        let dir = tempfile::tempdir().unwrap();

        let service = service_with_snapshot(dir.path(), 100);
        let results = service.search("thieves", Some(50)).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

        let service = service_with_snapshot(dir.path(), 2);
        assert_eq!(service.search("thieves", Some(50)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_exact_text_ranks_first() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_snapshot(dir.path(), 100);
        let text = record(2, "Toy Story", "toys come to life when nobody is watching").embedding_text();

        let results = service.search(&text, Some(1)).await.unwrap();
        assert_eq!(results[0].title, "Toy Story");
        assert!((results[0].score - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_search_before_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::with_root(dir.path());
        config.embedder = EmbedderKind::Hashing;
        let service = SearchService::new(Arc::new(AppContext::new(config)));

        assert!(matches!(
            service.search("anything", None).await,
            Err(ServiceError::IndexNotBuilt)
        ));
        assert_eq!(service.load_persisted().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rebuild_in_progress_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_snapshot(dir.path(), 100);
        let _guard = service.ctx.search_state().begin_rebuild().unwrap();

        assert!(matches!(
            service.rebuild(false).await,
            Err(ServiceError::RebuildInProgress)
        ));
        assert_eq!(service.ctx.search_state().status(), IndexStatus::Building);
    }

    struct FailingEmbedder;

    impl TextEmbedder for FailingEmbedder {
        fn dimension(&self) -> usize {
            8
        }

        fn embed(&self, _texts: &[&str], _normalize: bool) -> embedder::Result<Vec<Vec<f32>>> {
            Err(EmbedError::Inference("out of memory".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_forced_rebuild_keeps_corpus_cache() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(
            data.join("movies_metadata.csv"),
            "id,title,overview\n862,Toy Story,Toys.\n949,Heat,Thieves.\n",
        )
        .unwrap();
        std::fs::write(data.join("credits.csv"), "cast,crew,id\n").unwrap();
        std::fs::write(data.join("keywords.csv"), "id,keywords\n").unwrap();
        std::fs::write(data.join("links.csv"), "movieId,imdbId,tmdbId\n").unwrap();

        let mut config = ServiceConfig::with_root(dir.path());
        config.embedder = EmbedderKind::Hashing;
        let embedder: Arc<dyn TextEmbedder> = Arc::new(FailingEmbedder);
        let ctx = Arc::new(AppContext::builder(config).with_embedder(embedder).build());
        let cache = CorpusCache::new(ctx.config().corpus_cache_path());
        cache
            .store(&Corpus::from_records(vec![record(1, "Alien", "a space crew")]))
            .unwrap();

        let service = SearchService::new(Arc::clone(&ctx));
        assert!(service.rebuild(true).await.is_err());
        assert_eq!(cache.load().unwrap().unwrap().ids(), vec![1]);
        assert!(!ctx.config().index_path().exists());
        assert_eq!(ctx.search_state().status(), IndexStatus::Absent);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_serving() {
        // no CSVs in the data dir
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_snapshot(dir.path(), 100);

        assert!(matches!(
            service.rebuild(false).await,
            Err(ServiceError::UpstreamDataError(_))
        ));
        assert_eq!(service.ctx.search_state().status(), IndexStatus::Ready);
        assert_eq!(service.search("crew", None).await.unwrap().len(), 3);
    }
}
