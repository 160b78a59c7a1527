//! Service configuration.
//!
//! Every binary flattens `ServiceConfig` into its own clap parser, so the
//! server and the CLI agree on where artifacts live. Directories default to
//! subdirectories of the app root and can each be overridden.

use clap::{Args, ValueEnum};
use data_loader::CorpusSources;
use embedder::DEFAULT_MODEL_ID;
use std::path::PathBuf;

pub const PCA_FILE: &str = "pca_transformer.json";
pub const BUDGET_FILE: &str = "budget_medians.json";
pub const RATING_MODEL_FILE: &str = "rating_model.json";
pub const EMBEDDER_DIR: &str = "prediction_model";
pub const CORPUS_CACHE_FILE: &str = "movies.bin";
pub const INDEX_FILE: &str = "index.bin";

/// Which text embedder backs the service
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    /// all-MiniLM-L6-v2 (needs the model weights)
    Minilm,
    /// Feature hashing; no weights, not semantically meaningful
    Hashing,
}

#[derive(Args, Debug, Clone)]
pub struct ServiceConfig {
    /// Application root; other directories default to subdirectories of it
    #[arg(long, env = "FLOPORTOP_APP_ROOT", default_value = ".")]
    pub app_root: PathBuf,

    /// Model artifacts directory [default: <app-root>/models]
    #[arg(long, env = "FLOPORTOP_MODELS_DIR")]
    pub models_dir: Option<PathBuf>,

    /// Cache directory for the embedder, corpus and index [default: <app-root>/cache]
    #[arg(long, env = "FLOPORTOP_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Raw CSV directory [default: <app-root>/data]
    #[arg(long, env = "FLOPORTOP_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Hugging Face model id, downloaded when the local copy is missing
    #[arg(long, env = "FLOPORTOP_EMBEDDING_MODEL", default_value = DEFAULT_MODEL_ID)]
    pub embedding_model: String,

    #[arg(long, value_enum, default_value_t = EmbedderKind::Minilm)]
    pub embedder: EmbedderKind,

    /// gRPC address of a rating model server (e.g. http://127.0.0.1:50051).
    /// When unset, the JSON linear model in the models directory is used.
    #[arg(long, env = "FLOPORTOP_MODEL_SERVER")]
    pub model_server: Option<String>,

    /// Results returned when a search does not ask for a count
    #[arg(long, default_value_t = 10)]
    pub default_k: usize,

    /// Upper bound on results per search
    #[arg(long, default_value_t = 100)]
    pub max_k: usize,
}

impl ServiceConfig {
    /// Defaults rooted at `app_root`
    pub fn with_root(app_root: impl Into<PathBuf>) -> Self {
        Self {
            app_root: app_root.into(),
            models_dir: None,
            cache_dir: None,
            data_dir: None,
            embedding_model: DEFAULT_MODEL_ID.to_string(),
            embedder: EmbedderKind::Minilm,
            model_server: None,
            default_k: 10,
            max_k: 100,
        }
    }

    pub fn models_dir(&self) -> PathBuf {
        self.models_dir
            .clone()
            .unwrap_or_else(|| self.app_root.join("models"))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.app_root.join("cache"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| self.app_root.join("data"))
    }

    pub fn pca_path(&self) -> PathBuf {
        self.models_dir().join(PCA_FILE)
    }

    pub fn budget_path(&self) -> PathBuf {
        self.models_dir().join(BUDGET_FILE)
    }

    pub fn rating_model_path(&self) -> PathBuf {
        self.models_dir().join(RATING_MODEL_FILE)
    }

    /// Local copy of the sentence-embedding model
    pub fn embedder_dir(&self) -> PathBuf {
        self.cache_dir().join(EMBEDDER_DIR)
    }

    pub fn corpus_cache_path(&self) -> PathBuf {
        self.cache_dir().join(CORPUS_CACHE_FILE)
    }

    pub fn index_path(&self) -> PathBuf {
        self.cache_dir().join(INDEX_FILE)
    }

    pub fn corpus_sources(&self) -> CorpusSources {
        CorpusSources::in_dir(&self.data_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::Path;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ServiceConfig,
    }

    #[test]
    fn test_default_layout() {
        let config = ServiceConfig::with_root("/srv/floportop");
        assert_eq!(config.pca_path(), Path::new("/srv/floportop/models/pca_transformer.json"));
        assert_eq!(config.budget_path(), Path::new("/srv/floportop/models/budget_medians.json"));
        assert_eq!(config.embedder_dir(), Path::new("/srv/floportop/cache/prediction_model"));
        assert_eq!(config.index_path(), Path::new("/srv/floportop/cache/index.bin"));
        assert_eq!(
            config.corpus_sources().links,
            Path::new("/srv/floportop/data/links.csv")
        );
    }

    #[test]
    fn test_directory_overrides() {
        let cli = TestCli::parse_from([
            "test",
            "--app-root",
            "/app",
            "--cache-dir",
            "/var/cache/floportop",
            "--embedder",
            "hashing",
        ]);
        let config = cli.config;
        assert_eq!(config.models_dir(), Path::new("/app/models"));
        assert_eq!(config.corpus_cache_path(), Path::new("/var/cache/floportop/movies.bin"));
        assert_eq!(config.embedder, EmbedderKind::Hashing);
        assert_eq!(config.default_k, 10);
    }
}
