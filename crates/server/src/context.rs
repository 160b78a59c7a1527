//! Process-wide artifacts.
//!
//! Everything expensive (the embedding model, the PCA projection, the budget
//! table, the rating model) sits in a `Lazy` slot on `AppContext`. A slot
//! loads on first use under its own mutex, so concurrent first callers share
//! one load. A failed load leaves the slot empty and the next caller tries
//! again.
//!
//! Loaders do blocking I/O and may run model inference setup; call the
//! accessors from a blocking thread.

use crate::config::{EmbedderKind, ServiceConfig};
use crate::error::{Result, ServiceError};
use crate::prediction::{LinearRegressor, Regressor, RemoteRegressor};
use embedder::{HashingEmbedder, MiniLmEmbedder, TextEmbedder};
use features::{BudgetImputationTable, FeatureEncoder, PcaProjection, Projector};
use model_client::RatingModelClient;
use similarity::SearchState;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// A once-loaded, shared artifact
pub struct Lazy<T: ?Sized> {
    name: &'static str,
    loader: Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>,
    slot: Mutex<Option<Arc<T>>>,
}

impl<T: ?Sized + 'static> Lazy<T> {
    pub fn new(name: &'static str, loader: impl Fn() -> Result<Arc<T>> + Send + Sync + 'static) -> Self {
        Self {
            name,
            loader: Box::new(loader),
            slot: Mutex::new(None),
        }
    }

    /// A slot that is already filled
    pub fn ready(name: &'static str, value: Arc<T>) -> Self {
        Self {
            name,
            loader: Box::new(move || {
                Err(ServiceError::Internal(format!("{} has no loader", name)))
            }),
            slot: Mutex::new(Some(value)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The artifact, loading it if this is the first successful call
    pub fn get(&self) -> Result<Arc<T>> {
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }

        let value = (self.loader)().inspect_err(|e| warn!("Failed to load {}: {}", self.name, e))?;
        *slot = Some(Arc::clone(&value));
        info!("Loaded {}", self.name);
        Ok(value)
    }

    pub fn is_loaded(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

// =============================================================================
// AppContext
// =============================================================================

pub struct AppContext {
    config: ServiceConfig,
    embedder: Lazy<dyn TextEmbedder>,
    projector: Lazy<dyn Projector>,
    budget_table: Lazy<BudgetImputationTable>,
    regressor: Lazy<dyn Regressor>,
    search_state: Arc<SearchState>,
}

impl AppContext {
    /// Context whose artifacts load from the locations in `config`
    pub fn new(config: ServiceConfig) -> Self {
        AppContextBuilder::new(config).build()
    }

    pub fn builder(config: ServiceConfig) -> AppContextBuilder {
        AppContextBuilder::new(config)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn embedder(&self) -> Result<Arc<dyn TextEmbedder>> {
        self.embedder.get()
    }

    pub fn projector(&self) -> Result<Arc<dyn Projector>> {
        self.projector.get()
    }

    pub fn budget_table(&self) -> Result<Arc<BudgetImputationTable>> {
        self.budget_table.get()
    }

    pub fn regressor(&self) -> Result<Arc<dyn Regressor>> {
        self.regressor.get()
    }

    pub fn search_state(&self) -> &Arc<SearchState> {
        &self.search_state
    }

    /// Feature encoder over the shared artifacts
    pub fn encoder(&self) -> Result<FeatureEncoder> {
        Ok(FeatureEncoder::new(
            self.embedder()?,
            self.projector()?,
            self.budget_table()?,
        )?)
    }

    /// Load every artifact now, returning the ones that failed.
    ///
    /// Failures are not fatal; the slot stays empty and the first request
    /// that needs it reports the error.
    pub fn warm(&self) -> Vec<(&'static str, ServiceError)> {
        let mut failures = Vec::new();
        if let Err(e) = self.embedder.get() {
            failures.push((self.embedder.name(), e));
        }
        if let Err(e) = self.projector.get() {
            failures.push((self.projector.name(), e));
        }
        if let Err(e) = self.budget_table.get() {
            failures.push((self.budget_table.name(), e));
        }
        if let Err(e) = self.regressor.get() {
            failures.push((self.regressor.name(), e));
        }
        failures
    }
}

// =============================================================================
// AppContextBuilder
// =============================================================================

/// Builds an `AppContext`, with any artifact optionally supplied up front
pub struct AppContextBuilder {
    config: ServiceConfig,
    embedder: Option<Arc<dyn TextEmbedder>>,
    projector: Option<Arc<dyn Projector>>,
    budget_table: Option<Arc<BudgetImputationTable>>,
    regressor: Option<Arc<dyn Regressor>>,
}

impl AppContextBuilder {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            embedder: None,
            projector: None,
            budget_table: None,
            regressor: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_projector(mut self, projector: Arc<dyn Projector>) -> Self {
        self.projector = Some(projector);
        self
    }

    pub fn with_budget_table(mut self, table: Arc<BudgetImputationTable>) -> Self {
        self.budget_table = Some(table);
        self
    }

    pub fn with_regressor(mut self, regressor: Arc<dyn Regressor>) -> Self {
        self.regressor = Some(regressor);
        self
    }

    pub fn build(self) -> AppContext {
        let config = self.config;

        let embedder = match self.embedder {
            Some(e) => Lazy::ready("embedding model", e),
            None => embedder_slot(&config),
        };

        let projector = match self.projector {
            Some(p) => Lazy::ready("PCA projection", p),
            None => {
                let path = config.pca_path();
                Lazy::new("PCA projection", move || {
                    let pca: Arc<dyn Projector> = Arc::new(PcaProjection::load(&path)?);
                    Ok(pca)
                })
            }
        };

        let budget_table = match self.budget_table {
            Some(t) => Lazy::ready("budget table", t),
            None => {
                let path = config.budget_path();
                Lazy::new("budget table", move || {
                    Ok(Arc::new(BudgetImputationTable::load(&path)?))
                })
            }
        };

        let regressor = match self.regressor {
            Some(r) => Lazy::ready("rating model", r),
            None => regressor_slot(&config),
        };

        AppContext {
            config,
            embedder,
            projector,
            budget_table,
            regressor,
            search_state: Arc::new(SearchState::new()),
        }
    }
}

fn embedder_slot(config: &ServiceConfig) -> Lazy<dyn TextEmbedder> {
    match config.embedder {
        EmbedderKind::Minilm => {
            let dir = config.embedder_dir();
            let model_id = config.embedding_model.clone();
            Lazy::new("embedding model", move || {
                let model: Arc<dyn TextEmbedder> = Arc::new(MiniLmEmbedder::load(&dir, &model_id)?);
                Ok(model)
            })
        }
        EmbedderKind::Hashing => {
            warn!("Using the hashing embedder; predictions and search are not semantic");
            let hashing: Arc<dyn TextEmbedder> = Arc::new(HashingEmbedder::default());
            Lazy::ready("embedding model", hashing)
        }
    }
}

fn regressor_slot(config: &ServiceConfig) -> Lazy<dyn Regressor> {
    let model_path = config.rating_model_path();
    match config.model_server.clone() {
        // the remote server resolves the model path on its side
        Some(addr) => Lazy::new("rating model", move || {
            let client = RatingModelClient::connect_lazy(addr.clone(), model_path.to_string_lossy())?;
            info!("Scoring with remote model server at {}", client.service_address());
            let remote: Arc<dyn Regressor> = Arc::new(RemoteRegressor::new(client));
            Ok(remote)
        }),
        None => Lazy::new("rating model", move || {
            let linear: Arc<dyn Regressor> = Arc::new(LinearRegressor::load(&model_path)?);
            Ok(linear)
        }),
    }
}
