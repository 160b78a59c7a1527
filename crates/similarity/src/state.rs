//! Published search state.
//!
//! A `SearchSnapshot` is an immutable corpus + index pair that has been
//! checked to agree. `SearchState` holds the current snapshot behind a lock
//! that is only taken long enough to clone or swap an `Arc`, so searches
//! never wait on a rebuild; they keep the snapshot they started with.

use crate::error::{IndexError, Result};
use crate::index::MovieIndex;
use data_loader::{Corpus, MovieRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::info;

// =============================================================================
// SearchSnapshot
// =============================================================================

pub struct SearchSnapshot {
    corpus: Arc<Corpus>,
    index: MovieIndex,
}

impl SearchSnapshot {
    /// Pair an index with its corpus. Fails with `CorpusMismatch` if the
    /// index was built from a different id order.
    pub fn new(corpus: Arc<Corpus>, index: MovieIndex) -> Result<Self> {
        index.verify_against(&corpus)?;
        Ok(Self { corpus, index })
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    pub fn index(&self) -> &MovieIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Top `k` records for an already-embedded query, best first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(&MovieRecord, f32)>> {
        self.index
            .search(query, k)?
            .into_iter()
            .map(|hit| {
                self.corpus
                    .get(hit.movie_id)
                    .map(|record| (record, hit.score))
                    .ok_or(IndexError::UnknownMovie(hit.movie_id))
            })
            .collect()
    }
}

// =============================================================================
// SearchState
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// Nothing published and nothing building
    Absent,
    /// A rebuild is running; a previous snapshot may still be served
    Building,
    Ready,
}

#[derive(Default)]
pub struct SearchState {
    current: RwLock<Option<Arc<SearchSnapshot>>>,
    building: AtomicBool,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> IndexStatus {
        if self.building.load(Ordering::Acquire) {
            IndexStatus::Building
        } else if self.snapshot().is_some() {
            IndexStatus::Ready
        } else {
            IndexStatus::Absent
        }
    }

    /// The currently published snapshot, if any
    pub fn snapshot(&self) -> Option<Arc<SearchSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The current snapshot, or `NotBuilt`
    pub fn ready(&self) -> Result<Arc<SearchSnapshot>> {
        self.snapshot().ok_or(IndexError::NotBuilt)
    }

    /// Publish a snapshot outside of a rebuild (startup load)
    pub fn publish(&self, snapshot: SearchSnapshot) {
        let rows = snapshot.len();
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(snapshot));
        info!("Published search snapshot with {} rows", rows);
    }

    /// Claim the single rebuild slot.
    ///
    /// Fails with `RebuildInProgress` while another guard is alive. The slot
    /// is released when the guard drops, whether or not it published.
    pub fn begin_rebuild(self: &Arc<Self>) -> Result<RebuildGuard> {
        self.building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| IndexError::RebuildInProgress)?;
        Ok(RebuildGuard {
            state: Arc::clone(self),
        })
    }
}

/// Exclusive right to publish a rebuilt snapshot
pub struct RebuildGuard {
    state: Arc<SearchState>,
}

impl RebuildGuard {
    pub fn publish(self, snapshot: SearchSnapshot) {
        self.state.publish(snapshot);
    }
}

impl Drop for RebuildGuard {
    fn drop(&mut self) {
        self.state.building.store(false, Ordering::Release);
    }
}
