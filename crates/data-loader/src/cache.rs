//! On-disk corpus cache.
//!
//! Parsing the raw CSVs (credits.csv alone is a few hundred MB of literal
//! lists) takes far longer than decoding a bincode dump of the joined
//! records, so the corpus is cached after the first build.

use crate::corpus::CorpusSources;
use crate::error::{DataLoadError, Result};
use crate::types::{Corpus, MovieRecord};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Bumped whenever `MovieRecord` changes shape
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CachedCorpus {
    version: u32,
    records: Vec<MovieRecord>,
}

/// A bincode corpus cache at a fixed path
#[derive(Debug, Clone)]
pub struct CorpusCache {
    path: PathBuf,
}

impl CorpusCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cache_error(&self, reason: impl ToString) -> DataLoadError {
        DataLoadError::Cache {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Read the cached corpus; `Ok(None)` when no cache file exists.
    pub fn load(&self) -> Result<Option<Corpus>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cached: CachedCorpus =
            bincode::deserialize_from(BufReader::new(file)).map_err(|e| self.cache_error(e))?;
        if cached.version != CACHE_FORMAT_VERSION {
            return Err(self.cache_error(format!(
                "format version {} (expected {})",
                cached.version, CACHE_FORMAT_VERSION
            )));
        }
        Ok(Some(Corpus::from_records(cached.records)))
    }

    /// Write the corpus, replacing any existing cache atomically.
    ///
    /// Readers see either the old file or the complete new one, never a
    /// partial write.
    pub fn store(&self, corpus: &Corpus) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            let payload = CachedCorpus {
                version: CACHE_FORMAT_VERSION,
                records: corpus.records().to_vec(),
            };
            bincode::serialize_into(&mut writer, &payload).map_err(|e| self.cache_error(e))?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Return the cached corpus, building and caching it when absent,
    /// unreadable, or when `force_reload` is set.
    #[instrument(skip(self, sources), fields(cache = %self.path.display()))]
    pub fn load_or_build(&self, sources: &CorpusSources, force_reload: bool) -> Result<Corpus> {
        let (corpus, built) = self.load_or_build_unstored(sources, force_reload)?;
        if built {
            self.store(&corpus)?;
        }
        Ok(corpus)
    }

    /// Like `load_or_build`, but a freshly built corpus is not written.
    ///
    /// The flag is `true` when the corpus came from the raw files; the
    /// caller stores it once whatever depends on it has been persisted.
    pub fn load_or_build_unstored(
        &self,
        sources: &CorpusSources,
        force_reload: bool,
    ) -> Result<(Corpus, bool)> {
        if !force_reload {
            match self.load() {
                Ok(Some(corpus)) => {
                    info!("Loaded {} movies from corpus cache", corpus.len());
                    return Ok((corpus, false));
                }
                Ok(None) => info!("No corpus cache, building from raw files"),
                Err(e) => warn!("Ignoring unreadable corpus cache: {}", e),
            }
        }

        Ok((Corpus::build(sources)?, true))
    }
}
