//! Single-file index artifact.
//!
//! bincode of `{ version, dim, ids, vectors }`. Writes go to a sibling temp
//! file and are renamed into place.

use crate::error::{IndexError, Result};
use crate::flat::FlatIpIndex;
use crate::index::MovieIndex;
use data_loader::MovieId;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use tracing::{info, warn};

pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct IndexArtifact {
    version: u32,
    dim: usize,
    ids: Vec<MovieId>,
    vectors: Vec<f32>,
}

fn artifact_error(path: &Path, reason: impl ToString) -> IndexError {
    IndexError::Artifact {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Write `index` to `path`, replacing any previous artifact
pub fn save_index(index: &MovieIndex, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let artifact = IndexArtifact {
        version: INDEX_FORMAT_VERSION,
        dim: index.dim(),
        ids: index.ids().to_vec(),
        vectors: index.flat().as_raw().to_vec(),
    };

    let tmp_path = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        bincode::serialize_into(&mut writer, &artifact).map_err(|e| artifact_error(path, e))?;
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;

    info!("Saved similarity index ({} rows) to {:?}", index.len(), path);
    Ok(())
}

/// Read the artifact at `path`.
///
/// A missing file is `Ok(None)`, not an error and not an empty index.
pub fn load_index(path: &Path) -> Result<Option<MovieIndex>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("No similarity index at {:?}", path);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let artifact: IndexArtifact =
        bincode::deserialize_from(BufReader::new(file)).map_err(|e| artifact_error(path, e))?;
    if artifact.version != INDEX_FORMAT_VERSION {
        return Err(IndexError::VersionMismatch {
            found: artifact.version,
            expected: INDEX_FORMAT_VERSION,
        });
    }

    let flat = FlatIpIndex::from_raw(artifact.dim, artifact.vectors)?;
    let index = MovieIndex::new(artifact.ids, flat)?;
    info!("Loaded similarity index ({} rows) from {:?}", index.len(), path);
    Ok(Some(index))
}
