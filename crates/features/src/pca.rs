//! Fitted PCA transformer.
//!
//! The transformer is exported from training as JSON with the same fields a
//! fitted scikit-learn `PCA` carries:
//!
//! ```json
//! { "mean": [..384], "components": [[..384] x 20], "explained_variance": [..20], "whiten": false }
//! ```
//!
//! `transform(x) = components · (x - mean)`, divided component-wise by
//! `sqrt(explained_variance)` when `whiten` is set.

use crate::error::{FeatureError, Result};
use crate::traits::Projector;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PcaProjection {
    mean: Vec<f64>,
    components: Vec<Vec<f64>>,
    #[serde(default)]
    explained_variance: Option<Vec<f64>>,
    #[serde(default)]
    whiten: bool,
}

impl PcaProjection {
    pub fn new(mean: Vec<f64>, components: Vec<Vec<f64>>) -> Result<Self> {
        let pca = Self {
            mean,
            components,
            explained_variance: None,
            whiten: false,
        };
        pca.validate()?;
        Ok(pca)
    }

    /// Enable whitening with the per-component variances
    pub fn with_whitening(mut self, explained_variance: Vec<f64>) -> Result<Self> {
        self.explained_variance = Some(explained_variance);
        self.whiten = true;
        self.validate()?;
        Ok(self)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let pca: Self = serde_json::from_str(json)
            .map_err(|e| FeatureError::ModelUnavailable(format!("PCA transformer: {}", e)))?;
        pca.validate()?;
        Ok(pca)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            FeatureError::ModelUnavailable(format!("PCA transformer {:?}: {}", path, e))
        })?;
        let pca = Self::from_json_str(&json)?;
        info!(
            "Loaded PCA transformer: {} -> {} dims",
            pca.input_dim(),
            pca.output_dim()
        );
        Ok(pca)
    }

    fn validate(&self) -> Result<()> {
        let bad = |reason: String| Err(FeatureError::ModelUnavailable(format!("PCA transformer: {}", reason)));

        if self.mean.is_empty() || self.components.is_empty() {
            return bad("empty mean or components".to_string());
        }
        if let Some(row) = self.components.iter().position(|c| c.len() != self.mean.len()) {
            return bad(format!(
                "component {} has {} weights, mean has {}",
                row,
                self.components[row].len(),
                self.mean.len()
            ));
        }
        if self.whiten {
            match &self.explained_variance {
                Some(var) if var.len() == self.components.len() && var.iter().all(|v| *v > 0.0) => {}
                _ => return bad("whiten requires one positive variance per component".to_string()),
            }
        }
        Ok(())
    }
}

impl Projector for PcaProjection {
    fn input_dim(&self) -> usize {
        self.mean.len()
    }

    fn output_dim(&self) -> usize {
        self.components.len()
    }

    fn project(&self, input: &[f32]) -> Result<Vec<f64>> {
        if input.len() != self.mean.len() {
            return Err(FeatureError::Projection(format!(
                "expected {} dims, got {}",
                self.mean.len(),
                input.len()
            )));
        }

        let centered: Vec<f64> = input
            .iter()
            .zip(&self.mean)
            .map(|(&x, m)| x as f64 - m)
            .collect();

        let mut projected: Vec<f64> = self
            .components
            .iter()
            .map(|component| component.iter().zip(&centered).map(|(w, x)| w * x).sum())
            .collect();

        if self.whiten {
            if let Some(var) = &self.explained_variance {
                for (value, v) in projected.iter_mut().zip(var) {
                    *value /= v.sqrt();
                }
            }
        }
        Ok(projected)
    }
}
