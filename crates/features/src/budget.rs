//! Budget features and the per-decade imputation table.

use crate::error::{FeatureError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Fallback used when the table artifact has no `"default"` entry
pub const FALLBACK_LOG_BUDGET: f64 = 16.0;

/// Median `ln(1 + budget)` per decade, fit on the training set.
///
/// Loaded from a flat JSON object: `{"1990": 16.8, "2000": 17.1, "default": 16.2}`.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetImputationTable {
    by_decade: HashMap<i64, f64>,
    default: f64,
}

impl BudgetImputationTable {
    pub fn new(by_decade: HashMap<i64, f64>, default: f64) -> Self {
        Self { by_decade, default }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: HashMap<String, f64> = serde_json::from_str(json)
            .map_err(|e| FeatureError::ModelUnavailable(format!("budget table: {}", e)))?;

        let mut by_decade = HashMap::with_capacity(raw.len());
        let mut default = FALLBACK_LOG_BUDGET;
        for (key, value) in raw {
            if key == "default" {
                default = value;
                continue;
            }
            // pandas sometimes writes float decades ("1990.0")
            match key.trim().parse::<f64>() {
                Ok(decade) if decade.fract() == 0.0 => {
                    by_decade.insert(decade as i64, value);
                }
                _ => warn!("Ignoring budget table key '{}'", key),
            }
        }
        Ok(Self { by_decade, default })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            FeatureError::ModelUnavailable(format!("budget table {:?}: {}", path, e))
        })?;
        let table = Self::from_json_str(&json)?;
        info!("Loaded budget table with {} decades", table.by_decade.len());
        Ok(table)
    }

    /// Median log-budget for a decade, or the table default
    pub fn lookup(&self, decade: i64) -> f64 {
        self.by_decade.get(&decade).copied().unwrap_or(self.default)
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }
}

/// `(log_budget, has_budget)` for an optional budget.
///
/// A known positive budget is `ln(1 + budget)`; anything else (missing,
/// zero, negative, NaN) is imputed from the decade median.
pub fn budget_features(budget: Option<f64>, decade: i64, table: &BudgetImputationTable) -> (f64, f64) {
    match budget {
        Some(b) if b.is_finite() && b > 0.0 => (b.ln_1p(), 1.0),
        _ => (table.lookup(decade), 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> BudgetImputationTable {
        BudgetImputationTable::from_json_str(r#"{"2020": 17.5, "1990.0": 16.9, "default": 16.4}"#)
            .unwrap()
    }

    #[test]
    fn test_known_budget() {
        let (log_budget, has_budget) = budget_features(Some(1_000_000.0), 2020, &table());
        assert!((log_budget - 1_000_001f64.ln()).abs() < 1e-12);
        assert_eq!(has_budget, 1.0);
    }

    #[test]
    fn test_imputed_budget() {
        let t = table();
        assert_eq!(budget_features(None, 2020, &t), (17.5, 0.0));
        assert_eq!(budget_features(Some(0.0), 1990, &t), (16.9, 0.0));
        assert_eq!(budget_features(Some(f64::NAN), 1950, &t), (16.4, 0.0));
        assert_eq!(budget_features(Some(-5.0), 1950, &t), (16.4, 0.0));
    }

    #[test]
    fn test_missing_default_falls_back() {
        let t = BudgetImputationTable::from_json_str(r#"{"2000": 17.0}"#).unwrap();
        assert_eq!(t.default_value(), FALLBACK_LOG_BUDGET);
        assert_eq!(t.lookup(1930), 16.0);
    }

    #[test]
    fn test_bad_artifact() {
        let err = BudgetImputationTable::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, FeatureError::ModelUnavailable(_)));
        let err = BudgetImputationTable::load(Path::new("/no/such/budget.json")).unwrap_err();
        assert!(matches!(err, FeatureError::ModelUnavailable(_)));
    }
}
