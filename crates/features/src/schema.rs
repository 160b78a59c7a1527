//! The 49-column feature schema the rating model was trained on.
//!
//! Column order is part of the model contract: the regressor sees a bare
//! array, so shuffling two names here silently corrupts every prediction.

use std::sync::LazyLock;

// =============================================================================
// Training-time constants
// =============================================================================

/// Year `movie_age` is measured from. Frozen at training time; never read
/// the wall clock here.
pub const CURRENT_YEAR: i32 = 2026;

/// Runtimes above this are clamped
pub const RUNTIME_CAP: i32 = 300;

/// Number of PCA components taken from the overview embedding
pub const N_PCA: usize = 20;

/// Genre vocabulary, in one-hot column order
pub const VALID_GENRES: [&str; 22] = [
    "Drama",
    "Comedy",
    "Documentary",
    "Romance",
    "Action",
    "Crime",
    "Thriller",
    "Horror",
    "Adventure",
    "Mystery",
    "Family",
    "Biography",
    "Fantasy",
    "History",
    "Music",
    "Sci-Fi",
    "Musical",
    "War",
    "Animation",
    "Western",
    "Sport",
    "Adult",
];

// =============================================================================
// Column layout
// =============================================================================

pub const MOVIE_AGE: usize = 0;
pub const DECADE: usize = 1;
pub const RUNTIME_CAPPED: usize = 2;
pub const GENRE_COUNT: usize = 3;
pub const IS_ADULT: usize = 4;
/// First one-hot genre column
pub const GENRE_START: usize = 5;
/// First PCA column
pub const PCA_START: usize = GENRE_START + VALID_GENRES.len();
pub const LOG_BUDGET: usize = PCA_START + N_PCA;
pub const HAS_BUDGET: usize = LOG_BUDGET + 1;

pub const FEATURE_COUNT: usize = HAS_BUDGET + 1;

/// Column names in schema order
pub static FEATURE_NAMES: LazyLock<Vec<String>> = LazyLock::new(|| {
    let mut names: Vec<String> = [
        "movie_age",
        "decade",
        "runtimeMinutes_capped",
        "genre_count",
        "isAdult",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    names.extend(VALID_GENRES.iter().map(|g| format!("Genre_{}", g)));
    names.extend((0..N_PCA).map(|i| format!("pca_{}", i)));
    names.push("log_budget".to_string());
    names.push("has_budget".to_string());
    names
});

/// Index of a named column
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|n| n == name)
}

// =============================================================================
// FeatureVector
// =============================================================================

/// One encoded movie, in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named column
    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.values[i])
    }

    /// `(name, value)` pairs in schema order
    pub fn named(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        FEATURE_NAMES
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_shape() {
        assert_eq!(FEATURE_COUNT, 49);
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
        assert_eq!(FEATURE_NAMES[GENRE_START], "Genre_Drama");
        assert_eq!(FEATURE_NAMES[PCA_START], "pca_0");
        assert_eq!(FEATURE_NAMES[LOG_BUDGET], "log_budget");
        assert_eq!(FEATURE_NAMES[HAS_BUDGET], "has_budget");
    }

    #[test]
    fn test_schema_order() {
        let expected_head = [
            "movie_age",
            "decade",
            "runtimeMinutes_capped",
            "genre_count",
            "isAdult",
            "Genre_Drama",
            "Genre_Comedy",
        ];
        assert_eq!(&FEATURE_NAMES[..expected_head.len()], &expected_head);
        assert_eq!(feature_index("Genre_Sci-Fi"), Some(GENRE_START + 15));
        assert_eq!(feature_index("Genre_Adult"), Some(PCA_START - 1));
        assert_eq!(feature_index("pca_19"), Some(LOG_BUDGET - 1));
        assert_eq!(feature_index("budget"), None);
    }

    #[test]
    fn test_named_values() {
        let mut values = [0.0; FEATURE_COUNT];
        values[DECADE] = 1990.0;
        let vector = FeatureVector::from_values(values);
        assert_eq!(vector.get("decade"), Some(1990.0));
        assert_eq!(vector.named().count(), 49);
        assert_eq!(vector.named().nth(DECADE), Some(("decade", 1990.0)));
    }
}
