//! Core domain types for the movie corpus.
//!
//! A `MovieRecord` is one denormalized row: base metadata joined with its
//! credits, keywords and IMDb cross-reference. A `Corpus` is the ordered
//! collection of those rows plus an id lookup, which is what the similarity
//! index is built from and resolved against.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

// =============================================================================
// Type Aliases
// =============================================================================

/// TMDB movie id, the key every raw source is joined on
pub type MovieId = u32;

/// Number of cast members kept per movie, in billing order
pub const CAST_TOP_N: usize = 10;

// =============================================================================
// MovieRecord
// =============================================================================

/// One movie after the corpus join.
///
/// There is deliberately no stored `embedding_text` field: the text is
/// derived from the fields below every time it is asked for, so it cannot
/// drift from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub id: MovieId,
    /// `tt` + 7 zero-padded digits, `None` when links.csv has no row
    pub imdb_id: Option<String>,
    pub title: String,
    /// Year parsed from `release_date`
    pub year: Option<u16>,
    pub overview: String,
    pub genre_names: Vec<String>,
    pub keyword_names: Vec<String>,
    /// First `CAST_TOP_N` cast names in source order
    pub cast_top: Vec<String>,
    /// Every crew member whose job is "Director", in source order
    pub directors: Vec<String>,
    pub vote_average: Option<f32>,
    pub vote_count: Option<u32>,
}

impl MovieRecord {
    /// Creates a record with only an id and a title; every list is empty.
    pub fn new(id: MovieId, title: impl Into<String>) -> Self {
        Self {
            id,
            imdb_id: None,
            title: title.into(),
            year: None,
            overview: String::new(),
            genre_names: Vec::new(),
            keyword_names: Vec::new(),
            cast_top: Vec::new(),
            directors: Vec::new(),
            vote_average: None,
            vote_count: None,
        }
    }

    /// Canonical text blob that gets embedded for similarity search.
    ///
    /// Labeled sections, one per line, list fields rendered as `a, b, c`.
    /// Overview dominates semantically, but cast, genres and keywords still
    /// pull related movies together.
    pub fn embedding_text(&self) -> String {
        format!(
            "Title: {}\nOverview: {}\nGenres: {}\nKeywords: {}\nCast: {}\nDirector: {}",
            self.title,
            self.overview,
            self.genre_names.join(", "),
            self.keyword_names.join(", "),
            self.cast_top.join(", "),
            self.directors.join(", "),
        )
    }
}

// =============================================================================
// Corpus
// =============================================================================

/// Ordered, immutable collection of movie records.
///
/// Row order matters: the similarity index is built over `records()` in
/// this order. Ids are unique; lookups by id go through `positions`.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    records: Vec<MovieRecord>,
    positions: HashMap<MovieId, usize>,
}

impl Corpus {
    /// Creates a new, empty Corpus
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a corpus from records, keeping the first row for any repeated id.
    pub fn from_records(records: Vec<MovieRecord>) -> Self {
        let mut kept = Vec::with_capacity(records.len());
        let mut positions = HashMap::with_capacity(records.len());
        let mut duplicates = 0usize;

        for record in records {
            if positions.contains_key(&record.id) {
                duplicates += 1;
                continue;
            }
            positions.insert(record.id, kept.len());
            kept.push(record);
        }

        if duplicates > 0 {
            warn!("Dropped {} duplicate movie rows while building corpus", duplicates);
        }

        Self {
            records: kept,
            positions,
        }
    }

    /// All records in corpus order
    pub fn records(&self) -> &[MovieRecord] {
        &self.records
    }

    /// Get a movie by id
    pub fn get(&self, id: MovieId) -> Option<&MovieRecord> {
        self.positions.get(&id).map(|&pos| &self.records[pos])
    }

    /// Row position of a movie id
    pub fn position(&self, id: MovieId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Movie ids in corpus order
    pub fn ids(&self) -> Vec<MovieId> {
        self.records.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consumes the corpus, returning its rows in order
    pub fn into_records(self) -> Vec<MovieRecord> {
        self.records
    }
}
