//! Corpus building: parse the four raw files and left-join them on movie id.
//!
//! movies_metadata.csv is the base table; every movie that survives parsing
//! ends up in the corpus whether or not it has credits, keywords or a link.

use crate::error::Result;
use crate::parser::{self, Credits};
use crate::types::{Corpus, MovieRecord};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const MOVIES_FILE: &str = "movies_metadata.csv";
pub const CREDITS_FILE: &str = "credits.csv";
pub const KEYWORDS_FILE: &str = "keywords.csv";
pub const LINKS_FILE: &str = "links.csv";

/// Locations of the four raw source files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSources {
    pub movies: PathBuf,
    pub credits: PathBuf,
    pub keywords: PathBuf,
    pub links: PathBuf,
}

impl CorpusSources {
    /// Standard file names inside one data directory
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            movies: data_dir.join(MOVIES_FILE),
            credits: data_dir.join(CREDITS_FILE),
            keywords: data_dir.join(KEYWORDS_FILE),
            links: data_dir.join(LINKS_FILE),
        }
    }
}

impl Corpus {
    /// Parse and join the raw sources into a corpus.
    ///
    /// The four files are parsed in parallel; the join itself is a single
    /// pass over the base rows, so corpus order is movies_metadata.csv order
    /// (minus dropped rows and repeated ids).
    #[instrument(skip(sources), fields(movies = %sources.movies.display()))]
    pub fn build(sources: &CorpusSources) -> Result<Self> {
        info!("Building movie corpus");

        let ((movies, credits), (keywords, links)) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_movies(&sources.movies),
                    || parser::parse_credits(&sources.credits),
                )
            },
            || {
                rayon::join(
                    || parser::parse_keywords(&sources.keywords),
                    || parser::parse_links(&sources.links),
                )
            },
        );

        let movies = movies?;
        let mut credits = credits?;
        let mut keywords = keywords?;
        let mut links = links?;

        let records: Vec<MovieRecord> = movies
            .into_iter()
            .map(|base| {
                // `remove` hands each enrichment to the first base row with
                // that id; a repeated base id is dropped by `from_records`.
                let Credits {
                    cast_top,
                    directors,
                } = credits.remove(&base.id).unwrap_or_default();

                MovieRecord {
                    id: base.id,
                    imdb_id: links.remove(&base.id),
                    title: base.title,
                    year: base.year,
                    overview: base.overview,
                    genre_names: base.genre_names,
                    keyword_names: keywords.remove(&base.id).unwrap_or_default(),
                    cast_top,
                    directors,
                    vote_average: base.vote_average,
                    vote_count: base.vote_count,
                }
            })
            .collect();

        let corpus = Corpus::from_records(records);
        info!("Corpus ready: {} movies", corpus.len());
        Ok(corpus)
    }
}
