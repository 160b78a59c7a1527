//! Parsers for the four raw movie CSV files.
//!
//! - movies_metadata.csv: base rows (id, title, overview, genres, release_date, votes)
//! - credits.csv: cast, crew, id
//! - keywords.csv: id, keywords
//! - links.csv: movieId, imdbId, tmdbId
//!
//! Rows are read through `csv` + serde into loosely typed raw structs, then
//! converted by hand so that each kind of bad value can get its own policy:
//! a garbage movie id drops the row, a garbage enrichment key aborts the load.

use crate::error::{DataLoadError, Result};
use crate::pylit::{self, PyValue};
use crate::types::{MovieId, CAST_TOP_N};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

// =============================================================================
// Parsed rows
// =============================================================================

/// A movie row from movies_metadata.csv after field conversion
#[derive(Debug, Clone, PartialEq)]
pub struct BaseMovie {
    pub id: MovieId,
    pub title: String,
    pub overview: String,
    pub genre_names: Vec<String>,
    pub year: Option<u16>,
    pub vote_average: Option<f32>,
    pub vote_count: Option<u32>,
}

/// Cast and directors for one movie
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credits {
    pub cast_top: Vec<String>,
    pub directors: Vec<String>,
}

// =============================================================================
// Raw CSV shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawMovieRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    genres: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    vote_average: Option<String>,
    #[serde(default)]
    vote_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCreditsRow {
    #[serde(default)]
    cast: Option<String>,
    #[serde(default)]
    crew: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKeywordsRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    keywords: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLinksRow {
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    tmdb_id: Option<String>,
}

// =============================================================================
// Field helpers
// =============================================================================

/// Parse an enrichment join key.
///
/// Accepts plain integers and integral floats such as `"862.0"`, which is
/// how pandas writes an integer column that once held a NaN.
pub fn parse_key(raw: &str) -> Option<MovieId> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<MovieId>() {
        return Some(id);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value >= 0.0 && value <= MovieId::MAX as f64 {
        Some(value as MovieId)
    } else {
        None
    }
}

/// Base movie ids must be made of ASCII digits only; anything else is a
/// shifted or corrupt row.
fn parse_movie_id(raw: &str) -> Option<MovieId> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Year from a `YYYY-MM-DD` release date
pub fn parse_year(raw: &str) -> Option<u16> {
    let mut parts = raw.trim().split('-');
    let year = parts.next()?;
    if year.len() != 4 || parts.count() != 2 {
        return None;
    }
    year.parse().ok()
}

/// `tt` + 7 zero-padded digits from the numeric imdbId column
pub fn format_imdb_id(raw: &str) -> Option<String> {
    parse_key(raw).map(|n| format!("tt{:07}", n))
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

/// Names from a literal list cell; missing or unparseable cells give an
/// empty list.
fn literal_names<F>(cell: Option<&str>, file: &str, line: usize, keep: F) -> Vec<String>
where
    F: Fn(&PyValue) -> bool,
{
    let Some(cell) = cell.filter(|c| !c.trim().is_empty()) else {
        return Vec::new();
    };
    match pylit::names_where(cell, keep) {
        Ok(names) => names,
        Err(e) => {
            debug!("{}:{}: unparseable list literal ({})", file, line, e);
            Vec::new()
        }
    }
}

fn is_director(item: &PyValue) -> bool {
    item.get("job").and_then(PyValue::as_str) == Some("Director")
}

// =============================================================================
// Reader plumbing
// =============================================================================

fn open_reader(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Stream every row of `path` into `on_row`.
///
/// Rows the CSV layer cannot decode are logged and skipped; I/O failures
/// and errors returned by `on_row` abort the read.
fn for_each_row<T, F>(path: &Path, mut on_row: F) -> Result<()>
where
    T: DeserializeOwned,
    F: FnMut(T, usize) -> Result<()>,
{
    let file = file_label(path);
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|source| DataLoadError::Csv {
            file: file.clone(),
            source,
        })?
        .clone();

    let mut skipped = 0usize;
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(source) if source.is_io_error() => {
                return Err(DataLoadError::Csv { file, source });
            }
            Err(e) => {
                warn!("{}: skipping undecodable row: {}", file, e);
                skipped += 1;
                continue;
            }
        };
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        match record.deserialize::<T>(Some(&headers)) {
            Ok(row) => on_row(row, line)?,
            Err(e) => {
                debug!("{}:{}: skipping malformed row: {}", file, line, e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("{}: skipped {} malformed rows", file, skipped);
    }
    Ok(())
}

fn key_error(file: &str, line: usize, column: &str, raw: &str) -> DataLoadError {
    DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("invalid {} '{}'", column, raw),
    }
}

// =============================================================================
// Public parsers
// =============================================================================

/// Parse movies_metadata.csv.
///
/// Rows whose id is not purely numeric are dropped with a warning; those
/// are the handful of rows where an overview with stray quotes shifted the
/// columns.
pub fn parse_movies(path: &Path) -> Result<Vec<BaseMovie>> {
    let file = file_label(path);
    let mut movies = Vec::new();
    let mut dropped = 0usize;

    for_each_row(path, |row: RawMovieRow, line| {
        let raw_id = row.id.unwrap_or_default();
        let Some(id) = parse_movie_id(&raw_id) else {
            debug!("{}:{}: dropping row with non-numeric id '{}'", file, line, raw_id);
            dropped += 1;
            return Ok(());
        };

        movies.push(BaseMovie {
            id,
            title: row.title.unwrap_or_default(),
            overview: row.overview.unwrap_or_default(),
            genre_names: literal_names(row.genres.as_deref(), &file, line, |_| true),
            year: row.release_date.as_deref().and_then(parse_year),
            vote_average: row
                .vote_average
                .as_deref()
                .and_then(|v| v.trim().parse::<f32>().ok())
                .filter(|v| v.is_finite()),
            vote_count: row.vote_count.as_deref().and_then(parse_key),
        });
        Ok(())
    })?;

    if dropped > 0 {
        warn!("{}: dropped {} rows with a non-numeric id", file, dropped);
    }
    debug!("Parsed {} movies from {}", movies.len(), file);
    Ok(movies)
}

/// Parse credits.csv into cast (first `CAST_TOP_N`) and directors by id.
///
/// First row wins when an id repeats.
pub fn parse_credits(path: &Path) -> Result<HashMap<MovieId, Credits>> {
    let file = file_label(path);
    let mut credits = HashMap::new();

    for_each_row(path, |row: RawCreditsRow, line| {
        let raw_id = row.id.unwrap_or_default();
        let id = parse_key(&raw_id).ok_or_else(|| key_error(&file, line, "id", &raw_id))?;

        credits.entry(id).or_insert_with(|| {
            let mut cast_top = literal_names(row.cast.as_deref(), &file, line, |_| true);
            cast_top.truncate(CAST_TOP_N);
            Credits {
                cast_top,
                directors: literal_names(row.crew.as_deref(), &file, line, is_director),
            }
        });
        Ok(())
    })?;

    debug!("Parsed credits for {} movies from {}", credits.len(), file);
    Ok(credits)
}

/// Parse keywords.csv into keyword names by id. First row wins.
pub fn parse_keywords(path: &Path) -> Result<HashMap<MovieId, Vec<String>>> {
    let file = file_label(path);
    let mut keywords = HashMap::new();

    for_each_row(path, |row: RawKeywordsRow, line| {
        let raw_id = row.id.unwrap_or_default();
        let id = parse_key(&raw_id).ok_or_else(|| key_error(&file, line, "id", &raw_id))?;
        keywords
            .entry(id)
            .or_insert_with(|| literal_names(row.keywords.as_deref(), &file, line, |_| true));
        Ok(())
    })?;

    debug!("Parsed keywords for {} movies from {}", keywords.len(), file);
    Ok(keywords)
}

/// Parse links.csv into formatted IMDb ids keyed by TMDB id.
///
/// Rows with an empty tmdbId have nothing to join on and are skipped. A
/// non-empty tmdbId that is not a number aborts the load.
pub fn parse_links(path: &Path) -> Result<HashMap<MovieId, String>> {
    let file = file_label(path);
    let mut links = HashMap::new();
    let mut unlinked = 0usize;

    for_each_row(path, |row: RawLinksRow, line| {
        let Some(raw_tmdb) = non_empty(row.tmdb_id) else {
            unlinked += 1;
            return Ok(());
        };
        let tmdb_id =
            parse_key(&raw_tmdb).ok_or_else(|| key_error(&file, line, "tmdbId", &raw_tmdb))?;

        match row.imdb_id.as_deref().and_then(format_imdb_id) {
            Some(imdb_id) => {
                links.entry(tmdb_id).or_insert(imdb_id);
            }
            None => debug!("{}:{}: no usable imdbId for tmdb {}", file, line, tmdb_id),
        }
        Ok(())
    })?;

    if unlinked > 0 {
        debug!("{}: {} rows without a tmdbId", file, unlinked);
    }
    debug!("Parsed {} links from {}", links.len(), file);
    Ok(links)
}
