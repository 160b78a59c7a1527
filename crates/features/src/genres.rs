//! Genre string features.
//!
//! Genres arrive as one comma-separated string (`"Action,Sci-Fi"`). Flags are
//! set by case-sensitive substring containment on the whole string, which is
//! how the training data was encoded; `"Music"` therefore also fires for
//! `"Musical"`, and the model expects exactly that.

use crate::schema::VALID_GENRES;

/// Number of comma-separated tokens. An empty string still counts as one.
pub fn genre_count(genres: &str) -> usize {
    genres.split(',').count()
}

/// One-hot flags in `VALID_GENRES` order
pub fn genre_flags(genres: &str) -> [f64; VALID_GENRES.len()] {
    let mut flags = [0.0; VALID_GENRES.len()];
    for (flag, genre) in flags.iter_mut().zip(VALID_GENRES) {
        if genres.contains(genre) {
            *flag = 1.0;
        }
    }
    flags
}
