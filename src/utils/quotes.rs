// src/utils/quotes.rs

//! Optional quotes appended to notification emails.
//!
//! The quotes file is a headerless CSV with either `index,quote` or
//! `quote` rows. A missing or unreadable file simply yields no quote.

use std::path::Path;

use rand::seq::SliceRandom;

/// Load all non-empty quotes from a CSV file.
pub fn load_quotes(path: &Path) -> Vec<String> {
    if !path.is_file() {
        return Vec::new();
    }

    let mut reader = match csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => {
            log::debug!("Could not open quotes file {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    reader
        .records()
        .filter_map(|record| record.ok())
        .filter_map(|record| {
            let text = if record.len() >= 2 {
                record.get(1)
            } else {
                record.get(0)
            };
            text.map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
        .collect()
}

/// Pick a random quote, if any are available.
pub fn random_quote(path: &Path) -> Option<String> {
    load_quotes(path).choose(&mut rand::thread_rng()).cloned()
}
