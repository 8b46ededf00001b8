//! Canonical episode document construction.
//!
//! Every episode is flattened into a single multi-line string that both
//! embedding models consume. The line order is a public contract: search
//! hydration recovers the episode title by line index from the stored
//! document, so reordering the fields is a breaking change to the index
//! schema.

use crate::models::EpisodeRecord;
use crate::text::{clean, normalize_arabic};

/// Line index of the episode title inside the canonical document.
///
/// Lines: 0 = podcast name, 1 = podcast author, 2 = title, 3 = description.
pub const TITLE_LINE: usize = 2;

/// Build the canonical document for an episode.
///
/// Podcast name, author, and title get Arabic normalization; the description
/// is HTML-cleaned first, then normalized. Fields are joined with newlines
/// in the frozen order. No truncation happens here; callers that need length
/// limits apply them downstream.
pub fn build_document(record: &EpisodeRecord) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        normalize_arabic(&record.podcast_name),
        normalize_arabic(&record.podcast_author),
        normalize_arabic(&record.title),
        normalize_arabic(&clean(&record.description)),
    )
}

/// Recover the episode title from a stored canonical document.
pub fn title_from_document(document: &str) -> &str {
    document.lines().nth(TITLE_LINE).unwrap_or_default()
}
