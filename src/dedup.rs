// src/dedup.rs
//! # Deduplicator
//! Collapses near-duplicate signals: one underlying event fetched through
//! both the cache and a live refetch must appear exactly once in a response.
//!
//! Two signals are duplicates iff they share a source, normalized-equal
//! titles, the same UTC publication day, and overlapping affected
//! materials. Among duplicates the highest relevance wins; ties go to the
//! most recent `published_date`.

use chrono::NaiveDate;

use crate::signal::{normalize_title, EnrichmentSignal};

/// Dedupe in place, returning the survivors and the number removed.
pub fn dedupe(signals: Vec<EnrichmentSignal>) -> (Vec<EnrichmentSignal>, usize) {
    // Preferred survivors first, so the sweep below keeps them.
    let mut ordered = signals;
    ordered.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.published_date.cmp(&a.published_date))
    });

    let mut kept: Vec<EnrichmentSignal> = Vec::with_capacity(ordered.len());
    let mut removed = 0usize;

    for candidate in ordered {
        let dup = kept.iter().any(|k| is_duplicate(k, &candidate));
        if dup {
            removed += 1;
        } else {
            kept.push(candidate);
        }
    }

    (kept, removed)
}

fn is_duplicate(a: &EnrichmentSignal, b: &EnrichmentSignal) -> bool {
    a.source.name == b.source.name
        && normalize_title(&a.title) == normalize_title(&b.title)
        && day_of(a) == day_of(b)
        && materials_overlap(&a.materials_affected, &b.materials_affected)
}

fn day_of(s: &EnrichmentSignal) -> NaiveDate {
    s.published_date.date_naive()
}

/// Non-empty intersection; two untagged signals also count as overlapping
/// so an untagged bulletin still collapses with its cached copy.
fn materials_overlap(a: &[String], b: &[String]) -> bool {
    if a.is_empty() && b.is_empty() {
        return true;
    }
    a.iter()
        .any(|m| b.iter().any(|n| n.eq_ignore_ascii_case(m)))
}
