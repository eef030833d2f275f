//! Per-document coverage for exhaustive multi-file retrieval.
//!
//! When a comparison request scopes several documents, vector and FTS
//! ranking may surface one document's chunks before any of another's.
//! The back-fill pass issues narrow single-document retrievals for the
//! missing documents and the prioritization pass guarantees at least one
//! hit per originally-scoped document before filling by fused order.

use std::collections::{BTreeMap, BTreeSet};

use super::ResultRow;

/// Maximum missing documents back-filled per request.
pub const MAX_BACKFILL_DOCS: usize = 8;

/// Per-document top-k for supplemental retrievals: between 4 and 12,
/// scaled by the overall budget.
#[must_use]
pub fn per_doc_backfill_k(top_k: usize, scoped_docs: usize) -> usize {
    (top_k / scoped_docs.max(1)).clamp(4, 12)
}

/// Deduplicates results by chunk id, keeping first occurrences.
#[must_use]
pub fn dedupe_by_chunk(results: Vec<ResultRow>) -> Vec<ResultRow> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut deduped = Vec::with_capacity(results.len());
    for row in results {
        if row.chunk_id.is_empty() || seen.insert(row.chunk_id.clone()) {
            deduped.push(row);
        }
    }
    deduped
}

/// Reorders results so every scoped document contributes at least one
/// chunk before remaining slots fill in fused order, truncated to
/// `limit`.
#[must_use]
pub fn prioritize_doc_coverage(
    results: Vec<ResultRow>,
    scoped_doc_ids: &[String],
    limit: usize,
) -> Vec<ResultRow> {
    if limit == 0 || results.is_empty() {
        return Vec::new();
    }
    let deduped = dedupe_by_chunk(results);
    if scoped_doc_ids.is_empty() {
        return deduped.into_iter().take(limit).collect();
    }

    let mut by_doc: BTreeMap<&str, Vec<&ResultRow>> = BTreeMap::new();
    for row in &deduped {
        by_doc.entry(row.doc_id.as_str()).or_default().push(row);
    }

    let mut used: BTreeSet<&str> = BTreeSet::new();
    let mut prioritized: Vec<ResultRow> = Vec::new();

    // One representative per scoped document first.
    for doc_id in scoped_doc_ids {
        let Some(group) = by_doc.get(doc_id.as_str()) else {
            continue;
        };
        let Some(first) = group.first() else { continue };
        if used.insert(first.chunk_id.as_str()) {
            prioritized.push((*first).clone());
        }
        if prioritized.len() >= limit {
            return prioritized;
        }
    }

    // Fill remaining slots in fused order.
    for row in &deduped {
        if used.contains(row.chunk_id.as_str()) {
            continue;
        }
        used.insert(row.chunk_id.as_str());
        prioritized.push(row.clone());
        if prioritized.len() >= limit {
            break;
        }
    }

    prioritized
}

/// Doc ids in scope that no current result covers.
#[must_use]
pub fn missing_doc_ids(results: &[ResultRow], scoped_doc_ids: &[String]) -> Vec<String> {
    let covered: BTreeSet<&str> = results
        .iter()
        .filter(|r| !r.doc_id.is_empty())
        .map(|r| r.doc_id.as_str())
        .collect();
    scoped_doc_ids
        .iter()
        .filter(|doc_id| !covered.contains(doc_id.as_str()))
        .cloned()
        .collect()
}
