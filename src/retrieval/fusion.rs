//! Reciprocal Rank Fusion of vector and FTS result lists.
//!
//! Based on: Cormack, Clarke, Buettcher (2009) - "Reciprocal Rank Fusion
//! outperforms Condorcet and individual Rank Learning Methods". Each
//! chunk scores `Σ 1/(k + rank)` over the rankings that contain it;
//! ordering ties break by best available rank, then chunk id, so output
//! is deterministic.

use std::collections::BTreeMap;

use crate::index::{FtsHit, VectorHit};

use super::ResultRow;

/// A fused candidate before diversity filtering.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Chunk identifier.
    pub chunk_id: String,
    /// RRF fusion score (higher = better).
    pub score: f64,
    /// 1-indexed rank in the vector list, when present.
    pub vector_rank: Option<usize>,
    /// 1-indexed rank in the FTS list, when present.
    pub fts_rank: Option<usize>,
}

/// RRF score from the present rank positions (1-indexed).
#[must_use]
pub fn rrf_score(ranks: &[Option<usize>], k: u32) -> f64 {
    ranks
        .iter()
        .flatten()
        .map(|&rank| 1.0 / (f64::from(k) + rank as f64))
        .sum()
}

/// Fuses the two ranked lists into a deterministic combined ranking.
#[must_use]
pub fn fuse(vector_results: &[VectorHit], fts_results: &[FtsHit], rrf_k: u32) -> Vec<ScoredChunk> {
    let vector_ranks: BTreeMap<&str, usize> = vector_results
        .iter()
        .enumerate()
        .map(|(i, hit)| (hit.chunk_id.as_str(), i + 1))
        .collect();
    let fts_ranks: BTreeMap<&str, usize> = fts_results
        .iter()
        .enumerate()
        .map(|(i, hit)| (hit.chunk_id.as_str(), i + 1))
        .collect();

    let mut all_chunk_ids: Vec<&str> = vector_ranks
        .keys()
        .chain(fts_ranks.keys())
        .copied()
        .collect();
    all_chunk_ids.sort_unstable();
    all_chunk_ids.dedup();

    let mut scored: Vec<ScoredChunk> = all_chunk_ids
        .into_iter()
        .map(|chunk_id| {
            let v_rank = vector_ranks.get(chunk_id).copied();
            let f_rank = fts_ranks.get(chunk_id).copied();
            ScoredChunk {
                chunk_id: chunk_id.to_string(),
                score: rrf_score(&[v_rank, f_rank], rrf_k),
                vector_rank: v_rank,
                fts_rank: f_rank,
            }
        })
        .collect();

    // Score descending; ties break by best available rank, then chunk_id.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| min_rank(a).cmp(&min_rank(b)))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    scored
}

fn min_rank(chunk: &ScoredChunk) -> usize {
    chunk
        .vector_rank
        .into_iter()
        .chain(chunk.fts_rank)
        .min()
        .unwrap_or(usize::MAX)
}

/// Merges vector and FTS data for one fused chunk into a [`ResultRow`].
///
/// Prefers vector-search metadata (richer: converted path, locator,
/// heading path, names) and FTS text (the FTS table is the
/// authoritative text source). Missing fields backfill from the other
/// side; unknown fields stay empty.
#[must_use]
pub fn merge_chunk_data(
    scored: &ScoredChunk,
    vector_results: &[VectorHit],
    fts_results: &[FtsHit],
) -> ResultRow {
    let v_data = vector_results
        .iter()
        .find(|hit| hit.chunk_id == scored.chunk_id);
    let f_data = fts_results
        .iter()
        .find(|hit| hit.chunk_id == scored.chunk_id);

    let mut row = ResultRow {
        chunk_id: scored.chunk_id.clone(),
        doc_id: String::new(),
        text: String::new(),
        score: scored.score,
        vector_rank: scored.vector_rank,
        fts_rank: scored.fts_rank,
        modality: String::new(),
        heading_path: Vec::new(),
        doc_name: String::new(),
        file_type: String::new(),
        locator: None,
        converted_path: String::new(),
        temporal_bundle: None,
    };

    if let Some(v) = v_data {
        row.doc_id.clone_from(&v.doc_id);
        row.modality.clone_from(&v.modality);
        row.heading_path.clone_from(&v.heading_path);
        row.doc_name.clone_from(&v.doc_name);
        row.file_type.clone_from(&v.file_type);
        row.locator.clone_from(&v.locator);
        row.converted_path.clone_from(&v.converted_path);
    }

    if let Some(f) = f_data {
        row.text.clone_from(&f.text);
        if row.doc_id.is_empty() {
            row.doc_id.clone_from(&f.doc_id);
            row.modality.clone_from(&f.modality);
            row.heading_path.clone_from(&f.heading_path);
        }
    }

    row
}
