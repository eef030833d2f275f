//! Two-stage hybrid retrieval with RRF fusion.
//!
//! Stage A routes the question through catalog metadata to a document
//! shortlist; Stage B runs vector KNN and FTS over the effective scope,
//! fuses the rankings with Reciprocal Rank Fusion, applies the
//! per-document diversity cap, and optionally expands video hits into
//! temporal evidence bundles. Exhaustive mode adds a per-document
//! coverage back-fill for multi-file scopes.

pub mod coverage;
pub mod debug;
pub mod fusion;
pub mod router;
pub mod temporal;

pub use debug::{CoverageTrace, MentionScopeTrace, RetrievalTrace};
pub use temporal::BundleItem;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::chunking::Locator;
use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{IndexError, Result, RetrievalError};
use crate::index::IndexStore;

/// Retrieval profile requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Default precision/latency balance.
    #[default]
    Balanced,
    /// Higher recall and per-document coverage for checklist-style
    /// extraction and multi-file comparison.
    Exhaustive,
}

impl RetrievalMode {
    /// Parses a mode string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "balanced" => Some(Self::Balanced),
            "exhaustive" => Some(Self::Exhaustive),
            _ => None,
        }
    }
}

/// Tunable retrieval parameters.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Final result count.
    pub top_k: usize,
    /// Stage-A shortlist size.
    pub catalog_router_k: usize,
    /// Vector candidates before fusion (0 disables vector search).
    pub vector_k: usize,
    /// FTS candidates before fusion (0 disables FTS).
    pub fts_k: usize,
    /// RRF constant.
    pub rrf_k: u32,
    /// Per-document diversity cap.
    pub max_chunks_per_doc: usize,
    /// Expand video hits into temporal bundles.
    pub expand_video_temporal: bool,
    /// Retrieval profile.
    pub retrieval_mode: RetrievalMode,
    /// When true (mention-derived scopes), Stage A must not narrow the
    /// caller's document scope.
    pub preserve_doc_scope: bool,
}

impl RetrievalParams {
    /// Builds parameters from settings with the given `top_k`.
    #[must_use]
    pub fn from_settings(settings: &Settings, top_k: usize) -> Self {
        Self {
            top_k,
            catalog_router_k: settings.rag_catalog_router_k,
            vector_k: settings.rag_vector_k,
            fts_k: settings.rag_fts_k,
            rrf_k: settings.rag_rrf_k,
            max_chunks_per_doc: settings.rag_max_chunks_per_doc,
            expand_video_temporal: settings.rag_expand_video_temporal,
            retrieval_mode: RetrievalMode::Balanced,
            preserve_doc_scope: false,
        }
    }
}

/// One retrieval result: fused chunk with merged metadata and an
/// optional temporal bundle.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    /// Chunk identifier.
    pub chunk_id: String,
    /// Parent document id.
    pub doc_id: String,
    /// Chunk text.
    pub text: String,
    /// RRF fusion score (higher = better).
    pub score: f64,
    /// 1-indexed vector rank, when present.
    pub vector_rank: Option<usize>,
    /// 1-indexed FTS rank, when present.
    pub fts_rank: Option<usize>,
    /// Chunk modality label.
    pub modality: String,
    /// Section hierarchy.
    pub heading_path: Vec<String>,
    /// Document name.
    pub doc_name: String,
    /// Original file-type label.
    pub file_type: String,
    /// Position record.
    pub locator: Option<Locator>,
    /// Converted file path.
    pub converted_path: String,
    /// Temporal evidence bundle for video hits.
    pub temporal_bundle: Option<Vec<BundleItem>>,
}

#[allow(clippy::cast_precision_loss)]
fn elapsed_ms(started: Instant) -> f64 {
    (started.elapsed().as_micros() as f64 / 10.0).round() / 100.0
}

fn fill_params(trace: &mut RetrievalTrace, question: &str, params: &RetrievalParams) {
    trace.question = question.to_string();
    trace.params = debug::TraceParams {
        top_k: params.top_k,
        catalog_router_k: params.catalog_router_k,
        vector_k: params.vector_k,
        fts_k: params.fts_k,
        rrf_k: params.rrf_k,
        max_chunks_per_doc: params.max_chunks_per_doc,
        expand_video_temporal: params.expand_video_temporal,
    };
}

/// Hybrid retrieval over the index at `base_dir`.
///
/// Preconditions short-circuit to `[]` without work: `top_k == 0`, a
/// blank question, or an explicitly empty `doc_ids_filter`.
///
/// # Errors
///
/// Returns [`IndexError::NotBuilt`] when no index exists, and embedding
/// or database errors from Stage B.
#[allow(clippy::too_many_lines)]
pub async fn retrieve(
    question: &str,
    base_dir: &Path,
    settings: &Settings,
    embedder: &dyn Embedder,
    doc_ids_filter: Option<&[String]>,
    params: &RetrievalParams,
    mut trace: Option<&mut RetrievalTrace>,
) -> Result<Vec<ResultRow>> {
    let started = Instant::now();
    if let Some(trace) = trace.as_deref_mut() {
        fill_params(trace, question, params);
        trace.filters.input_doc_ids_filter_count = doc_ids_filter.map(<[String]>::len);
    }

    let early_exit = if params.top_k == 0 {
        Some("top_k<=0")
    } else if question.trim().is_empty() {
        Some("empty_question")
    } else if doc_ids_filter.is_some_and(<[String]>::is_empty) {
        Some("empty_doc_filter")
    } else {
        None
    };
    if let Some(reason) = early_exit {
        if let Some(trace) = trace.as_deref_mut() {
            trace.early_exit = Some(reason.to_string());
            trace.timings_ms.total = elapsed_ms(started);
        }
        return Ok(Vec::new());
    }

    if !IndexStore::exists(base_dir) {
        return Err(IndexError::NotBuilt.into());
    }

    // Stage A - catalog router (best effort). A non-empty shortlist
    // replaces the effective filter; empty or unavailable routing keeps
    // the caller's filter to preserve recall. Mention-derived scopes
    // are never narrowed.
    let router_started = Instant::now();
    let routed = if params.preserve_doc_scope {
        None
    } else {
        router::route_doc_ids(question, base_dir, params.catalog_router_k, doc_ids_filter)
    };
    let effective_filter: Option<Vec<String>> = match &routed {
        Some(shortlist) if !shortlist.is_empty() => Some(shortlist.clone()),
        _ => doc_ids_filter.map(<[String]>::to_vec),
    };
    if let Some(trace) = trace.as_deref_mut() {
        trace.timings_ms.router = elapsed_ms(router_started);
        trace.counts.routed_doc_ids = routed.as_ref().map(Vec::len);
        trace.filters.effective_doc_ids_filter_count =
            effective_filter.as_ref().map(Vec::len);
    }

    let store = IndexStore::open(base_dir)?;
    let filter_slice = effective_filter.as_deref();

    // Stage B - vector search.
    let mut vector_results = Vec::new();
    if params.vector_k > 0 {
        let vector_started = Instant::now();
        let query_vec = embedder
            .embed(question)
            .await
            .map_err(|e| RetrievalError::QueryEmbedding(e.to_string()))?;
        vector_results = store.knn_search(&query_vec, params.vector_k, filter_slice)?;
        if let Some(trace) = trace.as_deref_mut() {
            trace.timings_ms.vector = elapsed_ms(vector_started);
            trace.embedding_model = Some(settings.embedding_model.clone());
        }
    }

    // Stage B - FTS.
    let mut fts_results = Vec::new();
    if params.fts_k > 0 {
        let fts_started = Instant::now();
        fts_results = store.fts_search(question, params.fts_k, filter_slice)?;
        if let Some(trace) = trace.as_deref_mut() {
            trace.timings_ms.fts = elapsed_ms(fts_started);
        }
    }

    // Fusion + diversity.
    let fusion_started = Instant::now();
    let scored = fusion::fuse(&vector_results, &fts_results, params.rrf_k);
    let unique_candidates = scored.len();

    let mut doc_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut results: Vec<ResultRow> = Vec::new();
    let mut skipped_diversity = 0usize;

    for chunk in &scored {
        let row = fusion::merge_chunk_data(chunk, &vector_results, &fts_results);
        // Defensive fallback: never collapse unrelated chunks into the
        // same diversity bucket.
        let doc_key = if row.doc_id.is_empty() {
            format!("__unknown__:{}", row.chunk_id)
        } else {
            row.doc_id.clone()
        };
        let count = doc_counts.entry(doc_key).or_insert(0);
        if *count < params.max_chunks_per_doc {
            *count += 1;
            results.push(row);
        } else {
            skipped_diversity += 1;
        }
        if results.len() >= params.top_k {
            break;
        }
    }

    if let Some(trace) = trace.as_deref_mut() {
        trace.timings_ms.fusion = elapsed_ms(fusion_started);
        trace.counts.vector_hits = vector_results.len();
        trace.counts.fts_hits = fts_results.len();
        trace.counts.unique_candidates = unique_candidates;
        trace.counts.results_before_temporal = results.len();
        trace.counts.skipped_by_doc_diversity = skipped_diversity;
    }

    // Temporal expansion for video hits.
    let temporal_started = Instant::now();
    if params.expand_video_temporal
        && results
            .iter()
            .any(|r| matches!(r.modality.as_str(), "video_transcript" | "video_frame"))
    {
        temporal::expand_video_chunks(&mut results, base_dir, &store, None);
    }

    if let Some(trace) = trace.as_deref_mut() {
        trace.timings_ms.temporal = elapsed_ms(temporal_started);
        trace.counts.final_results = results.len();
        let mut modality_counts: BTreeMap<String, usize> = BTreeMap::new();
        for row in &results {
            let label = if row.modality.is_empty() {
                "unknown".to_string()
            } else {
                row.modality.clone()
            };
            *modality_counts.entry(label).or_insert(0) += 1;
        }
        trace.counts.final_modalities = modality_counts;
        trace.timings_ms.total = elapsed_ms(started);
    }

    debug!(
        results = results.len(),
        vector = vector_results.len(),
        fts = fts_results.len(),
        "retrieval complete"
    );
    Ok(results)
}

/// Retrieval plus the exhaustive-mode coverage back-fill.
///
/// When the mode is exhaustive and the scope names two or more
/// documents, up to [`coverage::MAX_BACKFILL_DOCS`] unrepresented
/// documents get a narrow single-document supplemental retrieval; the
/// final list then guarantees one hit per originally-scoped document
/// before filling by fused order.
///
/// # Errors
///
/// Propagates errors from the primary retrieval; supplemental failures
/// are skipped.
pub async fn retrieve_with_coverage(
    question: &str,
    base_dir: &Path,
    settings: &Settings,
    embedder: &dyn Embedder,
    doc_ids_filter: Option<&[String]>,
    params: &RetrievalParams,
    mut trace: Option<&mut RetrievalTrace>,
) -> Result<Vec<ResultRow>> {
    let mut results = retrieve(
        question,
        base_dir,
        settings,
        embedder,
        doc_ids_filter,
        params,
        trace.as_deref_mut(),
    )
    .await?;

    let Some(scoped) = doc_ids_filter else {
        return Ok(results);
    };
    if params.retrieval_mode != RetrievalMode::Exhaustive || scoped.len() < 2 {
        return Ok(results);
    }

    let missing = coverage::missing_doc_ids(&results, scoped);
    let covered_initial = scoped.len() - missing.len();
    let per_doc_k = coverage::per_doc_backfill_k(params.top_k, scoped.len());
    let mut backfill_attempted = 0usize;
    let mut backfilled_docs = 0usize;

    for doc_id in missing.iter().take(coverage::MAX_BACKFILL_DOCS) {
        backfill_attempted += 1;
        let supplemental_params = RetrievalParams {
            top_k: per_doc_k,
            catalog_router_k: 0,
            vector_k: params.vector_k.max(per_doc_k),
            fts_k: params.fts_k.max(per_doc_k),
            max_chunks_per_doc: params.max_chunks_per_doc.max(per_doc_k),
            preserve_doc_scope: true,
            ..params.clone()
        };
        let scope = vec![doc_id.clone()];
        match retrieve(
            question,
            base_dir,
            settings,
            embedder,
            Some(&scope),
            &supplemental_params,
            None,
        )
        .await
        {
            Ok(supplemental) if !supplemental.is_empty() => {
                backfilled_docs += 1;
                results.extend(supplemental);
            }
            Ok(_) => {}
            Err(e) => {
                debug!(doc_id = %doc_id, error = %e, "coverage back-fill retrieval failed");
            }
        }
    }

    let results = coverage::prioritize_doc_coverage(results, scoped, params.top_k);

    if let Some(trace) = trace.as_deref_mut() {
        let final_covered = scoped.len() - coverage::missing_doc_ids(&results, scoped).len();
        trace.coverage_backfill = Some(CoverageTrace {
            scoped_docs: scoped.len(),
            covered_docs_initial: covered_initial,
            missing_docs_initial: missing.len(),
            backfill_attempted,
            backfilled_docs,
            final_covered_docs: final_covered,
        });
        trace.counts.final_results = results.len();
    }

    Ok(results)
}
