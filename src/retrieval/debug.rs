//! Retrieval observability: structured traces appended as JSONL.
//!
//! Traces land in `<base_dir>/.flavia/rag_debug.jsonl` and are never
//! mixed into LLM context. The file is append-only; readers must
//! tolerate interleaved records from concurrent sub-agents.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

/// Debug log file name inside the config directory.
pub const RAG_DEBUG_FILENAME: &str = "rag_debug.jsonl";

/// Parameters echoed into the trace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceParams {
    /// Final result count requested.
    pub top_k: usize,
    /// Stage-A shortlist size.
    pub catalog_router_k: usize,
    /// Vector candidates before fusion.
    pub vector_k: usize,
    /// FTS candidates before fusion.
    pub fts_k: usize,
    /// RRF constant.
    pub rrf_k: u32,
    /// Per-document diversity cap.
    pub max_chunks_per_doc: usize,
    /// Temporal expansion enabled.
    pub expand_video_temporal: bool,
}

/// Filter counts before and after routing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceFilters {
    /// Caller-provided filter size (`None` = unfiltered).
    pub input_doc_ids_filter_count: Option<usize>,
    /// Effective filter size after Stage A.
    pub effective_doc_ids_filter_count: Option<usize>,
}

/// Stage counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceCounts {
    /// Router shortlist size (`None` = router unavailable).
    pub routed_doc_ids: Option<usize>,
    /// Vector hits before fusion.
    pub vector_hits: usize,
    /// FTS hits before fusion.
    pub fts_hits: usize,
    /// Unique fused candidates.
    pub unique_candidates: usize,
    /// Results before temporal expansion.
    pub results_before_temporal: usize,
    /// Candidates dropped by the per-document diversity cap.
    pub skipped_by_doc_diversity: usize,
    /// Final result count.
    pub final_results: usize,
    /// Final modality distribution.
    pub final_modalities: BTreeMap<String, usize>,
}

/// Per-stage timings in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceTimings {
    /// Stage-A router.
    pub router: f64,
    /// Vector search (including query embedding).
    pub vector: f64,
    /// FTS search.
    pub fts: f64,
    /// RRF fusion + diversity.
    pub fusion: f64,
    /// Temporal expansion.
    pub temporal: f64,
    /// End-to-end.
    pub total: f64,
}

/// Mention-scoping diagnostics, populated by the search tool.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MentionScopeTrace {
    /// Mentions found in the query.
    pub query_mentions: Vec<String>,
    /// Mentions matching no catalog entry.
    pub unresolved_mentions: Vec<String>,
    /// Mentions matching entries without an indexed conversion.
    pub unindexed_mentions: Vec<String>,
    /// Query after mention removal.
    pub effective_query: String,
}

/// Exhaustive-mode coverage diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageTrace {
    /// Documents in scope.
    pub scoped_docs: usize,
    /// Documents covered before back-fill.
    pub covered_docs_initial: usize,
    /// Documents missing before back-fill.
    pub missing_docs_initial: usize,
    /// Supplemental retrievals attempted.
    pub backfill_attempted: usize,
    /// Documents a supplemental retrieval actually covered.
    pub backfilled_docs: usize,
    /// Documents covered in the final list.
    pub final_covered_docs: usize,
}

/// One structured retrieval trace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalTrace {
    /// The (effective) question.
    pub question: String,
    /// Echoed parameters.
    pub params: TraceParams,
    /// Early-exit reason, when the pipeline short-circuited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_exit: Option<String>,
    /// Embedding model used for the query, when vector search ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Filter evolution.
    pub filters: TraceFilters,
    /// Stage counters.
    pub counts: TraceCounts,
    /// Stage timings.
    pub timings_ms: TraceTimings,
    /// Mention-scope diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention_scope: Option<MentionScopeTrace>,
    /// Coverage back-fill diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_backfill: Option<CoverageTrace>,
}

/// Appends one JSON record to `<base_dir>/.flavia/rag_debug.jsonl`.
///
/// Failures are logged and swallowed; diagnostics must never break
/// retrieval.
pub fn append_trace<T: Serialize>(base_dir: &Path, record: &T) {
    let config_dir = base_dir.join(".flavia");
    if let Err(e) = std::fs::create_dir_all(&config_dir) {
        warn!(error = %e, "cannot create config dir for rag debug log");
        return;
    }
    let path = config_dir.join(RAG_DEBUG_FILENAME);
    let line = match serde_json::to_string(record) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "cannot serialize rag debug trace");
            return;
        }
    };
    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| writeln!(file, "{line}"));
    if let Err(e) = result {
        warn!(error = %e, path = %path.display(), "cannot append rag debug trace");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_trace_is_jsonl() {
        let Ok(temp) = TempDir::new() else { return };
        let trace = RetrievalTrace {
            question: "first".to_string(),
            ..RetrievalTrace::default()
        };
        append_trace(temp.path(), &trace);
        let trace = RetrievalTrace {
            question: "second".to_string(),
            ..RetrievalTrace::default()
        };
        append_trace(temp.path(), &trace);

        let content = std::fs::read_to_string(
            temp.path().join(".flavia").join(RAG_DEBUG_FILENAME),
        )
        .unwrap_or_default();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            assert!(serde_json::from_str::<serde_json::Value>(line).is_ok());
        }
    }

    #[test]
    fn test_trace_serializes_optional_sections() {
        let trace = RetrievalTrace::default();
        let json = serde_json::to_string(&trace).unwrap_or_default();
        assert!(!json.contains("mention_scope"));
        assert!(!json.contains("coverage_backfill"));
        assert!(!json.contains("early_exit"));
    }
}
