//! The `search_chunks` tool: hybrid retrieval with mention scoping.
//!
//! Extracts `@file` mentions from the query, resolves them against the
//! catalog to indexed doc ids, applies file-type/doc-name filters,
//! escalates to the exhaustive profile for checklist-style queries,
//! runs the two-stage retrieval with coverage back-fill, and formats
//! the passages as `[N]`-cited context blocks.

use std::path::Path;

use serde_json::Value;

use crate::agent::context::AgentContext;
use crate::agent::mentions::{looks_exhaustive_query, normalize_mention, strip_mentions};
use crate::catalog::{Catalog, FileEntry, FileStatus};
use crate::chunking::{Locator, doc_id};
use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::guard::check_read;
use crate::index::IndexStore;
use crate::retrieval::{
    MentionScopeTrace, ResultRow, RetrievalMode, RetrievalParams, RetrievalTrace, debug,
    retrieve_with_coverage,
};

/// Exhaustive-profile floors for recall-heavy extraction queries.
const EXHAUSTIVE_MIN_TOP_K: usize = 30;
const EXHAUSTIVE_MIN_ROUTER_K: usize = 50;
const EXHAUSTIVE_STAGE_K_CAP: usize = 120;

/// Result of resolving mentions against the catalog.
struct MentionResolution {
    doc_ids: Vec<String>,
    unresolved: Vec<String>,
    unindexed: Vec<String>,
}

fn entry_matches_mention(entry: &FileEntry, normalized_mention: &str) -> bool {
    if normalized_mention.is_empty() {
        return false;
    }

    let path_value = normalize_mention(&entry.path);
    let name_value = normalize_mention(&entry.name);
    let converted_value = entry
        .converted_to
        .as_deref()
        .map(normalize_mention)
        .unwrap_or_default();

    let mut candidates = vec![path_value.clone(), name_value];
    let mut suffix_candidates = vec![path_value];
    if !converted_value.is_empty() {
        candidates.push(converted_value.clone());
        suffix_candidates.push(converted_value);
    }
    for frame_path in &entry.frame_descriptions {
        let frame_norm = normalize_mention(frame_path);
        if !frame_norm.is_empty() {
            candidates.push(frame_norm.clone());
            suffix_candidates.push(frame_norm);
        }
    }
    for raw in [&entry.path, &entry.name] {
        if let Some(stem) = Path::new(raw).file_stem() {
            candidates.push(normalize_mention(&stem.to_string_lossy()));
        }
    }

    if candidates.iter().any(|c| c == normalized_mention) {
        return true;
    }
    suffix_candidates
        .iter()
        .any(|c| c.ends_with(&format!("/{normalized_mention}")))
}

/// Resolves `@mentions` to indexed doc ids.
fn resolve_doc_ids_from_mentions(
    mentions: &[String],
    catalog: &Catalog,
    base_dir: &Path,
) -> MentionResolution {
    let mut resolution = MentionResolution {
        doc_ids: Vec::new(),
        unresolved: Vec::new(),
        unindexed: Vec::new(),
    };
    let mut seen = std::collections::BTreeSet::new();

    for mention in mentions {
        let normalized = normalize_mention(mention);
        let mut matched_any = false;
        let mut matched_indexed = false;

        for entry in catalog.files().values() {
            if entry.status == FileStatus::Missing {
                continue;
            }
            if !entry_matches_mention(entry, &normalized) {
                continue;
            }
            matched_any = true;
            if entry.converted_to.is_none() {
                continue;
            }
            matched_indexed = true;
            let id = doc_id(base_dir, &entry.path, &entry.checksum_sha256);
            if seen.insert(id.clone()) {
                resolution.doc_ids.push(id);
            }
        }

        if !matched_any {
            resolution.unresolved.push(mention.clone());
        } else if !matched_indexed {
            resolution.unindexed.push(mention.clone());
        }
    }

    resolution
}

fn mention_note(unresolved: &[String], unindexed: &[String]) -> Option<String> {
    let mut notes = Vec::new();
    if !unresolved.is_empty() {
        let items: Vec<String> = unresolved.iter().map(|m| format!("@{m}")).collect();
        notes.push(format!("unknown: {}", items.join(", ")));
    }
    if !unindexed.is_empty() {
        let items: Vec<String> = unindexed.iter().map(|m| format!("@{m}")).collect();
        notes.push(format!("not indexed: {}", items.join(", ")));
    }
    if notes.is_empty() {
        None
    } else {
        Some(notes.join("; "))
    }
}

/// Executes the `search_chunks` tool. Always returns a UTF-8 string;
/// failures are `Error:` strings.
#[allow(clippy::too_many_lines)]
pub async fn search_chunks(args: &Value, ctx: &AgentContext, settings: &Settings) -> String {
    let base_dir = ctx.base_dir.clone();
    let config_dir = base_dir.join(".flavia");
    let index_dir = base_dir.join(".index");

    // --- Argument validation --------------------------------------------
    let Some(query) = args.get("query").and_then(Value::as_str) else {
        return "Error: query parameter is required and cannot be empty.".to_string();
    };
    let query = query.trim();
    if query.is_empty() {
        return "Error: query parameter is required and cannot be empty.".to_string();
    }
    let (stripped_query, mentions) = strip_mentions(query);
    let effective_query = if stripped_query.is_empty() {
        query.to_string()
    } else {
        stripped_query
    };

    let top_k = match args.get("top_k") {
        None => 10,
        Some(Value::Number(n)) if n.as_u64().is_some_and(|v| (1..=100).contains(&v)) => {
            #[allow(clippy::cast_possible_truncation)]
            {
                n.as_u64().unwrap_or(10) as usize
            }
        }
        Some(_) => return "Error: top_k must be an integer between 1 and 100.".to_string(),
    };

    let file_type_filter = match args.get("file_type_filter") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let trimmed = s.trim().to_lowercase();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        }
        Some(_) => return "Error: file_type_filter must be a string.".to_string(),
    };
    let doc_name_filter = match args.get("doc_name_filter") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let trimmed = s.trim().to_lowercase();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        }
        Some(_) => return "Error: doc_name_filter must be a string.".to_string(),
    };

    let debug_mode = match args.get("debug") {
        None | Some(Value::Null) => ctx.rag_debug,
        Some(Value::Bool(b)) => *b,
        Some(_) => return "Error: debug must be true or false.".to_string(),
    };

    let mut retrieval_mode = match args.get("retrieval_mode") {
        None | Some(Value::Null) => RetrievalMode::Balanced,
        Some(Value::String(s)) => match RetrievalMode::parse(s) {
            Some(mode) => mode,
            None => return "Error: retrieval_mode must be 'balanced' or 'exhaustive'.".to_string(),
        },
        Some(_) => return "Error: retrieval_mode must be 'balanced' or 'exhaustive'.".to_string(),
    };
    if retrieval_mode == RetrievalMode::Balanced && looks_exhaustive_query(query) {
        retrieval_mode = RetrievalMode::Exhaustive;
    }

    // --- Preconditions ---------------------------------------------------
    if let Err(reason) = check_read(&config_dir, ctx) {
        return format!("Error: {reason}");
    }
    if let Err(reason) = check_read(&index_dir, ctx) {
        return format!("Error: {reason}");
    }

    let Some(catalog) = Catalog::load(&config_dir) else {
        return "Error: No content catalog found. Run 'flavia-rs init' to build the catalog."
            .to_string();
    };
    if !IndexStore::exists(&base_dir) {
        return "Error: No vector index found. Run '/index build' to create the search index. \
                This requires converted documents in .converted/ directory."
            .to_string();
    }

    // --- Scope from metadata filters ------------------------------------
    let mut doc_ids_filter: Option<Vec<String>> = None;
    if file_type_filter.is_some() || doc_name_filter.is_some() {
        let mut scoped = Vec::new();
        for entry in catalog.files().values() {
            if entry.status == FileStatus::Missing {
                continue;
            }
            if let Some(ref wanted) = file_type_filter {
                let candidates = [
                    entry.file_type.as_str().to_string(),
                    entry.category.to_lowercase(),
                    entry.extension.trim_start_matches('.').to_lowercase(),
                ];
                if !candidates.iter().any(|c| c == wanted) {
                    continue;
                }
            }
            if let Some(ref wanted) = doc_name_filter
                && !entry.name.to_lowercase().contains(wanted)
            {
                continue;
            }
            scoped.push(doc_id(&base_dir, &entry.path, &entry.checksum_sha256));
        }
        if scoped.is_empty() {
            return "No documents match the specified filters.".to_string();
        }
        doc_ids_filter = Some(scoped);
    }

    // --- Scope from mentions --------------------------------------------
    let preserve_doc_scope = !mentions.is_empty();
    let mut resolution = MentionResolution {
        doc_ids: Vec::new(),
        unresolved: Vec::new(),
        unindexed: Vec::new(),
    };
    if !mentions.is_empty() {
        resolution = resolve_doc_ids_from_mentions(&mentions, &catalog, &base_dir);
        if resolution.doc_ids.is_empty() {
            let details = mention_note(&resolution.unresolved, &resolution.unindexed)
                .unwrap_or_else(|| "no matching indexed files".to_string());
            return format!(
                "No indexed documents match the @file references ({details}). \
                 Ensure files are cataloged, converted, and indexed."
            );
        }
        doc_ids_filter = match doc_ids_filter {
            None => Some(resolution.doc_ids.clone()),
            Some(existing) => {
                let scoped: std::collections::BTreeSet<&String> =
                    resolution.doc_ids.iter().collect();
                let combined: Vec<String> = existing
                    .into_iter()
                    .filter(|id| scoped.contains(id))
                    .collect();
                if combined.is_empty() {
                    return "No documents remain after combining @file references with \
                            the provided filters."
                        .to_string();
                }
                Some(combined)
            }
        };
    }

    // --- Parameter resolution (+ exhaustive escalation) ------------------
    let mut params = RetrievalParams::from_settings(settings, top_k);
    params.retrieval_mode = retrieval_mode;
    params.preserve_doc_scope = preserve_doc_scope;
    if retrieval_mode == RetrievalMode::Exhaustive {
        params.top_k = params.top_k.max(EXHAUSTIVE_MIN_TOP_K);
        params.catalog_router_k = params.catalog_router_k.max(EXHAUSTIVE_MIN_ROUTER_K);
        params.vector_k = params
            .vector_k
            .max(EXHAUSTIVE_STAGE_K_CAP.min(params.top_k * 4));
        params.fts_k = params
            .fts_k
            .max(EXHAUSTIVE_STAGE_K_CAP.min(params.top_k * 4));
        params.max_chunks_per_doc = params.max_chunks_per_doc.max(params.top_k);
    }

    // --- Retrieval -------------------------------------------------------
    let embedder = create_embedder(settings);
    let mut trace = RetrievalTrace::default();
    if debug_mode && !mentions.is_empty() {
        trace.mention_scope = Some(MentionScopeTrace {
            query_mentions: mentions.iter().map(|m| format!("@{m}")).collect(),
            unresolved_mentions: resolution.unresolved.iter().map(|m| format!("@{m}")).collect(),
            unindexed_mentions: resolution.unindexed.iter().map(|m| format!("@{m}")).collect(),
            effective_query: effective_query.clone(),
        });
    }

    let results = retrieve_with_coverage(
        &effective_query,
        &base_dir,
        settings,
        embedder.as_ref(),
        doc_ids_filter.as_deref(),
        &params,
        debug_mode.then_some(&mut trace),
    )
    .await;
    let results = match results {
        Ok(results) => results,
        Err(e) => return format!("Error during retrieval: {e}"),
    };

    if debug_mode {
        let record = serde_json::json!({
            "turn_id": ctx.rag_turn_id,
            "agent_id": ctx.agent_id,
            "query_raw": query,
            "query_effective": effective_query,
            "top_k": top_k,
            "file_type_filter": file_type_filter,
            "doc_name_filter": doc_name_filter,
            "retrieval_mode": retrieval_mode,
            "effective_top_k": params.top_k,
            "effective_router_k": params.catalog_router_k,
            "effective_vector_k": params.vector_k,
            "effective_fts_k": params.fts_k,
            "effective_max_chunks_per_doc": params.max_chunks_per_doc,
            "mentions": mentions.iter().map(|m| format!("@{m}")).collect::<Vec<String>>(),
            "doc_ids_filter_count": doc_ids_filter.as_ref().map(Vec::len),
            "preserve_doc_scope": preserve_doc_scope,
            "trace": trace,
        });
        debug::append_trace(&base_dir, &record);
    }

    if results.is_empty() {
        return format!("No results found for query: '{effective_query}'");
    }

    // --- Formatting ------------------------------------------------------
    let formatted = format_results(&results);
    match mention_note(&resolution.unresolved, &resolution.unindexed) {
        Some(note) => {
            format!("Note: some @file references were ignored ({note}).\n\n{formatted}")
        }
        None => formatted,
    }
}

/// Formats retrieval results as annotated context blocks with `[N]`
/// citations.
#[must_use]
pub fn format_results(results: &[ResultRow]) -> String {
    let mut parts = Vec::new();

    for (idx, result) in results.iter().enumerate() {
        let doc_name = if result.doc_name.is_empty() {
            "unknown"
        } else {
            &result.doc_name
        };

        let mut citation_parts = vec![doc_name.to_string()];
        match result.modality.as_str() {
            "video_transcript" => citation_parts.push("video transcript".to_string()),
            "video_frame" => citation_parts.push("video frame".to_string()),
            _ => {
                if !result.heading_path.is_empty() {
                    citation_parts.push(result.heading_path.join(" > "));
                }
            }
        }

        let mut citation = citation_parts.join(" — ");
        match &result.locator {
            Some(Locator::Lines {
                line_start,
                line_end,
            }) => {
                citation.push_str(&format!(" (lines {line_start}–{line_end})"));
            }
            Some(Locator::Time {
                time_start,
                time_end,
            }) => {
                if time_start == time_end {
                    citation.push_str(&format!(" (time {time_start})"));
                } else {
                    citation.push_str(&format!(" (time {time_start}–{time_end})"));
                }
            }
            None => {}
        }
        parts.push(format!("[{}] {citation}", idx + 1));

        if let Some(ref bundle) = result.temporal_bundle {
            for item in bundle {
                let label: String = [item.time_display.as_str(), item.modality_label.as_str()]
                    .iter()
                    .filter(|part| !part.is_empty())
                    .copied()
                    .collect::<Vec<&str>>()
                    .join(" ");
                let text = item.text.trim();
                if label.is_empty() {
                    parts.push(format!("    \"{text}\""));
                } else {
                    parts.push(format!("    {label}: \"{text}\""));
                }
            }
        } else {
            parts.push(format!("    \"{}\"", result.text.trim()));
        }
        parts.push(String::new());
    }

    parts.join("\n")
}
