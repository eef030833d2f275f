//! Stage A: catalog router.
//!
//! Cheaply narrows Stage B to documents whose metadata is plausibly
//! relevant, using an ephemeral in-memory FTS table over per-document
//! "content cards" (path, name, types, summary, tags, source metadata).
//! When FTS5 is unavailable the router degrades to token-overlap
//! counting.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use rusqlite::Connection;

use crate::catalog::{Catalog, FileStatus};
use crate::chunking::doc_id;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"[A-Za-z0-9_-]{2,}").unwrap()
    })
}

/// Maximum distinct query tokens sent to the router FTS.
const MAX_ROUTER_TOKENS: usize = 16;

/// Extracts normalized, order-preserving deduplicated query tokens.
#[must_use]
pub fn router_tokens(question: &str) -> Vec<String> {
    let lowered = question.to_lowercase();
    let mut seen = BTreeSet::new();
    let mut tokens = Vec::new();
    for m in token_re().find_iter(&lowered) {
        let token = m.as_str().to_string();
        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }
    tokens
}

/// One row of the ephemeral router table.
#[derive(Debug, Clone)]
struct ContentCard {
    doc_id: String,
    searchable: String,
}

fn build_cards(
    catalog: &Catalog,
    base_dir: &Path,
    scope: Option<&[String]>,
) -> Vec<ContentCard> {
    let scope_set: Option<BTreeSet<&str>> =
        scope.map(|s| s.iter().map(String::as_str).collect());
    let mut cards = Vec::new();

    for entry in catalog.files().values() {
        if entry.status == FileStatus::Missing {
            continue;
        }
        // Retrieval indexes only converted sources. Skip entries that
        // cannot produce chunks to avoid over-filtering Stage B.
        if entry.converted_to.is_none() {
            continue;
        }

        let id = doc_id(base_dir, &entry.path, &entry.checksum_sha256);
        if let Some(ref scope) = scope_set
            && !scope.contains(id.as_str())
        {
            continue;
        }

        let mut parts: Vec<&str> = vec![
            &entry.path,
            &entry.name,
            entry.file_type.as_str(),
            &entry.category,
        ];
        let source_type = match entry.source_type {
            crate::catalog::SourceType::Local => "local",
            crate::catalog::SourceType::Youtube => "youtube",
            crate::catalog::SourceType::Webpage => "webpage",
        };
        parts.push(source_type);
        if let Some(ref summary) = entry.summary {
            parts.push(summary);
        }
        if let Some(ref quality) = entry.extraction_quality {
            parts.push(quality);
        }
        if let Some(ref url) = entry.source_url {
            parts.push(url);
        }
        let tags = entry.tags.join(" ");
        if !tags.is_empty() {
            parts.push(&tags);
        }
        let metadata_values: Vec<&str> =
            entry.source_metadata.values().map(String::as_str).collect();
        parts.extend(metadata_values);

        let searchable = parts
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<&str>>()
            .join(" ")
            .trim()
            .to_string();
        if !searchable.is_empty() {
            cards.push(ContentCard {
                doc_id: id,
                searchable,
            });
        }
    }

    cards
}

/// Routes a question to a doc-id shortlist using catalog metadata.
///
/// Returns:
/// - `None` - routing unavailable (catalog missing/unreadable)
/// - `Some(vec![])` - routing ran, nothing matched
/// - `Some(ids)` - shortlisted candidates (BM25 order)
#[must_use]
pub fn route_doc_ids(
    question: &str,
    base_dir: &Path,
    shortlist_k: usize,
    scope: Option<&[String]>,
) -> Option<Vec<String>> {
    if shortlist_k == 0 {
        return Some(Vec::new());
    }

    let catalog = Catalog::load(&base_dir.join(".flavia"))?;
    let cards = build_cards(&catalog, base_dir, scope);
    if cards.is_empty() {
        return Some(Vec::new());
    }

    let tokens = router_tokens(question);
    if tokens.is_empty() {
        return Some(Vec::new());
    }

    match route_with_fts(&cards, &tokens, shortlist_k) {
        Ok(shortlist) => Some(shortlist),
        // Graceful fallback: when FTS5 is unavailable, route by simple
        // token-overlap counting.
        Err(_) => Some(route_by_overlap(&cards, &tokens, shortlist_k)),
    }
}

fn route_with_fts(
    cards: &[ContentCard],
    tokens: &[String],
    shortlist_k: usize,
) -> rusqlite::Result<Vec<String>> {
    let conn = Connection::open_in_memory()?;
    conn.execute(
        r"
        CREATE VIRTUAL TABLE catalog_fts USING fts5(
            doc_id UNINDEXED,
            content,
            tokenize = 'porter unicode61'
        )
    ",
        [],
    )?;

    {
        let mut stmt = conn.prepare("INSERT INTO catalog_fts (doc_id, content) VALUES (?, ?)")?;
        for card in cards {
            stmt.execute(rusqlite::params![card.doc_id, card.searchable])?;
        }
    }

    // Query terms are quoted and OR-ed to avoid FTS syntax edge cases.
    let fts_query = tokens
        .iter()
        .take(MAX_ROUTER_TOKENS)
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<String>>()
        .join(" OR ");

    let mut stmt = conn.prepare(
        r"
        SELECT doc_id, bm25(catalog_fts) AS bm25_score
        FROM catalog_fts
        WHERE catalog_fts MATCH ?
        ORDER BY bm25_score
        LIMIT ?
    ",
    )?;
    #[allow(clippy::cast_possible_wrap)]
    let rows = stmt.query_map(rusqlite::params![fts_query, shortlist_k as i64], |row| {
        row.get::<_, String>(0)
    })?;

    let mut shortlisted = Vec::new();
    let mut seen = BTreeSet::new();
    for row in rows {
        let id = row?;
        if seen.insert(id.clone()) {
            shortlisted.push(id);
        }
    }
    Ok(shortlisted)
}

fn route_by_overlap(cards: &[ContentCard], tokens: &[String], shortlist_k: usize) -> Vec<String> {
    let token_set: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
    let mut scored: Vec<(usize, &str)> = Vec::new();
    for card in cards {
        let doc_terms: BTreeSet<String> = token_re()
            .find_iter(&card.searchable.to_lowercase())
            .map(|m| m.as_str().to_string())
            .collect();
        let overlap = doc_terms
            .iter()
            .filter(|t| token_set.contains(t.as_str()))
            .count();
        if overlap > 0 {
            scored.push((overlap, &card.doc_id));
        }
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(shortlist_k)
        .map(|(_, id)| id.to_string())
        .collect()
}
