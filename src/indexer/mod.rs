//! Index build and update pipeline.
//!
//! Chunk → embed → upsert for every catalog entry with a converted
//! sibling. Full builds clear the index first; incremental updates purge
//! stale chunks for modified/missing converted paths, index only
//! new/modified entries, then mark the catalog current and save it.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, FileEntry, FileStatus};
use crate::chunking::{ChunkerConfig, chunk_document, safe_resolve};
use crate::config::Settings;
use crate::embedding::{Embedder, format_chunk_for_embedding};
use crate::error::Result;
use crate::index::IndexStore;

/// Per-document indexing counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocStats {
    /// Chunks produced by the chunker.
    pub chunked: usize,
    /// Chunks newly inserted.
    pub added: usize,
    /// Chunks updated in place.
    pub updated: usize,
    /// Chunks skipped (already indexed or failed).
    pub skipped: usize,
    /// Chunks whose embedding failed.
    pub embed_failed: usize,
}

/// Aggregate report for a build or update run.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Documents processed.
    pub documents_processed: usize,
    /// Chunks inserted.
    pub chunks_added: usize,
    /// Chunks updated.
    pub chunks_updated: usize,
    /// Chunks skipped.
    pub chunks_skipped: usize,
    /// Embedding failures.
    pub embed_failures: usize,
    /// Stale chunks purged before indexing.
    pub chunks_purged: usize,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u128,
}

/// Catalog entries eligible for indexing: converted, present, and (for
/// incremental runs) new or modified.
#[must_use]
pub fn entries_to_index(catalog: &Catalog, base_dir: &Path, incremental: bool) -> Vec<FileEntry> {
    catalog
        .files()
        .values()
        .filter(|entry| {
            if entry.status == FileStatus::Missing {
                return false;
            }
            if incremental && !matches!(entry.status, FileStatus::New | FileStatus::Modified) {
                return false;
            }
            let Some(converted_to) = entry.converted_to.as_deref() else {
                return false;
            };
            safe_resolve(base_dir, converted_to).is_some_and(|p| p.exists())
        })
        .cloned()
        .collect()
}

/// Converted paths whose old chunks must be purged on incremental
/// updates: conversions (and frame files) of modified or missing
/// entries.
#[must_use]
pub fn stale_converted_paths(catalog: &Catalog, base_dir: &Path) -> Vec<String> {
    let mut stale: BTreeSet<String> = BTreeSet::new();
    for entry in catalog.files().values() {
        if !matches!(entry.status, FileStatus::Modified | FileStatus::Missing) {
            continue;
        }
        let mut candidates: Vec<&str> = Vec::new();
        if let Some(converted_to) = entry.converted_to.as_deref() {
            candidates.push(converted_to);
        }
        candidates.extend(entry.frame_descriptions.iter().map(String::as_str));
        for candidate in candidates {
            if let Some(resolved) = safe_resolve(base_dir, candidate) {
                stale.insert(crate::chunking::path_for_output(base_dir, &resolved));
            }
        }
    }
    stale.into_iter().collect()
}

/// Deletes every chunk in the index. Returns the number removed.
///
/// # Errors
///
/// Returns database errors.
pub fn clear_index(store: &mut IndexStore) -> Result<usize> {
    let existing: Vec<String> = store.existing_chunk_ids()?.into_iter().collect();
    if existing.is_empty() {
        return Ok(0);
    }
    let deleted = store.delete_chunks(&existing)?;
    info!(deleted, "cleared index");
    Ok(deleted)
}

/// Chunks, embeds, and indexes a single document.
///
/// Embedding failures skip the affected chunks and continue; the run
/// never aborts on a single document.
///
/// # Errors
///
/// Returns database errors from the upsert.
pub async fn process_document(
    entry: &FileEntry,
    base_dir: &Path,
    settings: &Settings,
    store: &mut IndexStore,
    embedder: &dyn Embedder,
    existing_chunk_ids: &mut BTreeSet<String>,
) -> Result<DocStats> {
    let mut stats = DocStats::default();
    let config = ChunkerConfig::from_settings(settings);
    let chunks = chunk_document(entry, base_dir, &config);
    stats.chunked = chunks.len();
    if chunks.is_empty() {
        return Ok(stats);
    }

    // Keep only chunks not already indexed (stable ids make this cheap).
    let mut new_chunks = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for chunk in chunks {
        if existing_chunk_ids.contains(&chunk.chunk_id) || seen.contains(&chunk.chunk_id) {
            stats.skipped += 1;
        } else {
            seen.insert(chunk.chunk_id.clone());
            new_chunks.push(chunk);
        }
    }
    if new_chunks.is_empty() {
        return Ok(stats);
    }

    debug!(doc = %entry.name, chunks = new_chunks.len(), "embedding chunks");

    let batch_size = settings.embed_batch_size.max(1);
    let mut items = Vec::with_capacity(new_chunks.len());

    for batch in new_chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(format_chunk_for_embedding).collect();
        match embedder.embed_batch(&texts).await {
            Ok(vectors) if vectors.len() == batch.len() => {
                for (chunk, vector) in batch.iter().zip(vectors) {
                    items.push((chunk.clone(), vector));
                }
            }
            Ok(vectors) => {
                warn!(
                    doc = %entry.name,
                    got = vectors.len(),
                    expected = batch.len(),
                    "embedding batch count mismatch, skipping batch"
                );
                stats.embed_failed += batch.len();
                stats.skipped += batch.len();
            }
            Err(e) => {
                warn!(doc = %entry.name, error = %e, "embedding batch failed, skipping batch");
                stats.embed_failed += batch.len();
                stats.skipped += batch.len();
            }
        }
    }

    if items.is_empty() {
        return Ok(stats);
    }

    let (inserted, updated) = store.upsert(&items)?;
    stats.added = inserted;
    stats.updated = updated;
    for (chunk, _) in &items {
        existing_chunk_ids.insert(chunk.chunk_id.clone());
    }

    Ok(stats)
}

/// Full rebuild: clears the index and re-indexes every converted
/// document, then marks the catalog current and saves it.
///
/// # Errors
///
/// Returns catalog or database errors. Individual document failures are
/// logged and skipped.
pub async fn build_index(
    base_dir: &Path,
    settings: &Settings,
    catalog: &mut Catalog,
    embedder: &dyn Embedder,
) -> Result<BuildReport> {
    let started = Instant::now();
    let mut report = BuildReport::default();

    let entries = entries_to_index(catalog, base_dir, false);
    let mut store = IndexStore::open(base_dir)?;
    report.chunks_purged = clear_index(&mut store)?;

    let mut existing_chunk_ids = BTreeSet::new();
    for entry in &entries {
        let stats = process_document(
            entry,
            base_dir,
            settings,
            &mut store,
            embedder,
            &mut existing_chunk_ids,
        )
        .await?;
        report.documents_processed += 1;
        report.chunks_added += stats.added;
        report.chunks_updated += stats.updated;
        report.chunks_skipped += stats.skipped;
        report.embed_failures += stats.embed_failed;
    }

    finish_run(base_dir, catalog, &store);
    report.duration_ms = started.elapsed().as_millis();
    Ok(report)
}

/// Incremental update: purges stale chunks for modified/missing
/// converted paths, indexes new/modified entries, then marks the
/// catalog current and saves it.
///
/// # Errors
///
/// Returns catalog or database errors.
pub async fn update_index(
    base_dir: &Path,
    settings: &Settings,
    catalog: &mut Catalog,
    embedder: &dyn Embedder,
) -> Result<BuildReport> {
    let started = Instant::now();
    let mut report = BuildReport::default();
    let mut store = IndexStore::open(base_dir)?;

    let stale_paths = stale_converted_paths(catalog, base_dir);
    if !stale_paths.is_empty() {
        let stale_ids: Vec<String> = store
            .chunk_ids_by_converted_paths(&stale_paths)?
            .into_iter()
            .collect();
        report.chunks_purged = store.delete_chunks(&stale_ids)?;
        debug!(purged = report.chunks_purged, "purged stale chunks");
    }

    let entries = entries_to_index(catalog, base_dir, true);
    let mut existing_chunk_ids = store.existing_chunk_ids()?;
    for entry in &entries {
        let stats = process_document(
            entry,
            base_dir,
            settings,
            &mut store,
            embedder,
            &mut existing_chunk_ids,
        )
        .await?;
        report.documents_processed += 1;
        report.chunks_added += stats.added;
        report.chunks_updated += stats.updated;
        report.chunks_skipped += stats.skipped;
        report.embed_failures += stats.embed_failed;
    }

    finish_run(base_dir, catalog, &store);
    report.duration_ms = started.elapsed().as_millis();
    Ok(report)
}

/// Marks the catalog current, saves it, and checks index parity.
fn finish_run(base_dir: &Path, catalog: &mut Catalog, store: &IndexStore) {
    catalog.mark_all_current();
    if let Err(e) = catalog.save(&base_dir.join(".flavia")) {
        warn!(error = %e, "failed to save updated catalog state");
    }
    match store.verify_parity() {
        Ok(true) => {}
        Ok(false) => warn!("index tables diverged after run"),
        Err(e) => warn!(error = %e, "index parity check failed"),
    }
}
