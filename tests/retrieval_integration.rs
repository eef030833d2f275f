//! End-to-end retrieval tests over a hermetic vault.
//!
//! A temporary vault is cataloged and indexed with the deterministic
//! hash embedder, then driven through the `search_chunks` tool surface.

#![allow(clippy::expect_used)]

use flavia_rs::agent::AgentContext;
use flavia_rs::catalog::Catalog;
use flavia_rs::chunking::{ChunkerConfig, chunk_document};
use flavia_rs::embedding::{EMBED_DIM, Embedder, HashEmbedder, format_chunk_for_embedding};
use flavia_rs::index::IndexStore;
use flavia_rs::tools::search::search_chunks;
use flavia_rs::{Settings, retrieve};
use flavia_rs::retrieval::RetrievalParams;
use serde_json::json;
use tempfile::TempDir;

const ALPHA_BODY: &str = "\
# Alpha Report

## Findings

The vendor met every latency requirement in the contract. Throughput \
was measured at twelve thousand requests per second under sustained load.

## Risks

The failover path was never exercised during the acceptance window.
";

const BETA_BODY: &str = "\
# Beta Report

## Findings

The vendor missed the latency requirement on three of five runs. \
Throughput peaked at nine thousand requests per second.

## Risks

Capacity planning assumed a workload mix that no longer matches production.
";

const TALK_TRANSCRIPT: &str = "\
# Quarterly Review

## Transcription

[00:10:05] The latency chart shows the regression clearly.
[00:10:12] We traced it to the new serialization layer.
[00:11:40] Action items are owned by the platform team.
";

/// Builds, catalogs, and indexes a vault with two reports and a video.
async fn seeded_vault() -> (TempDir, AgentContext, Settings) {
    let temp = TempDir::new().expect("temp dir");
    let base = temp.path();

    std::fs::write(base.join("alpha.pdf"), b"%PDF alpha source").expect("write alpha");
    std::fs::write(base.join("beta.pdf"), b"%PDF beta source").expect("write beta");
    std::fs::write(base.join("talk.mp4"), b"video bytes").expect("write talk");

    std::fs::create_dir_all(base.join(".converted/talk_frames")).expect("mkdir converted");
    std::fs::write(base.join(".converted/alpha.md"), ALPHA_BODY).expect("write alpha md");
    std::fs::write(base.join(".converted/beta.md"), BETA_BODY).expect("write beta md");
    std::fs::write(base.join(".converted/talk.md"), TALK_TRANSCRIPT).expect("write talk md");
    std::fs::write(
        base.join(".converted/talk_frames/frame_10m07s.md"),
        "## Frame at 00:10:07\n\n## Description\n\nA latency chart with a visible spike.\n",
    )
    .expect("write frame");

    let mut catalog = Catalog::new(base);
    catalog.build(&[]).expect("catalog build");
    catalog
        .entry_mut("alpha.pdf")
        .expect("alpha entry")
        .converted_to = Some(".converted/alpha.md".to_string());
    catalog
        .entry_mut("beta.pdf")
        .expect("beta entry")
        .converted_to = Some(".converted/beta.md".to_string());
    {
        let talk = catalog.entry_mut("talk.mp4").expect("talk entry");
        talk.converted_to = Some(".converted/talk.md".to_string());
        talk.frame_descriptions = vec![".converted/talk_frames/frame_10m07s.md".to_string()];
    }
    catalog.save(&base.join(".flavia")).expect("catalog save");

    // Index every converted document with small chunk budgets so the
    // short fixtures still produce multiple chunks.
    let settings = Settings::builder().chunk_tokens(10, 120).build();
    let config = ChunkerConfig::from_settings(&settings);
    let embedder = HashEmbedder::new(EMBED_DIM);
    let mut store = IndexStore::open(base).expect("open index");
    let entries: Vec<_> = catalog.files().values().cloned().collect();
    for entry in entries {
        let chunks = chunk_document(&entry, base, &config);
        let mut items = Vec::new();
        for chunk in chunks {
            let vector = embedder
                .embed(&format_chunk_for_embedding(&chunk))
                .await
                .expect("embed");
            items.push((chunk, vector));
        }
        if !items.is_empty() {
            store.upsert(&items).expect("upsert");
        }
    }
    assert!(store.verify_parity().expect("parity check"));

    let ctx = AgentContext {
        base_dir: base.to_path_buf(),
        ..AgentContext::default()
    };
    (temp, ctx, settings)
}

#[tokio::test]
async fn test_search_returns_cited_passages() {
    let (_temp, ctx, settings) = seeded_vault().await;
    let result = search_chunks(
        &json!({"query": "latency requirement throughput"}),
        &ctx,
        &settings,
    )
    .await;
    assert!(result.starts_with("[1] "), "expected citations, got: {result}");
    assert!(result.contains("(lines "));
    assert!(result.contains("Findings") || result.contains("Risks"));
}

#[tokio::test]
async fn test_mention_scoped_search_respects_scope() {
    let (_temp, ctx, settings) = seeded_vault().await;
    let result = search_chunks(
        &json!({"query": "@beta.pdf latency requirement"}),
        &ctx,
        &settings,
    )
    .await;
    assert!(result.contains("beta.pdf"));
    assert!(!result.contains("alpha.pdf"));
    assert!(!result.contains("talk.mp4"));
}

#[tokio::test]
async fn test_exhaustive_comparison_covers_both_docs() {
    let (_temp, ctx, settings) = seeded_vault().await;
    // "item by item" flips the retrieval profile to exhaustive; the
    // back-fill pass must surface both mentioned documents.
    let result = search_chunks(
        &json!({"query": "@alpha.pdf @beta.pdf latency item by item"}),
        &ctx,
        &settings,
    )
    .await;
    assert!(result.contains("alpha.pdf"), "missing alpha: {result}");
    assert!(result.contains("beta.pdf"), "missing beta: {result}");
}

#[tokio::test]
async fn test_video_hits_carry_temporal_bundles() {
    let (_temp, ctx, settings) = seeded_vault().await;
    let result = search_chunks(
        &json!({"query": "@talk.mp4 serialization regression"}),
        &ctx,
        &settings,
    )
    .await;
    assert!(result.contains("video transcript"), "got: {result}");
    assert!(result.contains("(Audio)"), "missing audio bundle: {result}");
    assert!(result.contains("(Screen)"), "missing screen bundle: {result}");
    // Transcripts come before frames in the bundle.
    let audio_pos = result.find("(Audio)").unwrap_or(usize::MAX);
    let screen_pos = result.find("(Screen)").unwrap_or(0);
    assert!(audio_pos < screen_pos);
}

#[tokio::test]
async fn test_empty_scope_returns_empty() {
    let (temp, _ctx, settings) = seeded_vault().await;
    let embedder = HashEmbedder::new(EMBED_DIM);
    let params = RetrievalParams::from_settings(&settings, 10);
    let rows = retrieve(
        "latency",
        temp.path(),
        &settings,
        &embedder,
        Some(&[]),
        &params,
        None,
    )
    .await
    .expect("retrieve");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_diversity_bound_holds() {
    let (temp, _ctx, settings) = seeded_vault().await;
    let embedder = HashEmbedder::new(EMBED_DIM);
    let mut params = RetrievalParams::from_settings(&settings, 20);
    params.max_chunks_per_doc = 2;
    let rows = retrieve(
        "latency requirement throughput risks",
        temp.path(),
        &settings,
        &embedder,
        None,
        &params,
        None,
    )
    .await
    .expect("retrieve");
    let mut counts = std::collections::BTreeMap::new();
    for row in &rows {
        *counts.entry(row.doc_id.clone()).or_insert(0usize) += 1;
    }
    assert!(counts.values().all(|&c| c <= 2), "diversity violated: {counts:?}");
}

#[tokio::test]
async fn test_retrieval_is_deterministic() {
    let (temp, _ctx, settings) = seeded_vault().await;
    let embedder = HashEmbedder::new(EMBED_DIM);
    let params = RetrievalParams::from_settings(&settings, 10);
    let first = retrieve(
        "latency requirement",
        temp.path(),
        &settings,
        &embedder,
        None,
        &params,
        None,
    )
    .await
    .expect("first retrieve");
    let second = retrieve(
        "latency requirement",
        temp.path(),
        &settings,
        &embedder,
        None,
        &params,
        None,
    )
    .await
    .expect("second retrieve");
    let ids = |rows: &[flavia_rs::ResultRow]| {
        rows.iter().map(|r| r.chunk_id.clone()).collect::<Vec<String>>()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn test_rag_debug_log_is_appended() {
    let (temp, ctx, settings) = seeded_vault().await;
    for _ in 0..2 {
        let _ = search_chunks(
            &json!({"query": "latency", "debug": true}),
            &ctx,
            &settings,
        )
        .await;
    }
    let log = std::fs::read_to_string(temp.path().join(".flavia/rag_debug.jsonl"))
        .expect("debug log");
    assert_eq!(log.lines().count(), 2);
    for line in log.lines() {
        let record: serde_json::Value = serde_json::from_str(line).expect("valid json");
        assert!(record.get("trace").is_some());
    }
}
