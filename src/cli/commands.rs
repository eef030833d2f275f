//! CLI command execution.
//!
//! Each command returns its output as a string; the binary handles
//! printing and exit codes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::{AgentProfile, OpenAiProvider, RecursiveAgent, RunOptions};
use crate::catalog::{Catalog, CatalogQuery, FileStatus, FileType};
use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::error::{Error, Result};
use crate::index::IndexStore;
use crate::indexer;

use super::parser::{Cli, Commands, IndexAction};

fn resolve_base_dir(cli: &Cli) -> PathBuf {
    cli.base_dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Executes the parsed CLI command.
///
/// # Errors
///
/// Returns errors for unrecoverable failures (missing catalog for
/// index operations, fatal LLM errors); per-file issues are reported in
/// the output string instead.
pub async fn execute(cli: &Cli) -> Result<String> {
    let base_dir = resolve_base_dir(cli);
    let settings = Settings::from_env();

    match &cli.command {
        Commands::Init { ignore_patterns } => init(&base_dir, ignore_patterns),
        Commands::Update => update(&base_dir),
        Commands::Index { action } => index(&base_dir, &settings, action).await,
        Commands::Ask {
            question,
            max_iterations,
            dry_run,
        } => ask(&base_dir, &settings, question, *max_iterations, *dry_run).await,
        Commands::Catalog {
            name,
            extension,
            file_type,
            status,
            text,
            limit,
        } => catalog_query(&base_dir, name, extension, file_type, status, text, *limit),
        Commands::Stats => stats(&base_dir),
    }
}

fn init(base_dir: &Path, ignore_patterns: &[String]) -> Result<String> {
    let mut catalog = Catalog::new(base_dir);
    catalog.build(ignore_patterns)?;
    let path = catalog.save(&base_dir.join(".flavia"))?;
    let stats = catalog.stats();
    Ok(format!(
        "Cataloged {} files ({} bytes) into {}\n",
        stats.total_files,
        stats.total_size_bytes,
        path.display()
    ))
}

fn update(base_dir: &Path) -> Result<String> {
    let mut catalog = require_catalog(base_dir)?;
    let summary = catalog.update()?;
    catalog.save(&base_dir.join(".flavia"))?;
    let expired_backups = crate::tools::backup::gc_backups(
        base_dir,
        crate::tools::backup::DEFAULT_BACKUP_RETENTION_DAYS,
    );
    let mut out = format!(
        "Catalog updated: {} new, {} modified, {} missing, {} unchanged\n",
        summary.new.len(),
        summary.modified.len(),
        summary.missing.len(),
        summary.unchanged.len()
    );
    if expired_backups > 0 {
        out.push_str(&format!("Expired {expired_backups} old file backups\n"));
    }
    Ok(out)
}

fn require_catalog(base_dir: &Path) -> Result<Catalog> {
    Catalog::load(&base_dir.join(".flavia")).ok_or_else(|| {
        crate::error::CatalogError::NotFound {
            path: base_dir.join(".flavia/content_catalog.json").display().to_string(),
        }
        .into()
    })
}

async fn index(base_dir: &Path, settings: &Settings, action: &IndexAction) -> Result<String> {
    match action {
        IndexAction::Build { force } => {
            if !*force {
                return Ok(
                    "This will clear the existing index and rebuild from all converted \
                     documents. Re-run with --force to proceed.\n"
                        .to_string(),
                );
            }
            let mut catalog = require_catalog(base_dir)?;
            let embedder = create_embedder(settings);
            let report =
                indexer::build_index(base_dir, settings, &mut catalog, embedder.as_ref()).await?;
            Ok(format!(
                "Indexed {} documents: {} chunks added, {} updated, {} skipped, \
                 {} embed failures ({} ms)\n",
                report.documents_processed,
                report.chunks_added,
                report.chunks_updated,
                report.chunks_skipped,
                report.embed_failures,
                report.duration_ms
            ))
        }
        IndexAction::Update => {
            let mut catalog = require_catalog(base_dir)?;
            let embedder = create_embedder(settings);
            let report =
                indexer::update_index(base_dir, settings, &mut catalog, embedder.as_ref()).await?;
            Ok(format!(
                "Updated index: {} documents, {} chunks added, {} purged, {} skipped ({} ms)\n",
                report.documents_processed,
                report.chunks_added,
                report.chunks_purged,
                report.chunks_skipped,
                report.duration_ms
            ))
        }
        IndexAction::Status => {
            if !IndexStore::exists(base_dir) {
                return Err(crate::error::IndexError::NotBuilt.into());
            }
            let store = IndexStore::open(base_dir)?;
            let stats = store.stats()?;
            let parity = store.verify_parity()?;
            Ok(format!(
                "Index: {} chunks across {} documents\nModalities: {}\nSize: {} bytes\n\
                 Last indexed: {}\nTable parity: {}\n",
                stats.chunk_count,
                stats.doc_count,
                if stats.modalities.is_empty() {
                    "-".to_string()
                } else {
                    stats.modalities.join(", ")
                },
                stats.db_size_bytes,
                stats.last_indexed_at.unwrap_or_else(|| "-".to_string()),
                if parity { "ok" } else { "MISMATCH" }
            ))
        }
    }
}

async fn ask(
    base_dir: &Path,
    settings: &Settings,
    question: &str,
    max_iterations: Option<usize>,
    dry_run: bool,
) -> Result<String> {
    settings.require_api_key()?;
    let profile = AgentProfile::load(base_dir, &settings.model)?;
    let provider = Arc::new(OpenAiProvider::new(settings));
    let mut agent = RecursiveAgent::new(settings.clone(), profile, provider, "main", 0, None);
    agent.context.rag_debug = settings.rag_debug;
    agent.context.dry_run = dry_run;
    agent.context.rag_turn_id = Some(format!(
        "turn-{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S%3f")
    ));

    let answer = agent
        .run(
            question,
            RunOptions {
                max_iterations,
                continue_from_current: false,
            },
        )
        .await?;
    Ok(format!("{answer}\n"))
}

fn parse_file_type_arg(value: &str) -> Result<FileType> {
    match value {
        "text" => Ok(FileType::Text),
        "binary_document" => Ok(FileType::BinaryDocument),
        "image" => Ok(FileType::Image),
        "audio" => Ok(FileType::Audio),
        "video" => Ok(FileType::Video),
        "archive" => Ok(FileType::Archive),
        "other" => Ok(FileType::Other),
        other => Err(Error::Config {
            message: format!("unknown file type '{other}'"),
        }),
    }
}

fn parse_status_arg(value: &str) -> Result<FileStatus> {
    match value {
        "current" => Ok(FileStatus::Current),
        "new" => Ok(FileStatus::New),
        "modified" => Ok(FileStatus::Modified),
        "missing" => Ok(FileStatus::Missing),
        other => Err(Error::Config {
            message: format!("unknown status '{other}'"),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn catalog_query(
    base_dir: &Path,
    name: &Option<String>,
    extension: &Option<String>,
    file_type: &Option<String>,
    status: &Option<String>,
    text: &Option<String>,
    limit: usize,
) -> Result<String> {
    let catalog = require_catalog(base_dir)?;
    let query = CatalogQuery {
        name: name.clone(),
        extension: extension.clone(),
        file_type: file_type.as_deref().map(parse_file_type_arg).transpose()?,
        status: status.as_deref().map(parse_status_arg).transpose()?,
        text_search: text.clone(),
        limit,
        ..CatalogQuery::default()
    };
    let results = catalog.query(&query);
    if results.is_empty() {
        return Ok("No catalog entries match the filters.\n".to_string());
    }
    let mut out = String::new();
    for entry in results {
        out.push_str(&format!(
            "{}\t{}\t{}\t{} bytes\n",
            entry.path,
            entry.file_type.as_str(),
            entry.category,
            entry.size_bytes
        ));
    }
    Ok(out)
}

fn stats(base_dir: &Path) -> Result<String> {
    let catalog = require_catalog(base_dir)?;
    let catalog_stats = catalog.stats();
    let mut out = format!(
        "Catalog: {} files, {} bytes, {} with conversion, {} with summary\n",
        catalog_stats.total_files,
        catalog_stats.total_size_bytes,
        catalog_stats.with_conversion,
        catalog_stats.with_summary
    );
    if IndexStore::exists(base_dir) {
        let store = IndexStore::open(base_dir)?;
        let index_stats = store.stats()?;
        out.push_str(&format!(
            "Index: {} chunks across {} documents\n",
            index_stats.chunk_count, index_stats.doc_count
        ));
    } else {
        out.push_str("Index: not built\n");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli_for(temp: &TempDir, args: &[&str]) -> Option<Cli> {
        let base = temp.path().display().to_string();
        let mut full = vec!["flavia-rs", "--base-dir", &base];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).ok()
    }

    #[tokio::test]
    async fn test_init_then_stats() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("a.md"), "# A").ok();

        let Some(cli) = cli_for(&temp, &["init"]) else { return };
        let output = execute(&cli).await;
        assert!(output.is_ok_and(|o| o.contains("Cataloged 1 files")));

        let Some(cli) = cli_for(&temp, &["stats"]) else { return };
        let output = execute(&cli).await;
        assert!(output.is_ok_and(|o| o.contains("Index: not built")));
    }

    #[tokio::test]
    async fn test_update_requires_catalog() {
        let Ok(temp) = TempDir::new() else { return };
        let Some(cli) = cli_for(&temp, &["update"]) else { return };
        assert!(execute(&cli).await.is_err());
    }

    #[tokio::test]
    async fn test_index_build_without_force_prompts() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("a.md"), "# A").ok();
        let Some(cli) = cli_for(&temp, &["init"]) else { return };
        execute(&cli).await.ok();

        let Some(cli) = cli_for(&temp, &["index", "build"]) else {
            return;
        };
        let output = execute(&cli).await;
        assert!(output.is_ok_and(|o| o.contains("--force")));
    }

    #[tokio::test]
    async fn test_index_build_and_status() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("paper.pdf"), b"%PDF").ok();
        std::fs::create_dir_all(temp.path().join(".converted")).ok();
        std::fs::write(
            temp.path().join(".converted/paper.md"),
            "# Paper\n\nEnough converted body text to produce at least one chunk here.",
        )
        .ok();

        let Some(cli) = cli_for(&temp, &["init"]) else { return };
        execute(&cli).await.ok();

        // Wire the conversion in by hand (converters are external).
        if let Some(mut catalog) = Catalog::load(&temp.path().join(".flavia")) {
            if let Some(entry) = catalog.entry_mut("paper.pdf") {
                entry.converted_to = Some(".converted/paper.md".to_string());
            }
            catalog.save(&temp.path().join(".flavia")).ok();
        }

        let Some(cli) = cli_for(&temp, &["index", "build", "--force"]) else {
            return;
        };
        let output = execute(&cli).await;
        assert!(output.is_ok_and(|o| o.contains("chunks added")));

        let Some(cli) = cli_for(&temp, &["index", "status"]) else {
            return;
        };
        let output = execute(&cli).await;
        assert!(output.is_ok_and(|o| o.contains("Table parity: ok")));
    }

    #[tokio::test]
    async fn test_catalog_query_filters() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("a.md"), "# A").ok();
        std::fs::write(temp.path().join("b.pdf"), b"%PDF").ok();
        let Some(cli) = cli_for(&temp, &["init"]) else { return };
        execute(&cli).await.ok();

        let Some(cli) = cli_for(&temp, &["catalog", "--file-type", "binary_document"]) else {
            return;
        };
        let output = execute(&cli).await.unwrap_or_default();
        assert!(output.contains("b.pdf"));
        assert!(!output.contains("a.md"));
    }

    #[tokio::test]
    async fn test_ask_requires_api_key() {
        let Ok(temp) = TempDir::new() else { return };
        // Only meaningful when the environment carries no key.
        if std::env::var("OPENAI_API_KEY").is_ok() || std::env::var("FLAVIA_API_KEY").is_ok() {
            return;
        }
        let Some(cli) = cli_for(&temp, &["ask", "hello"]) else { return };
        assert!(execute(&cli).await.is_err());
    }
}
