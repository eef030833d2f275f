//! Catalog tools: `query_catalog`, `get_catalog_summary`,
//! `refresh_catalog`.

use serde_json::Value;

use crate::agent::context::AgentContext;
use crate::catalog::{Catalog, CatalogQuery, FileStatus, FileType};

fn load_catalog(ctx: &AgentContext) -> std::result::Result<Catalog, String> {
    Catalog::load(&ctx.base_dir.join(".flavia")).ok_or_else(|| {
        "Error: No content catalog found. Run 'flavia-rs init' to build the catalog.".to_string()
    })
}

fn parse_file_type(value: &str) -> Option<FileType> {
    match value {
        "text" => Some(FileType::Text),
        "binary_document" => Some(FileType::BinaryDocument),
        "image" => Some(FileType::Image),
        "audio" => Some(FileType::Audio),
        "video" => Some(FileType::Video),
        "archive" => Some(FileType::Archive),
        "other" => Some(FileType::Other),
        _ => None,
    }
}

fn parse_status(value: &str) -> Option<FileStatus> {
    match value {
        "current" => Some(FileStatus::Current),
        "new" => Some(FileStatus::New),
        "modified" => Some(FileStatus::Modified),
        "missing" => Some(FileStatus::Missing),
        _ => None,
    }
}

/// Queries the catalog with the filters of the catalog API.
#[must_use]
pub fn query_catalog(args: &Value, ctx: &AgentContext) -> String {
    let catalog = match load_catalog(ctx) {
        Ok(catalog) => catalog,
        Err(error) => return error,
    };

    let mut query = CatalogQuery {
        name: args.get("name").and_then(Value::as_str).map(ToString::to_string),
        extension: args
            .get("extension")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        category: args
            .get("category")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        has_summary: args.get("has_summary").and_then(Value::as_bool),
        has_conversion: args.get("has_conversion").and_then(Value::as_bool),
        text_search: args
            .get("text_search")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        ..CatalogQuery::default()
    };
    if let Some(raw) = args.get("file_type").and_then(Value::as_str) {
        let Some(file_type) = parse_file_type(raw) else {
            return format!("Error: unknown file_type '{raw}'");
        };
        query.file_type = Some(file_type);
    }
    if let Some(raw) = args.get("status").and_then(Value::as_str) {
        let Some(status) = parse_status(raw) else {
            return format!("Error: unknown status '{raw}'");
        };
        query.status = Some(status);
    }
    #[allow(clippy::cast_possible_truncation)]
    if let Some(limit) = args.get("limit").and_then(Value::as_u64) {
        query.limit = limit as usize;
    }

    let results = catalog.query(&query);
    if results.is_empty() {
        return "No catalog entries match the filters.".to_string();
    }

    let mut lines = vec![format!("{} entries:", results.len())];
    for entry in results {
        let mut line = format!(
            "- {} [{} | {} | {} bytes]",
            entry.path,
            entry.file_type.as_str(),
            entry.category,
            entry.size_bytes
        );
        if entry.converted_to.is_some() {
            line.push_str(" (converted)");
        }
        if let Some(ref summary) = entry.summary {
            line.push_str(&format!(" - {summary}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Returns the compact catalog overview used in the system prompt.
#[must_use]
pub fn get_catalog_summary(args: &Value, ctx: &AgentContext) -> String {
    let catalog = match load_catalog(ctx) {
        Ok(catalog) => catalog,
        Err(error) => return error,
    };
    #[allow(clippy::cast_possible_truncation)]
    let max_length = args
        .get("max_length")
        .and_then(Value::as_u64)
        .map_or(2000, |v| v as usize);
    catalog.generate_context_summary(max_length)
}

/// Rescans the base directory and persists the refreshed catalog.
#[must_use]
pub fn refresh_catalog(_args: &Value, ctx: &AgentContext) -> String {
    let mut catalog = match load_catalog(ctx) {
        Ok(catalog) => catalog,
        Err(error) => return error,
    };
    let summary = match catalog.update() {
        Ok(summary) => summary,
        Err(e) => return format!("Error: Catalog update failed: {e}"),
    };
    if let Err(e) = catalog.save(&ctx.base_dir.join(".flavia")) {
        return format!("Error: Catalog save failed: {e}");
    }

    let mut lines = vec![format!(
        "Catalog refreshed: {} new, {} modified, {} missing, {} unchanged.",
        summary.new.len(),
        summary.modified.len(),
        summary.missing.len(),
        summary.unchanged.len()
    )];
    if !summary.new.is_empty() {
        lines.push(format!("New: {}", summary.new.join(", ")));
    }
    if !summary.modified.is_empty() {
        lines.push(format!("Modified: {}", summary.modified.join(", ")));
    }
    if !summary.missing.is_empty() {
        lines.push(format!("Missing: {}", summary.missing.join(", ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn seeded_ctx() -> Option<(TempDir, AgentContext)> {
        let temp = TempDir::new().ok()?;
        std::fs::write(temp.path().join("paper.pdf"), b"%PDF").ok()?;
        std::fs::write(temp.path().join("notes.md"), "# Notes").ok()?;
        let mut catalog = Catalog::new(temp.path());
        catalog.build(&[]).ok()?;
        catalog.save(&temp.path().join(".flavia")).ok()?;
        let ctx = AgentContext {
            base_dir: temp.path().to_path_buf(),
            ..AgentContext::default()
        };
        Some((temp, ctx))
    }

    #[test]
    fn test_query_catalog_by_type() {
        let Some((_temp, ctx)) = seeded_ctx() else { return };
        let result = query_catalog(&json!({"file_type": "binary_document"}), &ctx);
        assert!(result.contains("paper.pdf"));
        assert!(!result.contains("notes.md"));
    }

    #[test]
    fn test_query_catalog_unknown_type() {
        let Some((_temp, ctx)) = seeded_ctx() else { return };
        assert!(query_catalog(&json!({"file_type": "hologram"}), &ctx).starts_with("Error:"));
    }

    #[test]
    fn test_query_catalog_missing_catalog() {
        let Ok(temp) = TempDir::new() else { return };
        let ctx = AgentContext {
            base_dir: temp.path().to_path_buf(),
            ..AgentContext::default()
        };
        assert!(query_catalog(&json!({}), &ctx).starts_with("Error: No content catalog"));
    }

    #[test]
    fn test_get_catalog_summary() {
        let Some((_temp, ctx)) = seeded_ctx() else { return };
        let summary = get_catalog_summary(&json!({}), &ctx);
        assert!(summary.contains("2 files"));
    }

    #[test]
    fn test_refresh_catalog_reports_delta() {
        let Some((temp, ctx)) = seeded_ctx() else { return };
        std::fs::write(temp.path().join("fresh.md"), "new").ok();
        let result = refresh_catalog(&json!({}), &ctx);
        assert!(result.contains("1 new"));
        assert!(result.contains("fresh.md"));
    }
}
