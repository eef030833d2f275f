//! Read tools: `read_file`, `list_files`, `search_files`,
//! `get_file_info`.
//!
//! Every tool resolves its path through the guard before touching the
//! filesystem and returns a UTF-8 string; failures are `Error:` strings
//! the loop treats as non-fatal.

use std::path::Path;

use serde_json::Value;

use crate::agent::context::AgentContext;
use crate::catalog::Catalog;
use crate::guard::{check_read, resolve_path};

/// Maximum matches returned by `search_files`.
const MAX_SEARCH_MATCHES: usize = 100;

fn required_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Reads the complete contents of a file.
#[must_use]
pub fn read_file(args: &Value, ctx: &AgentContext) -> String {
    let Some(path) = required_str(args, "path") else {
        return "Error: path is required".to_string();
    };
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Err(reason) = check_read(&full_path, ctx) {
        return format!("Error: {reason}");
    }
    if !full_path.exists() {
        return format!("Error: File not found: {path}");
    }
    if !full_path.is_file() {
        return format!("Error: '{path}' is not a file");
    }
    match std::fs::read(&full_path) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => format!("Error: Cannot read '{path}' - file is not valid UTF-8 text"),
        },
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            format!("Error: Permission denied reading '{path}'")
        }
        Err(e) => format!("Error reading file: {e}"),
    }
}

/// Lists a directory: subdirectories first, then files, each annotated.
#[must_use]
pub fn list_files(args: &Value, ctx: &AgentContext) -> String {
    let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Err(reason) = check_read(&full_path, ctx) {
        return format!("Error: {reason}");
    }
    if !full_path.exists() {
        return format!("Error: Directory not found: {path}");
    }
    if !full_path.is_dir() {
        return format!("Error: '{path}' is not a directory");
    }

    let Ok(read_dir) = std::fs::read_dir(&full_path) else {
        return format!("Error: Permission denied listing '{path}'");
    };
    let mut entries: Vec<(bool, String, u64)> = read_dir
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let metadata = entry.metadata().ok()?;
            Some((metadata.is_dir(), name, metadata.len()))
        })
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.to_lowercase().cmp(&b.1.to_lowercase())));

    if entries.is_empty() {
        return format!("Directory '{path}' is empty");
    }
    let mut lines = Vec::with_capacity(entries.len());
    for (is_dir, name, size) in entries {
        if is_dir {
            lines.push(format!("{name}/"));
        } else {
            lines.push(format!("{name} ({size} bytes)"));
        }
    }
    lines.join("\n")
}

fn search_dir_recursive(
    dir: &Path,
    pattern_lower: &str,
    base_dir: &Path,
    matches: &mut Vec<String>,
) {
    if matches.len() >= MAX_SEARCH_MATCHES {
        return;
    }
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<std::path::PathBuf> =
        read_dir.flatten().map(|e| e.path()).collect();
    entries.sort();
    for entry in entries {
        if matches.len() >= MAX_SEARCH_MATCHES {
            return;
        }
        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name.starts_with('.') {
            continue;
        }
        if entry.is_dir() {
            search_dir_recursive(&entry, pattern_lower, base_dir, matches);
        } else if name.to_lowercase().contains(pattern_lower) {
            let rel = entry
                .strip_prefix(base_dir)
                .map_or_else(|_| entry.display().to_string(), |p| p.display().to_string());
            matches.push(rel);
        }
    }
}

/// Searches file names by case-insensitive substring, recursively.
#[must_use]
pub fn search_files(args: &Value, ctx: &AgentContext) -> String {
    let Some(pattern) = required_str(args, "pattern") else {
        return "Error: pattern is required".to_string();
    };
    let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Err(reason) = check_read(&full_path, ctx) {
        return format!("Error: {reason}");
    }
    if !full_path.is_dir() {
        return format!("Error: Directory not found: {path}");
    }

    let mut matches = Vec::new();
    search_dir_recursive(&full_path, &pattern.to_lowercase(), &ctx.base_dir, &mut matches);

    if matches.is_empty() {
        return format!("No files matching '{pattern}'");
    }
    let mut out = format!("Found {} file(s) matching '{pattern}':\n", matches.len());
    out.push_str(&matches.join("\n"));
    if matches.len() >= MAX_SEARCH_MATCHES {
        out.push_str(&format!("\n(capped at {MAX_SEARCH_MATCHES} matches)"));
    }
    out
}

/// Returns metadata for a file, enriched from the catalog when the
/// file is cataloged.
#[must_use]
pub fn get_file_info(args: &Value, ctx: &AgentContext) -> String {
    let Some(path) = required_str(args, "path") else {
        return "Error: path is required".to_string();
    };
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Err(reason) = check_read(&full_path, ctx) {
        return format!("Error: {reason}");
    }
    if !full_path.exists() {
        return format!("Error: File not found: {path}");
    }
    let Ok(metadata) = std::fs::metadata(&full_path) else {
        return format!("Error: Cannot stat '{path}'");
    };

    let mut lines = vec![
        format!("Path: {path}"),
        format!("Size: {} bytes", metadata.len()),
        format!("Kind: {}", if metadata.is_dir() { "directory" } else { "file" }),
    ];

    let rel = full_path
        .strip_prefix(&ctx.base_dir)
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    if let Some(catalog) = Catalog::load(&ctx.base_dir.join(".flavia"))
        && let Some(entry) = catalog.files().get(&rel)
    {
        lines.push(format!("Type: {} ({})", entry.file_type.as_str(), entry.category));
        lines.push(format!("Checksum: {}", entry.checksum_sha256));
        lines.push(format!("Modified: {}", entry.modified_at));
        if let Some(ref converted) = entry.converted_to {
            lines.push(format!("Converted to: {converted}"));
        }
        if let Some(ref summary) = entry.summary {
            lines.push(format!("Summary: {summary}"));
        }
        if !entry.tags.is_empty() {
            lines.push(format!("Tags: {}", entry.tags.join(", ")));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn ctx_for(temp: &TempDir) -> AgentContext {
        AgentContext {
            base_dir: temp.path().to_path_buf(),
            ..AgentContext::default()
        }
    }

    #[test]
    fn test_read_file_roundtrip() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("a.md"), "hello vault").ok();
        let ctx = ctx_for(&temp);
        assert_eq!(read_file(&json!({"path": "a.md"}), &ctx), "hello vault");
    }

    #[test]
    fn test_read_file_errors() {
        let Ok(temp) = TempDir::new() else { return };
        let ctx = ctx_for(&temp);
        assert!(read_file(&json!({}), &ctx).starts_with("Error:"));
        assert!(read_file(&json!({"path": "missing.md"}), &ctx).starts_with("Error: File not found"));
        assert!(
            read_file(&json!({"path": "../outside.md"}), &ctx)
                .starts_with("Error: Access denied")
        );
    }

    #[test]
    fn test_read_file_rejects_binary() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("bin.dat"), [0xff, 0xfe, 0x00]).ok();
        let ctx = ctx_for(&temp);
        let result = read_file(&json!({"path": "bin.dat"}), &ctx);
        assert!(result.contains("not valid UTF-8"));
    }

    #[test]
    fn test_list_files_dirs_first() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::create_dir_all(temp.path().join("zdir")).ok();
        std::fs::write(temp.path().join("afile.md"), "x").ok();
        let ctx = ctx_for(&temp);
        let listing = list_files(&json!({"path": "."}), &ctx);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "zdir/");
        assert!(lines[1].starts_with("afile.md"));
    }

    #[test]
    fn test_search_files_recursive() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::create_dir_all(temp.path().join("docs")).ok();
        std::fs::write(temp.path().join("docs/report_final.pdf"), "x").ok();
        std::fs::write(temp.path().join("other.txt"), "x").ok();
        let ctx = ctx_for(&temp);
        let result = search_files(&json!({"pattern": "report"}), &ctx);
        assert!(result.contains("docs/report_final.pdf"));
        assert!(!result.contains("other.txt"));
    }

    #[test]
    fn test_get_file_info_with_catalog() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("paper.pdf"), b"%PDF").ok();
        let mut catalog = Catalog::new(temp.path());
        catalog.build(&[]).ok();
        if let Some(entry) = catalog.entry_mut("paper.pdf") {
            entry.summary = Some("A short paper".to_string());
        }
        catalog.save(&temp.path().join(".flavia")).ok();

        let ctx = ctx_for(&temp);
        let info = get_file_info(&json!({"path": "paper.pdf"}), &ctx);
        assert!(info.contains("Type: binary_document (pdf)"));
        assert!(info.contains("Summary: A short paper"));
    }
}
