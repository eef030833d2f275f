//! Write tools: `write_file`, `edit_file`, `insert_text`,
//! `append_file`, `delete_file`, `create_directory`,
//! `remove_directory`.
//!
//! Every destructive operation resolves through the guard, asks the
//! confirmation handler, and snapshots the target into
//! `.flavia/file_backups/` first. A denied confirmation returns
//! `Operation cancelled by user`; dry-run contexts preview instead of
//! writing.

use std::path::Path;

use serde_json::Value;

use crate::agent::context::AgentContext;
use crate::guard::{check_write, resolve_path};

use super::backup::backup_file;

fn required_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Asks the context's confirmation handler. `None` auto-approves.
fn confirmed(ctx: &AgentContext, description: &str) -> bool {
    ctx.confirm.as_ref().is_none_or(|confirm| confirm(description))
}

fn guard_write(path: &Path, ctx: &AgentContext) -> Option<String> {
    check_write(path, ctx).err().map(|reason| format!("Error: {reason}"))
}

fn snapshot(ctx: &AgentContext, path: &Path) -> Option<String> {
    backup_file(&ctx.base_dir, path)
        .err()
        .map(|reason| format!("Error: Backup failed for '{}': {reason}", path.display()))
}

/// Writes (or overwrites) a file with the given content.
#[must_use]
pub fn write_file(args: &Value, ctx: &AgentContext) -> String {
    let Some(path) = required_str(args, "path").filter(|p| !p.is_empty()) else {
        return "Error: path is required".to_string();
    };
    let Some(content) = required_str(args, "content") else {
        return "Error: content is required".to_string();
    };
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Some(error) = guard_write(&full_path, ctx) {
        return error;
    }
    if ctx.dry_run {
        return format!("[dry-run] Would write {} bytes to '{path}'", content.len());
    }
    if !confirmed(ctx, &format!("write {} bytes to '{path}'", content.len())) {
        return "Operation cancelled by user".to_string();
    }
    if let Some(error) = snapshot(ctx, &full_path) {
        return error;
    }
    if let Some(parent) = full_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        return format!("Error: Cannot create parent directory: {e}");
    }
    match std::fs::write(&full_path, content) {
        Ok(()) => format!("Wrote {} bytes to '{path}'", content.len()),
        Err(e) => format!("Error writing file: {e}"),
    }
}

/// Replaces the first occurrence of `old_text` with `new_text`.
#[must_use]
pub fn edit_file(args: &Value, ctx: &AgentContext) -> String {
    let Some(path) = required_str(args, "path").filter(|p| !p.is_empty()) else {
        return "Error: path is required".to_string();
    };
    let Some(old_text) = required_str(args, "old_text").filter(|t| !t.is_empty()) else {
        return "Error: old_text is required".to_string();
    };
    let Some(new_text) = required_str(args, "new_text") else {
        return "Error: new_text is required".to_string();
    };
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Some(error) = guard_write(&full_path, ctx) {
        return error;
    }
    let Ok(content) = std::fs::read_to_string(&full_path) else {
        return format!("Error: File not found: {path}");
    };
    let Some(position) = content.find(old_text) else {
        return format!("Error: old_text not found in '{path}'");
    };
    if ctx.dry_run {
        return format!("[dry-run] Would replace text at byte {position} in '{path}'");
    }
    if !confirmed(ctx, &format!("edit '{path}' (replace {} chars)", old_text.len())) {
        return "Operation cancelled by user".to_string();
    }
    if let Some(error) = snapshot(ctx, &full_path) {
        return error;
    }
    let updated = content.replacen(old_text, new_text, 1);
    match std::fs::write(&full_path, updated) {
        Ok(()) => format!("Edited '{path}'"),
        Err(e) => format!("Error writing file: {e}"),
    }
}

/// Inserts text at a 1-indexed line number (append when beyond EOF).
#[must_use]
pub fn insert_text(args: &Value, ctx: &AgentContext) -> String {
    let Some(path) = required_str(args, "path").filter(|p| !p.is_empty()) else {
        return "Error: path is required".to_string();
    };
    let Some(text) = required_str(args, "text") else {
        return "Error: text is required".to_string();
    };
    let Some(line_number) = args.get("line_number").and_then(Value::as_u64) else {
        return "Error: line_number must be a positive integer".to_string();
    };
    if line_number == 0 {
        return "Error: line_number must be a positive integer".to_string();
    }
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Some(error) = guard_write(&full_path, ctx) {
        return error;
    }
    let Ok(content) = std::fs::read_to_string(&full_path) else {
        return format!("Error: File not found: {path}");
    };
    if ctx.dry_run {
        return format!("[dry-run] Would insert text at line {line_number} of '{path}'");
    }
    if !confirmed(ctx, &format!("insert text at line {line_number} of '{path}'")) {
        return "Operation cancelled by user".to_string();
    }
    if let Some(error) = snapshot(ctx, &full_path) {
        return error;
    }

    let mut lines: Vec<&str> = content.lines().collect();
    #[allow(clippy::cast_possible_truncation)]
    let index = ((line_number - 1) as usize).min(lines.len());
    lines.insert(index, text);
    let mut updated = lines.join("\n");
    if content.ends_with('\n') {
        updated.push('\n');
    }
    match std::fs::write(&full_path, updated) {
        Ok(()) => format!("Inserted text at line {line_number} of '{path}'"),
        Err(e) => format!("Error writing file: {e}"),
    }
}

/// Appends content to a file, creating it when absent.
#[must_use]
pub fn append_file(args: &Value, ctx: &AgentContext) -> String {
    let Some(path) = required_str(args, "path").filter(|p| !p.is_empty()) else {
        return "Error: path is required".to_string();
    };
    let Some(content) = required_str(args, "content") else {
        return "Error: content is required".to_string();
    };
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Some(error) = guard_write(&full_path, ctx) {
        return error;
    }
    if ctx.dry_run {
        return format!("[dry-run] Would append {} bytes to '{path}'", content.len());
    }
    if !confirmed(ctx, &format!("append {} bytes to '{path}'", content.len())) {
        return "Operation cancelled by user".to_string();
    }
    if let Some(error) = snapshot(ctx, &full_path) {
        return error;
    }
    let existing = std::fs::read_to_string(&full_path).unwrap_or_default();
    let updated = format!("{existing}{content}");
    match std::fs::write(&full_path, updated) {
        Ok(()) => format!("Appended {} bytes to '{path}'", content.len()),
        Err(e) => format!("Error writing file: {e}"),
    }
}

/// Deletes a file (after backup).
#[must_use]
pub fn delete_file(args: &Value, ctx: &AgentContext) -> String {
    let Some(path) = required_str(args, "path").filter(|p| !p.is_empty()) else {
        return "Error: path is required".to_string();
    };
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Some(error) = guard_write(&full_path, ctx) {
        return error;
    }
    if !full_path.is_file() {
        return format!("Error: File not found: {path}");
    }
    if ctx.dry_run {
        return format!("[dry-run] Would delete '{path}'");
    }
    if !confirmed(ctx, &format!("delete '{path}'")) {
        return "Operation cancelled by user".to_string();
    }
    if let Some(error) = snapshot(ctx, &full_path) {
        return error;
    }
    match std::fs::remove_file(&full_path) {
        Ok(()) => format!("Deleted '{path}'"),
        Err(e) => format!("Error deleting file: {e}"),
    }
}

/// Creates a directory (and parents).
#[must_use]
pub fn create_directory(args: &Value, ctx: &AgentContext) -> String {
    let Some(path) = required_str(args, "path").filter(|p| !p.is_empty()) else {
        return "Error: path is required".to_string();
    };
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Some(error) = guard_write(&full_path, ctx) {
        return error;
    }
    if full_path.exists() {
        return format!("Error: '{path}' already exists");
    }
    if ctx.dry_run {
        return format!("[dry-run] Would create directory '{path}'");
    }
    if !confirmed(ctx, &format!("create directory '{path}'")) {
        return "Operation cancelled by user".to_string();
    }
    match std::fs::create_dir_all(&full_path) {
        Ok(()) => format!("Created directory '{path}'"),
        Err(e) => format!("Error creating directory: {e}"),
    }
}

/// Removes a directory. Non-empty directories require
/// `recursive: true`.
#[must_use]
pub fn remove_directory(args: &Value, ctx: &AgentContext) -> String {
    let Some(path) = required_str(args, "path").filter(|p| !p.is_empty()) else {
        return "Error: path is required".to_string();
    };
    let recursive = args.get("recursive").and_then(Value::as_bool).unwrap_or(false);
    let full_path = resolve_path(path, &ctx.base_dir);
    if let Some(error) = guard_write(&full_path, ctx) {
        return error;
    }
    if !full_path.is_dir() {
        return format!("Error: Directory not found: {path}");
    }
    let is_empty = std::fs::read_dir(&full_path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if !is_empty && !recursive {
        return format!("Error: Directory '{path}' is not empty (pass recursive: true)");
    }
    if ctx.dry_run {
        return format!("[dry-run] Would remove directory '{path}'");
    }
    if !confirmed(ctx, &format!("remove directory '{path}'")) {
        return "Operation cancelled by user".to_string();
    }
    let result = if recursive {
        std::fs::remove_dir_all(&full_path)
    } else {
        std::fs::remove_dir(&full_path)
    };
    match result {
        Ok(()) => format!("Removed directory '{path}'"),
        Err(e) => format!("Error removing directory: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    fn ctx_for(temp: &TempDir) -> AgentContext {
        AgentContext {
            base_dir: temp.path().to_path_buf(),
            ..AgentContext::default()
        }
    }

    #[test]
    fn test_write_and_backup() {
        let Ok(temp) = TempDir::new() else { return };
        let ctx = ctx_for(&temp);
        std::fs::write(temp.path().join("a.md"), "old").ok();

        let result = write_file(&json!({"path": "a.md", "content": "new"}), &ctx);
        assert!(result.starts_with("Wrote"));
        assert_eq!(
            std::fs::read_to_string(temp.path().join("a.md")).unwrap_or_default(),
            "new"
        );
        // The previous content was snapshotted.
        let backups = temp.path().join(".flavia/file_backups");
        assert!(backups.exists());
    }

    #[test]
    fn test_write_denied_by_confirmation() {
        let Ok(temp) = TempDir::new() else { return };
        let mut ctx = ctx_for(&temp);
        ctx.confirm = Some(Arc::new(|_| false));
        let result = write_file(&json!({"path": "a.md", "content": "new"}), &ctx);
        assert_eq!(result, "Operation cancelled by user");
        assert!(!temp.path().join("a.md").exists());
    }

    #[test]
    fn test_confirmation_receives_description() {
        let Ok(temp) = TempDir::new() else { return };
        let asked = Arc::new(AtomicBool::new(false));
        let asked_clone = Arc::clone(&asked);
        let mut ctx = ctx_for(&temp);
        ctx.confirm = Some(Arc::new(move |description| {
            asked_clone.store(description.contains("a.md"), Ordering::SeqCst);
            true
        }));
        let _ = write_file(&json!({"path": "a.md", "content": "x"}), &ctx);
        assert!(asked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dry_run_previews() {
        let Ok(temp) = TempDir::new() else { return };
        let mut ctx = ctx_for(&temp);
        ctx.dry_run = true;
        let result = write_file(&json!({"path": "a.md", "content": "x"}), &ctx);
        assert!(result.starts_with("[dry-run]"));
        assert!(!temp.path().join("a.md").exists());
    }

    #[test]
    fn test_edit_file_replaces_first_occurrence() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("a.md"), "one two one").ok();
        let ctx = ctx_for(&temp);
        let result = edit_file(
            &json!({"path": "a.md", "old_text": "one", "new_text": "three"}),
            &ctx,
        );
        assert_eq!(result, "Edited 'a.md'");
        assert_eq!(
            std::fs::read_to_string(temp.path().join("a.md")).unwrap_or_default(),
            "three two one"
        );
    }

    #[test]
    fn test_edit_file_missing_old_text() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("a.md"), "content").ok();
        let ctx = ctx_for(&temp);
        let result = edit_file(
            &json!({"path": "a.md", "old_text": "absent", "new_text": "x"}),
            &ctx,
        );
        assert!(result.starts_with("Error: old_text not found"));
    }

    #[test]
    fn test_insert_text_at_line() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("a.md"), "first\nsecond\n").ok();
        let ctx = ctx_for(&temp);
        let result = insert_text(
            &json!({"path": "a.md", "line_number": 2, "text": "between"}),
            &ctx,
        );
        assert!(result.starts_with("Inserted"));
        assert_eq!(
            std::fs::read_to_string(temp.path().join("a.md")).unwrap_or_default(),
            "first\nbetween\nsecond\n"
        );
    }

    #[test]
    fn test_append_creates_when_absent() {
        let Ok(temp) = TempDir::new() else { return };
        let ctx = ctx_for(&temp);
        let result = append_file(&json!({"path": "log.md", "content": "entry\n"}), &ctx);
        assert!(result.starts_with("Appended"));
        assert_eq!(
            std::fs::read_to_string(temp.path().join("log.md")).unwrap_or_default(),
            "entry\n"
        );
    }

    #[test]
    fn test_delete_file() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("a.md"), "x").ok();
        let ctx = ctx_for(&temp);
        assert_eq!(delete_file(&json!({"path": "a.md"}), &ctx), "Deleted 'a.md'");
        assert!(!temp.path().join("a.md").exists());
    }

    #[test]
    fn test_remove_directory_requires_recursive_when_nonempty() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::create_dir_all(temp.path().join("d")).ok();
        std::fs::write(temp.path().join("d/x.md"), "x").ok();
        let ctx = ctx_for(&temp);
        let result = remove_directory(&json!({"path": "d"}), &ctx);
        assert!(result.contains("not empty"));
        let result = remove_directory(&json!({"path": "d", "recursive": true}), &ctx);
        assert_eq!(result, "Removed directory 'd'");
    }

    #[test]
    fn test_write_outside_base_dir_denied() {
        let Ok(temp) = TempDir::new() else { return };
        let ctx = ctx_for(&temp);
        let result = write_file(&json!({"path": "../escape.md", "content": "x"}), &ctx);
        assert!(result.starts_with("Error: Write access denied"));
    }
}
