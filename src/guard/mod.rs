//! Path guard: resolution and permission checks for every tool access.
//!
//! All tools consult this module before touching the filesystem or the
//! index. Checks are layered: the `.converted/` access policy runs first
//! for paths under `base_dir/.converted/`, then the general read/write
//! permission policy.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent::context::AgentContext;
use crate::agent::message::ChatMessage;

/// How many trailing messages to scan for a prior `search_chunks` call
/// when applying the hybrid converted-access policy.
const SEARCH_CHUNKS_LOOKBACK: usize = 24;

/// Access policy for content under `base_dir/.converted/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertedAccessMode {
    /// Never readable directly; retrieval is the only path to evidence.
    Strict,
    /// Readable only after a recent successful `search_chunks` call.
    #[default]
    Hybrid,
    /// Always readable.
    Open,
}

impl ConvertedAccessMode {
    /// Parses a mode string from configuration.
    ///
    /// # Errors
    ///
    /// Returns the offending value when it is not one of
    /// `strict`, `hybrid`, `open`.
    pub fn parse(value: &str) -> std::result::Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "hybrid" => Ok(Self::Hybrid),
            "open" => Ok(Self::Open),
            other => Err(format!(
                "converted_access_mode must be one of: strict, hybrid, open (got {other:?})"
            )),
        }
    }
}

/// Read/write scopes for an agent.
///
/// When `explicit` is false and both lists are empty, checks fall back
/// to "inside `base_dir` → allow". An explicitly configured empty
/// permission set denies everything.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    /// Directories (or files) the agent may read.
    pub read_paths: Vec<PathBuf>,
    /// Directories (or files) the agent may write. Write implies read.
    pub write_paths: Vec<PathBuf>,
    /// True when permissions were explicitly configured, even if empty.
    pub explicit: bool,
}

impl Permissions {
    /// Full read/write access to a base directory.
    #[must_use]
    pub fn for_base_dir(base_dir: &Path) -> Self {
        let resolved = normalize_path(base_dir);
        Self {
            read_paths: vec![resolved.clone()],
            write_paths: vec![resolved],
            explicit: false,
        }
    }

    /// True when the path has a read or write scope as ancestor.
    #[must_use]
    pub fn can_read(&self, path: &Path) -> bool {
        let resolved = normalize_path(path);
        self.read_paths
            .iter()
            .chain(self.write_paths.iter())
            .any(|allowed| resolved.starts_with(normalize_path(allowed)))
    }

    /// True when the path has a write scope as ancestor.
    #[must_use]
    pub fn can_write(&self, path: &Path) -> bool {
        let resolved = normalize_path(path);
        self.write_paths
            .iter()
            .any(|allowed| resolved.starts_with(normalize_path(allowed)))
    }
}

/// Resolves a path string relative to `base_dir` unless absolute, then
/// normalizes it lexically (`.` and `..` components removed).
///
/// Lexical normalization keeps the check deterministic for paths that do
/// not exist yet (write targets).
#[must_use]
pub fn resolve_path(path: &str, base_dir: &Path) -> PathBuf {
    let candidate = Path::new(path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };
    normalize_path(&joined)
}

/// Lexically normalizes a path: drops `.`, resolves `..` against the
/// accumulated prefix, preserves the root.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// True when `path` lies inside `base_dir/.converted/`.
#[must_use]
pub fn is_in_converted_dir(path: &Path, base_dir: &Path) -> bool {
    let converted = normalize_path(&base_dir.join(".converted"));
    normalize_path(path).starts_with(converted)
}

fn has_recent_search_chunks_call(messages: &[ChatMessage]) -> bool {
    messages
        .iter()
        .rev()
        .take(SEARCH_CHUNKS_LOOKBACK)
        .any(|msg| msg.tool_calls.iter().any(|tc| tc.name == "search_chunks"))
}

fn search_chunks_is_available(ctx: &AgentContext) -> bool {
    if !ctx.available_tools.is_empty()
        && !ctx.available_tools.iter().any(|t| t == "search_chunks")
    {
        return false;
    }
    ctx.base_dir.join(".index").join("index.db").exists()
}

/// Applies the converted-content access policy. Returns `Err(reason)`
/// when access must be denied.
fn check_converted_access_policy(
    path: &Path,
    ctx: &AgentContext,
) -> std::result::Result<(), String> {
    if !is_in_converted_dir(path, &ctx.base_dir) {
        return Ok(());
    }

    match ctx.converted_access_mode {
        ConvertedAccessMode::Open => Ok(()),
        ConvertedAccessMode::Hybrid => {
            if !search_chunks_is_available(ctx) {
                // No usable retrieval path in this context: allow direct fallback.
                return Ok(());
            }
            if has_recent_search_chunks_call(&ctx.messages) {
                return Ok(());
            }
            Err(
                "Access denied - direct '.converted/' access in hybrid mode requires a prior \
                 'search_chunks' call. Run search_chunks first, then retry. \
                 For unrestricted direct access, set converted_access_mode: open."
                    .to_string(),
            )
        }
        ConvertedAccessMode::Strict => Err(
            "Access denied - direct '.converted/' access is disabled \
             (converted_access_mode: strict). Use 'search_chunks' for content retrieval, \
             or set converted_access_mode: hybrid/open."
                .to_string(),
        ),
    }
}

/// Checks read access for a resolved path.
///
/// Returns `Err(reason)` on denial; the tool layer turns the reason into
/// an `Error: ...` result string.
pub fn check_read(path: &Path, ctx: &AgentContext) -> std::result::Result<(), String> {
    check_converted_access_policy(path, ctx)?;

    // If no explicit permissions are configured, fall back to base_dir check.
    if !ctx.permissions.explicit
        && ctx.permissions.read_paths.is_empty()
        && ctx.permissions.write_paths.is_empty()
    {
        if normalize_path(path).starts_with(normalize_path(&ctx.base_dir)) {
            return Ok(());
        }
        return Err("Access denied - path is outside allowed directory".to_string());
    }

    if ctx.permissions.can_read(path) {
        return Ok(());
    }

    let allowed: Vec<&PathBuf> = ctx
        .permissions
        .read_paths
        .iter()
        .chain(ctx.permissions.write_paths.iter())
        .collect();
    if allowed.is_empty() {
        return Err("Access denied - no read permissions configured".to_string());
    }
    Err(format!(
        "Access denied - path is outside allowed directories: {}",
        format_path_list(&allowed)
    ))
}

/// Checks write access for a resolved path.
///
/// Returns `Err(reason)` on denial.
pub fn check_write(path: &Path, ctx: &AgentContext) -> std::result::Result<(), String> {
    // If no explicit permissions are configured, fall back to base_dir check.
    if !ctx.permissions.explicit
        && ctx.permissions.read_paths.is_empty()
        && ctx.permissions.write_paths.is_empty()
    {
        if normalize_path(path).starts_with(normalize_path(&ctx.base_dir)) {
            return Ok(());
        }
        return Err("Write access denied - path is outside allowed directory".to_string());
    }

    if ctx.permissions.can_write(path) {
        return Ok(());
    }

    if ctx.permissions.write_paths.is_empty() {
        return Err("Write access denied - no write permissions configured".to_string());
    }
    let allowed: Vec<&PathBuf> = ctx.permissions.write_paths.iter().collect();
    Err(format!(
        "Write access denied - allowed write directories: {}",
        format_path_list(&allowed)
    ))
}

fn format_path_list(paths: &[&PathBuf]) -> String {
    let mut shown: Vec<String> = paths
        .iter()
        .take(3)
        .map(|p| p.display().to_string())
        .collect();
    if paths.len() > 3 {
        shown.push(format!("and {} more", paths.len() - 3));
    }
    shown.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::assistant_tool_calls_message;
    use crate::agent::tool::ToolCall;

    fn test_context(base_dir: &Path) -> AgentContext {
        AgentContext {
            base_dir: base_dir.to_path_buf(),
            available_tools: vec!["search_chunks".to_string(), "read_file".to_string()],
            ..AgentContext::default()
        }
    }

    fn search_chunks_call() -> ChatMessage {
        assistant_tool_calls_message(vec![ToolCall {
            id: "call_1".to_string(),
            name: "search_chunks".to_string(),
            arguments: r#"{"query":"test"}"#.to_string(),
        }])
    }

    #[test]
    fn test_resolve_relative() {
        let base = Path::new("/vault");
        assert_eq!(resolve_path("notes/a.md", base), PathBuf::from("/vault/notes/a.md"));
    }

    #[test]
    fn test_resolve_absolute() {
        let base = Path::new("/vault");
        assert_eq!(resolve_path("/etc/hosts", base), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_normalize_parent_components() {
        let base = Path::new("/vault");
        assert_eq!(
            resolve_path("notes/../../etc/passwd", base),
            PathBuf::from("/etc/passwd")
        );
    }

    #[test]
    fn test_is_in_converted_dir() {
        let base = Path::new("/vault");
        assert!(is_in_converted_dir(Path::new("/vault/.converted/a.md"), base));
        assert!(!is_in_converted_dir(Path::new("/vault/a.md"), base));
        assert!(!is_in_converted_dir(Path::new("/other/.converted/a.md"), base));
    }

    #[test]
    fn test_default_permissions_base_dir_fallback() {
        let base = Path::new("/vault");
        let ctx = test_context(base);
        assert!(check_read(Path::new("/vault/notes/a.md"), &ctx).is_ok());
        assert!(check_read(Path::new("/etc/passwd"), &ctx).is_err());
        assert!(check_write(Path::new("/vault/out.md"), &ctx).is_ok());
        assert!(check_write(Path::new("/tmp/out.md"), &ctx).is_err());
    }

    #[test]
    fn test_traversal_escape_denied() {
        let base = Path::new("/vault");
        let ctx = test_context(base);
        let escaped = resolve_path("notes/../../etc/passwd", base);
        assert!(check_read(&escaped, &ctx).is_err());
    }

    #[test]
    fn test_explicit_empty_permissions_deny_all() {
        let base = Path::new("/vault");
        let mut ctx = test_context(base);
        ctx.permissions = Permissions {
            read_paths: vec![],
            write_paths: vec![],
            explicit: true,
        };
        assert!(check_read(Path::new("/vault/a.md"), &ctx).is_err());
        assert!(check_write(Path::new("/vault/a.md"), &ctx).is_err());
    }

    #[test]
    fn test_write_implies_read() {
        let base = Path::new("/vault");
        let mut ctx = test_context(base);
        ctx.permissions = Permissions {
            read_paths: vec![],
            write_paths: vec![PathBuf::from("/vault/out")],
            explicit: true,
        };
        let path = Path::new("/vault/out/report.md");
        assert!(check_write(path, &ctx).is_ok());
        // Permission round-trip: writable paths are readable.
        assert!(check_read(path, &ctx).is_ok());
    }

    #[test]
    fn test_strict_mode_denies_converted() {
        let base = Path::new("/vault");
        let mut ctx = test_context(base);
        ctx.converted_access_mode = ConvertedAccessMode::Strict;
        let err = check_read(Path::new("/vault/.converted/paper.md"), &ctx);
        assert!(err.is_err());
        let reason = err.err().unwrap_or_default();
        assert!(reason.contains("search_chunks"));
    }

    #[test]
    fn test_open_mode_allows_converted() {
        let base = Path::new("/vault");
        let mut ctx = test_context(base);
        ctx.converted_access_mode = ConvertedAccessMode::Open;
        assert!(check_read(Path::new("/vault/.converted/paper.md"), &ctx).is_ok());
    }

    #[test]
    fn test_hybrid_mode_without_index_allows() {
        // No .index/index.db exists under this base_dir, so hybrid mode
        // cannot demand retrieval and falls back to allowing the read.
        let temp = tempfile::tempdir().ok();
        let Some(temp) = temp else { return };
        let mut ctx = test_context(temp.path());
        ctx.converted_access_mode = ConvertedAccessMode::Hybrid;
        let path = temp.path().join(".converted/paper.md");
        assert!(check_read(&path, &ctx).is_ok());
    }

    #[test]
    fn test_hybrid_mode_requires_recent_search() {
        let Ok(temp) = tempfile::tempdir() else { return };
        std::fs::create_dir_all(temp.path().join(".index")).ok();
        std::fs::write(temp.path().join(".index/index.db"), b"").ok();

        let mut ctx = test_context(temp.path());
        ctx.converted_access_mode = ConvertedAccessMode::Hybrid;
        let path = temp.path().join(".converted/paper.md");

        // Denied before any search_chunks call appears in the transcript.
        assert!(check_read(&path, &ctx).is_err());

        // Allowed once a search_chunks tool call is present.
        ctx.messages.push(search_chunks_call());
        assert!(check_read(&path, &ctx).is_ok());
    }

    #[test]
    fn test_hybrid_lookback_window() {
        let Ok(temp) = tempfile::tempdir() else { return };
        std::fs::create_dir_all(temp.path().join(".index")).ok();
        std::fs::write(temp.path().join(".index/index.db"), b"").ok();

        let mut ctx = test_context(temp.path());
        ctx.converted_access_mode = ConvertedAccessMode::Hybrid;
        ctx.messages.push(search_chunks_call());
        // Push the search call out of the 24-message lookback window.
        for _ in 0..SEARCH_CHUNKS_LOOKBACK {
            ctx.messages
                .push(crate::agent::message::user_message("filler"));
        }
        let path = temp.path().join(".converted/paper.md");
        assert!(check_read(&path, &ctx).is_err());
    }

    #[test]
    fn test_converted_mode_parse() {
        assert_eq!(ConvertedAccessMode::parse("strict").ok(), Some(ConvertedAccessMode::Strict));
        assert_eq!(ConvertedAccessMode::parse("Hybrid").ok(), Some(ConvertedAccessMode::Hybrid));
        assert_eq!(ConvertedAccessMode::parse("OPEN").ok(), Some(ConvertedAccessMode::Open));
        assert!(ConvertedAccessMode::parse("loose").is_err());
    }
}
