//! Typed tool dispatch.
//!
//! Maps tool names to handlers and normalizes their results into
//! [`ToolOutcome`] values. Invalid JSON arguments become empty argument
//! objects; unknown or unavailable tools produce `Error:` strings the
//! loop treats as non-fatal.

use serde_json::Value;
use tracing::debug;

use crate::config::Settings;
use crate::tools;

use super::context::AgentContext;
use super::tool::ToolOutcome;

/// Dispatches tool calls against a context.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    settings: Settings,
}

impl ToolExecutor {
    /// Creates an executor bound to the given settings.
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Parses JSON tool-call arguments; invalid JSON yields an empty
    /// object.
    #[must_use]
    pub fn parse_args(arguments: &str) -> Value {
        serde_json::from_str::<Value>(arguments)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }

    /// Executes one tool call.
    pub async fn execute(&self, name: &str, args: &Value, ctx: &AgentContext) -> ToolOutcome {
        if !ctx.tool_available(name) {
            return ToolOutcome::Text(format!(
                "Error: Tool '{name}' is not available to this agent"
            ));
        }

        let outcome = match name {
            "search_chunks" => {
                ToolOutcome::Text(tools::search::search_chunks(args, ctx, &self.settings).await)
            }
            "read_file" => ToolOutcome::Text(tools::read::read_file(args, ctx)),
            "list_files" => ToolOutcome::Text(tools::read::list_files(args, ctx)),
            "search_files" => ToolOutcome::Text(tools::read::search_files(args, ctx)),
            "get_file_info" => ToolOutcome::Text(tools::read::get_file_info(args, ctx)),
            "write_file" => ToolOutcome::Text(tools::write::write_file(args, ctx)),
            "edit_file" => ToolOutcome::Text(tools::write::edit_file(args, ctx)),
            "insert_text" => ToolOutcome::Text(tools::write::insert_text(args, ctx)),
            "append_file" => ToolOutcome::Text(tools::write::append_file(args, ctx)),
            "delete_file" => ToolOutcome::Text(tools::write::delete_file(args, ctx)),
            "create_directory" => ToolOutcome::Text(tools::write::create_directory(args, ctx)),
            "remove_directory" => ToolOutcome::Text(tools::write::remove_directory(args, ctx)),
            "query_catalog" => ToolOutcome::Text(tools::catalog::query_catalog(args, ctx)),
            "get_catalog_summary" => {
                ToolOutcome::Text(tools::catalog::get_catalog_summary(args, ctx))
            }
            "refresh_catalog" => ToolOutcome::Text(tools::catalog::refresh_catalog(args, ctx)),
            "spawn_agent" => tools::spawn::spawn_agent(args, ctx),
            "spawn_predefined_agent" => tools::spawn::spawn_predefined_agent(args, ctx),
            "compact_context" => tools::spawn::compact_context(args),
            other => ToolOutcome::Text(format!("Error: Unknown tool '{other}'")),
        };

        if !matches!(outcome, ToolOutcome::Text(_)) {
            debug!(tool = name, wire = %outcome.to_wire(), "control-flow tool outcome");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn executor() -> ToolExecutor {
        ToolExecutor::new(Settings::default())
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let ctx = AgentContext::default();
        let outcome = executor().execute("teleport", &json!({}), &ctx).await;
        assert!(matches!(outcome, ToolOutcome::Text(t) if t == "Error: Unknown tool 'teleport'"));
    }

    #[tokio::test]
    async fn test_unavailable_tool() {
        let ctx = AgentContext {
            available_tools: vec!["read_file".to_string()],
            ..AgentContext::default()
        };
        let outcome = executor().execute("write_file", &json!({}), &ctx).await;
        assert!(
            matches!(outcome, ToolOutcome::Text(t) if t.contains("not available to this agent"))
        );
    }

    #[tokio::test]
    async fn test_dispatch_read_file() {
        let Ok(temp) = TempDir::new() else { return };
        std::fs::write(temp.path().join("a.md"), "content").ok();
        let ctx = AgentContext {
            base_dir: temp.path().to_path_buf(),
            ..AgentContext::default()
        };
        let outcome = executor()
            .execute("read_file", &json!({"path": "a.md"}), &ctx)
            .await;
        assert!(matches!(outcome, ToolOutcome::Text(t) if t == "content"));
    }

    #[tokio::test]
    async fn test_dispatch_spawn_outcome() {
        let ctx = AgentContext::default();
        let outcome = executor()
            .execute("spawn_agent", &json!({"task": "t", "context": "c"}), &ctx)
            .await;
        assert!(matches!(outcome, ToolOutcome::Spawn(_)));
    }

    #[tokio::test]
    async fn test_dispatch_compact_outcome() {
        let ctx = AgentContext::default();
        let outcome = executor().execute("compact_context", &json!({}), &ctx).await;
        assert!(matches!(outcome, ToolOutcome::Compact(None)));
    }

    #[test]
    fn test_parse_args_invalid_json() {
        let parsed = ToolExecutor::parse_args("not json at all");
        assert!(parsed.as_object().is_some_and(serde_json::Map::is_empty));
        let parsed = ToolExecutor::parse_args(r#"{"query": "q"}"#);
        assert_eq!(parsed["query"], "q");
        // Non-object JSON also normalizes to empty args.
        let parsed = ToolExecutor::parse_args("[1, 2]");
        assert!(parsed.as_object().is_some_and(serde_json::Map::is_empty));
    }
}
