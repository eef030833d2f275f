//! Spawn and compaction tools.
//!
//! These handlers do not produce final strings: they return
//! [`ToolOutcome::Spawn`] / [`ToolOutcome::Compact`] variants the loop
//! batches (spawns) or executes immediately (compaction).

use serde_json::Value;

use crate::agent::context::AgentContext;
use crate::agent::tool::{SpawnRequest, ToolOutcome};

/// Handles `spawn_agent`: a dynamic sub-agent with caller persona.
#[must_use]
pub fn spawn_agent(args: &Value, ctx: &AgentContext) -> ToolOutcome {
    if !ctx.can_spawn() {
        return ToolOutcome::Text(
            "Error: Maximum agent depth reached - cannot spawn sub-agents".to_string(),
        );
    }
    let task = args.get("task").and_then(Value::as_str).unwrap_or_default();
    let context = args.get("context").and_then(Value::as_str).unwrap_or_default();
    if task.is_empty() {
        return ToolOutcome::Text("Error: task is required".to_string());
    }
    if context.is_empty() {
        return ToolOutcome::Text("Error: context is required".to_string());
    }
    let model = args
        .get("model")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(ToString::to_string);
    let tools = args.get("tools").and_then(Value::as_array).map(|list| {
        list.iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect::<Vec<String>>()
    });

    ToolOutcome::Spawn(SpawnRequest::Dynamic {
        task: task.to_string(),
        context: context.to_string(),
        model,
        tools,
    })
}

/// Handles `spawn_predefined_agent`: a named profile from `subagents:`.
#[must_use]
pub fn spawn_predefined_agent(args: &Value, ctx: &AgentContext) -> ToolOutcome {
    if !ctx.can_spawn() {
        return ToolOutcome::Text(
            "Error: Maximum agent depth reached - cannot spawn sub-agents".to_string(),
        );
    }
    let agent_name = args
        .get("agent_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let task = args.get("task").and_then(Value::as_str).unwrap_or_default();
    if agent_name.is_empty() {
        return ToolOutcome::Text("Error: agent_name is required".to_string());
    }
    if task.is_empty() {
        return ToolOutcome::Text("Error: task is required".to_string());
    }

    ToolOutcome::Spawn(SpawnRequest::Predefined {
        agent_name: agent_name.to_string(),
        task: task.to_string(),
    })
}

/// Handles `compact_context`: asks the loop to summarize the
/// conversation, optionally steered by instructions.
#[must_use]
pub fn compact_context(args: &Value) -> ToolOutcome {
    let instructions = args
        .get("instructions")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);
    ToolOutcome::Compact(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spawn_agent_builds_request() {
        let ctx = AgentContext::default();
        let outcome = spawn_agent(
            &json!({
                "task": "summarize chapter 2",
                "context": "You are a summarizer.",
                "tools": ["read_file", "search_chunks"]
            }),
            &ctx,
        );
        match outcome {
            ToolOutcome::Spawn(SpawnRequest::Dynamic { task, tools, model, .. }) => {
                assert_eq!(task, "summarize chapter 2");
                assert_eq!(tools.map(|t| t.len()), Some(2));
                assert!(model.is_none());
            }
            _ => unreachable!("expected dynamic spawn"),
        }
    }

    #[test]
    fn test_spawn_agent_validation() {
        let ctx = AgentContext::default();
        let outcome = spawn_agent(&json!({"context": "c"}), &ctx);
        assert!(matches!(outcome, ToolOutcome::Text(t) if t == "Error: task is required"));
        let outcome = spawn_agent(&json!({"task": "t"}), &ctx);
        assert!(matches!(outcome, ToolOutcome::Text(t) if t == "Error: context is required"));
    }

    #[test]
    fn test_spawn_depth_exhausted() {
        let ctx = AgentContext {
            current_depth: 3,
            max_depth: 3,
            ..AgentContext::default()
        };
        let outcome = spawn_agent(&json!({"task": "t", "context": "c"}), &ctx);
        assert!(matches!(outcome, ToolOutcome::Text(t) if t.contains("Maximum agent depth")));
    }

    #[test]
    fn test_spawn_predefined() {
        let ctx = AgentContext::default();
        let outcome =
            spawn_predefined_agent(&json!({"agent_name": "researcher", "task": "dig"}), &ctx);
        match outcome {
            ToolOutcome::Spawn(SpawnRequest::Predefined { agent_name, task }) => {
                assert_eq!(agent_name, "researcher");
                assert_eq!(task, "dig");
            }
            _ => unreachable!("expected predefined spawn"),
        }
    }

    #[test]
    fn test_compact_context_instructions() {
        let outcome = compact_context(&json!({"instructions": "keep file paths"}));
        assert!(
            matches!(outcome, ToolOutcome::Compact(Some(i)) if i == "keep file paths")
        );
        let outcome = compact_context(&json!({}));
        assert!(matches!(outcome, ToolOutcome::Compact(None)));
        let outcome = compact_context(&json!({"instructions": "  "}));
        assert!(matches!(outcome, ToolOutcome::Compact(None)));
    }
}
