//! Tool type definitions for the agent's function-calling surface.
//!
//! Tool handlers return a typed [`ToolOutcome`] so control-flow intents
//! (spawning a sub-agent, compacting the conversation) are expressed as
//! variants the loop matches on, not as in-band string prefixes. The
//! legacy sentinel prefixes survive only as a wire encoding used for
//! debug logging.

use serde::{Deserialize, Serialize};

/// Wire prefix for a deferred dynamic spawn.
pub const SPAWN_AGENT_SENTINEL: &str = "__SPAWN_AGENT__";
/// Wire prefix for a deferred predefined spawn.
pub const SPAWN_PREDEFINED_SENTINEL: &str = "__SPAWN_PREDEFINED__";
/// Wire prefix for a compaction request.
pub const COMPACT_SENTINEL: &str = "__COMPACT_CONTEXT__";

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match the executor's dispatch table).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (UTF-8 text; errors begin with `Error:`).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

/// A deferred sub-agent spawn request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SpawnRequest {
    /// Dynamic sub-agent with caller-supplied persona and tool subset.
    Dynamic {
        /// Task description for the sub-agent.
        task: String,
        /// System context/persona for the sub-agent.
        context: String,
        /// Optional model override.
        model: Option<String>,
        /// Optional tool subset; `None` inherits the parent's tools.
        tools: Option<Vec<String>>,
    },
    /// A named sub-agent looked up in the parent profile.
    Predefined {
        /// Profile name under `subagents:`.
        agent_name: String,
        /// Task description for the sub-agent.
        task: String,
    },
}

/// What a tool handler produced: a final string, a deferred spawn, or a
/// compaction request.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// A plain tool result visible to the LLM.
    Text(String),
    /// A spawn request the loop batches for parallel execution.
    Spawn(SpawnRequest),
    /// A compaction request with optional steering instructions.
    Compact(Option<String>),
}

impl ToolOutcome {
    /// Encodes the outcome in the legacy sentinel wire format. Used for
    /// debug logging; the loop itself matches on the variants.
    #[must_use]
    pub fn to_wire(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Spawn(request @ SpawnRequest::Dynamic { .. }) => {
                let payload = serde_json::to_string(request).unwrap_or_default();
                format!("{SPAWN_AGENT_SENTINEL}:{payload}")
            }
            Self::Spawn(request @ SpawnRequest::Predefined { .. }) => {
                let payload = serde_json::to_string(request).unwrap_or_default();
                format!("{SPAWN_PREDEFINED_SENTINEL}:{payload}")
            }
            Self::Compact(None) => COMPACT_SENTINEL.to_string(),
            Self::Compact(Some(instructions)) => {
                let payload = serde_json::json!({ "instructions": instructions });
                format!("{COMPACT_SENTINEL}:{payload}")
            }
        }
    }
}

/// True when a tool result string indicates failure or cancellation.
#[must_use]
pub fn is_error_result(result_text: &str) -> bool {
    let lowered = result_text.trim().to_lowercase();
    lowered.starts_with("error:") || lowered.starts_with("operation cancelled")
}
