//! Runtime context and prompt builders.
//!
//! [`AgentContext`] is the runtime view of a profile: identity, depth,
//! tool surface, permissions, and the live message list. The message
//! list here *is* the agent's transcript; the `.converted/` hybrid
//! policy scans it for prior `search_chunks` calls.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::guard::{ConvertedAccessMode, Permissions};

use super::message::ChatMessage;
use super::profile::{AgentProfile, ProfileConfig};
use super::tool::ToolDefinition;

/// Callback asked to approve a destructive write. Receives a short
/// human-readable description; returns `true` to proceed.
pub type ConfirmFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Runtime context for one agent.
#[derive(Clone)]
pub struct AgentContext {
    /// Agent identifier (`main`, `main.sub.1`, ...).
    pub agent_id: String,
    /// Profile name.
    pub name: String,
    /// Current depth in the spawn tree.
    pub current_depth: usize,
    /// Maximum spawn depth.
    pub max_depth: usize,
    /// Parent agent id; identifier only, never a back-pointer.
    pub parent_id: Option<String>,
    /// Working directory.
    pub base_dir: PathBuf,
    /// Tool subset; empty means every tool.
    pub available_tools: Vec<String>,
    /// Named subagent configurations.
    pub subagents: BTreeMap<String, ProfileConfig>,
    /// Resolved model identifier.
    pub model_id: String,
    /// Live conversation transcript.
    pub messages: Vec<ChatMessage>,
    /// Converted-content access policy.
    pub converted_access_mode: ConvertedAccessMode,
    /// Filesystem permissions.
    pub permissions: Permissions,
    /// Retrieval turn identifier shared across the spawn tree.
    pub rag_turn_id: Option<String>,
    /// Retrieval turn counter shared across the spawn tree.
    pub rag_turn_counter: u64,
    /// Persist retrieval debug traces.
    pub rag_debug: bool,
    /// Write-confirmation handler; `None` auto-approves.
    pub confirm: Option<ConfirmFn>,
    /// When set, write tools preview instead of writing.
    pub dry_run: bool,
}

impl Default for AgentContext {
    fn default() -> Self {
        Self {
            agent_id: "main".to_string(),
            name: "agent".to_string(),
            current_depth: 0,
            max_depth: 3,
            parent_id: None,
            base_dir: PathBuf::from("."),
            available_tools: Vec::new(),
            subagents: BTreeMap::new(),
            model_id: String::new(),
            messages: Vec::new(),
            converted_access_mode: ConvertedAccessMode::Hybrid,
            permissions: Permissions::default(),
            rag_turn_id: None,
            rag_turn_counter: 0,
            rag_debug: false,
            confirm: None,
            dry_run: false,
        }
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("agent_id", &self.agent_id)
            .field("current_depth", &self.current_depth)
            .field("max_depth", &self.max_depth)
            .field("parent_id", &self.parent_id)
            .field("base_dir", &self.base_dir)
            .field("available_tools", &self.available_tools)
            .field("messages", &self.messages.len())
            .finish_non_exhaustive()
    }
}

impl AgentContext {
    /// Creates a context from a profile.
    #[must_use]
    pub fn from_profile(
        profile: &AgentProfile,
        agent_id: &str,
        depth: usize,
        parent_id: Option<&str>,
    ) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            name: profile.name.clone(),
            current_depth: depth,
            max_depth: profile.max_depth,
            parent_id: parent_id.map(ToString::to_string),
            base_dir: profile.base_dir.clone(),
            available_tools: profile.tools.clone(),
            subagents: profile.subagents.clone(),
            model_id: profile.model.clone(),
            messages: Vec::new(),
            converted_access_mode: profile.converted_access_mode,
            permissions: profile.permissions.clone(),
            ..Self::default()
        }
    }

    /// True while this context may spawn sub-agents.
    #[must_use]
    pub const fn can_spawn(&self) -> bool {
        self.current_depth < self.max_depth
    }

    /// True when a tool is in this agent's subset (an empty subset
    /// means every tool).
    #[must_use]
    pub fn tool_available(&self, name: &str) -> bool {
        self.available_tools.is_empty() || self.available_tools.iter().any(|t| t == name)
    }
}

/// Builds the system prompt for an agent: persona, identity line,
/// working directory, tool list, and spawn availability.
#[must_use]
pub fn build_system_prompt(
    profile: &AgentProfile,
    context: &AgentContext,
    tools_description: &str,
) -> String {
    let mut parts = Vec::new();

    if !profile.context.is_empty() {
        let ctx = profile
            .context
            .trim()
            .replace("{base_dir}", &context.base_dir.display().to_string());
        parts.push(ctx);
    }

    let mut identity = format!("\n[Agent ID: {}]", context.agent_id);
    if let Some(ref parent_id) = context.parent_id {
        identity.push_str(&format!(" [Parent: {parent_id}]"));
    }
    identity.push_str(&format!(
        " [Depth: {}/{}]",
        context.current_depth, context.max_depth
    ));
    parts.push(identity);

    parts.push(format!("\nWorking directory: {}", context.base_dir.display()));

    if !tools_description.is_empty() {
        parts.push(format!("\nAvailable tools:\n{tools_description}"));
    }

    if !context.subagents.is_empty() && context.can_spawn() {
        let names: Vec<&str> = context.subagents.keys().map(String::as_str).collect();
        parts.push(format!("\nAvailable specialist agents: {}", names.join(", ")));
    }
    if !context.can_spawn() {
        parts.push("\n[Maximum depth reached - cannot spawn sub-agents]".to_string());
    }

    parts.join("\n")
}

/// Builds a text description of available tools for the system prompt.
#[must_use]
pub fn build_tools_description(tools: &[ToolDefinition]) -> String {
    tools
        .iter()
        .map(|tool| format!("- {}: {}", tool.name, tool.description))
        .collect::<Vec<String>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_from_profile() {
        let mut profile = AgentProfile::default_for(Path::new("/vault"), "m");
        profile.tools = vec!["read_file".to_string()];
        let ctx = AgentContext::from_profile(&profile, "main.sub.1", 1, Some("main"));
        assert_eq!(ctx.agent_id, "main.sub.1");
        assert_eq!(ctx.current_depth, 1);
        assert_eq!(ctx.parent_id.as_deref(), Some("main"));
        assert!(ctx.tool_available("read_file"));
        assert!(!ctx.tool_available("write_file"));
    }

    #[test]
    fn test_empty_tool_subset_means_all() {
        let ctx = AgentContext::default();
        assert!(ctx.tool_available("anything"));
    }

    #[test]
    fn test_can_spawn_depth_budget() {
        let mut ctx = AgentContext::default();
        ctx.current_depth = 3;
        ctx.max_depth = 3;
        assert!(!ctx.can_spawn());
        ctx.current_depth = 2;
        assert!(ctx.can_spawn());
    }

    #[test]
    fn test_system_prompt_contains_identity_and_tools() {
        let mut profile = AgentProfile::default_for(Path::new("/vault"), "m");
        profile.context = "You answer from {base_dir} content.".to_string();
        let ctx = AgentContext::from_profile(&profile, "main", 0, None);
        let tools_desc = build_tools_description(&[ToolDefinition {
            name: "search_chunks".to_string(),
            description: "Search document content".to_string(),
            parameters: serde_json::json!({}),
        }]);
        let prompt = build_system_prompt(&profile, &ctx, &tools_desc);
        assert!(prompt.contains("/vault content"));
        assert!(prompt.contains("[Agent ID: main]"));
        assert!(prompt.contains("[Depth: 0/3]"));
        assert!(prompt.contains("- search_chunks: Search document content"));
    }

    #[test]
    fn test_system_prompt_depth_exhausted_note() {
        let profile = AgentProfile::default_for(Path::new("/vault"), "m");
        let mut ctx = AgentContext::from_profile(&profile, "main.sub.1.sub.1.sub.1", 3, None);
        ctx.max_depth = 3;
        let prompt = build_system_prompt(&profile, &ctx, "");
        assert!(prompt.contains("Maximum depth reached"));
    }
}
