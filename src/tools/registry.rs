//! Tool definitions and availability.
//!
//! The registry is an explicit value consulted at request-build time:
//! it filters by the agent's tool subset and by situational
//! availability (`search_chunks` needs an index; spawn tools need depth
//! budget).

use serde_json::json;

use crate::agent::context::AgentContext;
use crate::agent::tool::ToolDefinition;
use crate::index::IndexStore;

/// Stable names of every tool in the surface.
pub const ALL_TOOL_NAMES: &[&str] = &[
    "search_chunks",
    "read_file",
    "list_files",
    "search_files",
    "get_file_info",
    "write_file",
    "edit_file",
    "insert_text",
    "append_file",
    "delete_file",
    "create_directory",
    "remove_directory",
    "query_catalog",
    "get_catalog_summary",
    "refresh_catalog",
    "spawn_agent",
    "spawn_predefined_agent",
    "compact_context",
];

/// Tool names that mutate the filesystem.
pub const WRITE_TOOL_NAMES: &[&str] = &[
    "write_file",
    "edit_file",
    "insert_text",
    "append_file",
    "delete_file",
    "create_directory",
    "remove_directory",
];

/// True when a tool is situationally available in the context.
#[must_use]
pub fn tool_is_available(name: &str, ctx: &AgentContext) -> bool {
    if !ctx.tool_available(name) {
        return false;
    }
    match name {
        "search_chunks" => IndexStore::exists(&ctx.base_dir),
        "spawn_agent" => ctx.can_spawn(),
        "spawn_predefined_agent" => ctx.can_spawn() && !ctx.subagents.is_empty(),
        _ => true,
    }
}

/// Builds the definitions advertised to the LLM for this context.
#[must_use]
pub fn build_definitions(ctx: &AgentContext) -> Vec<ToolDefinition> {
    ALL_TOOL_NAMES
        .iter()
        .filter(|name| tool_is_available(name, ctx))
        .filter_map(|name| definition(name))
        .collect()
}

fn path_schema(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": description
            }
        },
        "required": ["path"],
        "additionalProperties": false
    })
}

/// Returns the definition for one tool name.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn definition(name: &str) -> Option<ToolDefinition> {
    let (description, parameters) = match name {
        "search_chunks" => (
            "Search document content using semantic understanding. Use this when answering \
             questions about what documents say (facts, explanations, methods). Returns \
             relevant passages with citations including document name and location. Hybrid \
             search combines vector embeddings with full-text search for best results.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Semantic search query describing what you're looking for. \
                                        Supports explicit file scoping with @mentions, e.g. \
                                        '@report.pdf weak points in methodology'"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Number of chunks to return (default: 10)"
                    },
                    "file_type_filter": {
                        "type": "string",
                        "description": "Restrict results to specific file type (e.g., 'pdf', 'video', 'audio')"
                    },
                    "doc_name_filter": {
                        "type": "string",
                        "description": "Restrict to documents matching this name substring"
                    },
                    "debug": {
                        "type": "boolean",
                        "description": "Persist retrieval diagnostics to `.flavia/rag_debug.jsonl` \
                                        for out-of-band inspection. Diagnostics are not injected \
                                        into model context."
                    },
                    "retrieval_mode": {
                        "type": "string",
                        "enum": ["balanced", "exhaustive"],
                        "description": "Retrieval profile: 'balanced' (default) or 'exhaustive' \
                                        (higher recall and per-document coverage)."
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        ),
        "read_file" => (
            "Read the complete contents of a file",
            path_schema("Path to the file to read (relative to base directory)"),
        ),
        "list_files" => (
            "List files and directories at a path",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory to list (default: base directory)"
                    }
                },
                "additionalProperties": false
            }),
        ),
        "search_files" => (
            "Search file names recursively by case-insensitive substring",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Substring to match against file names"
                    },
                    "path": {
                        "type": "string",
                        "description": "Directory to search (default: base directory)"
                    }
                },
                "required": ["pattern"],
                "additionalProperties": false
            }),
        ),
        "get_file_info" => (
            "Get metadata for a file, including catalog details when available",
            path_schema("Path to inspect (relative to base directory)"),
        ),
        "write_file" => (
            "Write (or overwrite) a file with the given content",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Target file path" },
                    "content": { "type": "string", "description": "Complete file content" }
                },
                "required": ["path", "content"],
                "additionalProperties": false
            }),
        ),
        "edit_file" => (
            "Replace the first occurrence of old_text with new_text in a file",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Target file path" },
                    "old_text": { "type": "string", "description": "Exact text to replace" },
                    "new_text": { "type": "string", "description": "Replacement text" }
                },
                "required": ["path", "old_text", "new_text"],
                "additionalProperties": false
            }),
        ),
        "insert_text" => (
            "Insert text at a 1-indexed line number",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Target file path" },
                    "line_number": { "type": "integer", "description": "1-indexed insertion line" },
                    "text": { "type": "string", "description": "Text to insert" }
                },
                "required": ["path", "line_number", "text"],
                "additionalProperties": false
            }),
        ),
        "append_file" => (
            "Append content to a file, creating it when absent",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Target file path" },
                    "content": { "type": "string", "description": "Content to append" }
                },
                "required": ["path", "content"],
                "additionalProperties": false
            }),
        ),
        "delete_file" => (
            "Delete a file (a backup is kept under .flavia/file_backups)",
            path_schema("File to delete"),
        ),
        "create_directory" => (
            "Create a directory (including parents)",
            path_schema("Directory to create"),
        ),
        "remove_directory" => (
            "Remove a directory; non-empty directories require recursive: true",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory to remove" },
                    "recursive": {
                        "type": "boolean",
                        "description": "Remove contents as well (default: false)"
                    }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
        ),
        "query_catalog" => (
            "Query the content catalog by name, extension, type, category, status, or free text",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Substring match on filename" },
                    "extension": { "type": "string", "description": "Exact extension, e.g. '.pdf'" },
                    "file_type": {
                        "type": "string",
                        "enum": ["text", "binary_document", "image", "audio", "video", "archive", "other"],
                        "description": "Coarse file type"
                    },
                    "category": { "type": "string", "description": "Specific category, e.g. 'python'" },
                    "has_summary": { "type": "boolean", "description": "Filter by summary presence" },
                    "has_conversion": { "type": "boolean", "description": "Filter by conversion presence" },
                    "status": {
                        "type": "string",
                        "enum": ["current", "new", "modified", "missing"],
                        "description": "Lifecycle status"
                    },
                    "text_search": {
                        "type": "string",
                        "description": "Substring search in path + summary + tags"
                    },
                    "limit": { "type": "integer", "description": "Maximum results (default: 50)" }
                },
                "additionalProperties": false
            }),
        ),
        "get_catalog_summary" => (
            "Get a compact overview of the cataloged content",
            json!({
                "type": "object",
                "properties": {
                    "max_length": {
                        "type": "integer",
                        "description": "Maximum summary length in characters (default: 2000)"
                    }
                },
                "additionalProperties": false
            }),
        ),
        "refresh_catalog" => (
            "Rescan the base directory and update the catalog",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        ),
        "spawn_agent" => (
            "Create a specialized sub-agent to handle a specific task",
            json!({
                "type": "object",
                "properties": {
                    "task": {
                        "type": "string",
                        "description": "Clear description of the task for the sub-agent"
                    },
                    "context": {
                        "type": "string",
                        "description": "System context/persona for the sub-agent"
                    },
                    "model": {
                        "type": "string",
                        "description": "Model to use for the sub-agent"
                    },
                    "tools": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "List of tools the sub-agent can use"
                    }
                },
                "required": ["task", "context"],
                "additionalProperties": false
            }),
        ),
        "spawn_predefined_agent" => (
            "Delegate a task to a predefined specialist agent",
            json!({
                "type": "object",
                "properties": {
                    "agent_name": {
                        "type": "string",
                        "description": "Name of the predefined agent"
                    },
                    "task": {
                        "type": "string",
                        "description": "Clear description of the task"
                    }
                },
                "required": ["agent_name", "task"],
                "additionalProperties": false
            }),
        ),
        "compact_context" => (
            "Compact the current conversation by summarizing it to free up context window \
             space. Use this when context is running low, when the user asks to summarize or \
             condense the conversation, or when you receive a system notice about context \
             capacity.",
            json!({
                "type": "object",
                "properties": {
                    "instructions": {
                        "type": "string",
                        "description": "Optional custom instructions for how to summarize the \
                                        conversation, e.g. 'focus on technical decisions' or \
                                        'preserve all file paths'."
                    }
                },
                "additionalProperties": false
            }),
        ),
        _ => return None,
    };

    Some(ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_every_tool_has_a_definition() {
        for name in ALL_TOOL_NAMES {
            let def = definition(name);
            assert!(def.is_some(), "missing definition for {name}");
            let def = def.unwrap_or_else(|| unreachable!());
            assert!(!def.description.is_empty());
            assert_eq!(def.parameters["type"], "object");
        }
        assert!(definition("ghost_tool").is_none());
    }

    #[test]
    fn test_search_chunks_needs_index() {
        let Ok(temp) = TempDir::new() else { return };
        let ctx = AgentContext {
            base_dir: temp.path().to_path_buf(),
            ..AgentContext::default()
        };
        assert!(!tool_is_available("search_chunks", &ctx));

        std::fs::create_dir_all(temp.path().join(".index")).ok();
        std::fs::write(temp.path().join(".index/index.db"), b"").ok();
        assert!(tool_is_available("search_chunks", &ctx));
    }

    #[test]
    fn test_spawn_needs_depth_budget() {
        let ctx = AgentContext {
            current_depth: 3,
            max_depth: 3,
            ..AgentContext::default()
        };
        assert!(!tool_is_available("spawn_agent", &ctx));
    }

    #[test]
    fn test_tool_subset_respected() {
        let ctx = AgentContext {
            available_tools: vec!["read_file".to_string()],
            ..AgentContext::default()
        };
        assert!(tool_is_available("read_file", &ctx));
        assert!(!tool_is_available("write_file", &ctx));
        let defs = build_definitions(&ctx);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "read_file");
    }

    #[test]
    fn test_build_definitions_excludes_unavailable() {
        let Ok(temp) = TempDir::new() else { return };
        let ctx = AgentContext {
            base_dir: temp.path().to_path_buf(),
            ..AgentContext::default()
        };
        let defs = build_definitions(&ctx);
        // No index and no subagents: search_chunks and
        // spawn_predefined_agent are absent.
        assert!(!defs.iter().any(|d| d.name == "search_chunks"));
        assert!(!defs.iter().any(|d| d.name == "spawn_predefined_agent"));
        assert!(defs.iter().any(|d| d.name == "spawn_agent"));
        assert!(defs.iter().any(|d| d.name == "read_file"));
    }
}
