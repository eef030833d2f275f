//! The recursive agent: tool-calling loop with grounding policies.
//!
//! Drives one LLM "run": sends the transcript, executes tool calls,
//! batches spawn requests for parallel execution, enforces the
//! mention-grounding / cross-document coverage / comparison-format
//! policies with bounded reminder budgets, and compacts the
//! conversation when the context window fills up.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::Settings;
use crate::error::Result;
use crate::index::IndexStore;
use crate::tools::{WRITE_TOOL_NAMES, build_definitions};

use super::context::{AgentContext, build_system_prompt, build_tools_description};
use super::executor::ToolExecutor;
use super::mentions::{
    extract_mentions, format_mentions, has_citation_markers, has_comparison_keyword,
    looks_exhaustive_query, mentions_equivalent,
};
use super::message::{
    ChatMessage, ChatRequest, Role, TokenUsage, assistant_message, system_message, tool_message,
    user_message,
};
use super::profile::AgentProfile;
use super::provider::LlmProvider;
use super::spawn::{self, PendingSpawn};
use super::tool::{SpawnRequest, ToolCall, ToolOutcome, ToolResult, is_error_result};

/// Default iteration limit for one run.
pub const MAX_ITERATIONS: usize = 20;
/// Reminder budget for mention grounding and cross-document coverage.
pub const MAX_MENTION_GROUNDING_REMINDERS: usize = 3;
/// Reminder budget for comparison-format enforcement.
pub const MAX_COMPARISON_FORMAT_REMINDERS: usize = 2;
/// Messages kept verbatim when compacting.
const COMPACT_KEEP_RECENT: usize = 6;
/// Upper bound on a single guarded tool result, in tokens.
const MAX_TOOL_RESULT_TOKENS: usize = 8_000;
/// Lower bound on a single guarded tool result, in tokens.
const MIN_TOOL_RESULT_TOKENS: usize = 256;
/// Approximate characters per token for the size guard.
const GUARD_CHARS_PER_TOKEN: usize = 4;

/// Options for one [`RecursiveAgent::run`] invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Iteration cap; defaults to [`MAX_ITERATIONS`], floor 1.
    pub max_iterations: Option<usize>,
    /// Continue from the current transcript instead of appending the
    /// user message.
    pub continue_from_current: bool,
}

/// Agent capable of spawning and managing sub-agents.
pub struct RecursiveAgent {
    settings: Settings,
    profile: AgentProfile,
    provider: Arc<dyn LlmProvider>,
    executor: ToolExecutor,
    /// Runtime context; `context.messages` is the live transcript.
    pub context: AgentContext,
    child_counter: Arc<Mutex<u64>>,
    last_prompt_tokens: u32,
    total_prompt_tokens: u64,
    total_completion_tokens: u64,
    max_context_tokens: u32,
}

impl RecursiveAgent {
    /// Creates an agent from a profile.
    #[must_use]
    pub fn new(
        settings: Settings,
        profile: AgentProfile,
        provider: Arc<dyn LlmProvider>,
        agent_id: &str,
        depth: usize,
        parent_id: Option<&str>,
    ) -> Self {
        let context = AgentContext::from_profile(&profile, agent_id, depth, parent_id);
        let executor = ToolExecutor::new(settings.clone());
        let max_context_tokens = settings.max_context_tokens;
        let mut agent = Self {
            settings,
            profile,
            provider,
            executor,
            context,
            child_counter: Arc::new(Mutex::new(0)),
            last_prompt_tokens: 0,
            total_prompt_tokens: 0,
            total_completion_tokens: 0,
            max_context_tokens,
        };
        agent.init_system_prompt();
        agent
    }

    /// Installs the write-confirmation handler.
    pub fn set_confirm(&mut self, confirm: Option<super::context::ConfirmFn>) {
        self.context.confirm = confirm;
    }

    /// Resets the transcript and token counters for a new conversation.
    pub fn reset(&mut self) {
        self.init_system_prompt();
        self.last_prompt_tokens = 0;
        self.total_prompt_tokens = 0;
        self.total_completion_tokens = 0;
    }

    fn init_system_prompt(&mut self) {
        let definitions = build_definitions(&self.context);
        let tools_desc = build_tools_description(&definitions);
        let prompt = build_system_prompt(&self.profile, &self.context, &tools_desc);
        self.context.messages = vec![system_message(&prompt)];
    }

    /// Context window utilization as a ratio in `[0, 1]`.
    #[must_use]
    pub fn context_utilization(&self) -> f32 {
        if self.max_context_tokens == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.last_prompt_tokens as f32 / self.max_context_tokens as f32
        }
    }

    /// True once the last prompt crossed the compaction threshold.
    #[must_use]
    pub fn needs_compaction(&self) -> bool {
        self.context_utilization() >= self.profile.compact_threshold
    }

    /// Cumulative prompt/completion token totals for this agent.
    #[must_use]
    pub const fn token_totals(&self) -> (u64, u64) {
        (self.total_prompt_tokens, self.total_completion_tokens)
    }

    fn record_usage(&mut self, usage: TokenUsage) {
        self.last_prompt_tokens = usage.prompt_tokens;
        self.total_prompt_tokens += u64::from(usage.prompt_tokens);
        self.total_completion_tokens += u64::from(usage.completion_tokens);
    }

    /// Formats the max-iterations termination message.
    #[must_use]
    pub fn format_max_iterations_message(limit: usize) -> String {
        format!(
            "Maximum iterations reached ({limit}). Would you like to continue with more \
             iterations or try a more specific request?"
        )
    }

    /// Extracts the limit from a max-iterations termination message.
    #[must_use]
    pub fn extract_max_iterations_limit(response_text: &str) -> Option<usize> {
        let rest = response_text
            .trim()
            .strip_prefix("Maximum iterations reached (")?;
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if !rest[digits.len()..].starts_with(").") {
            return None;
        }
        digits.parse().ok()
    }

    fn mention_grounding_error_message() -> String {
        "Unable to complete the answer because @file grounding was required but \
         `search_chunks` was not executed successfully. Please retry, keeping the @file \
         references explicit."
            .to_string()
    }

    fn mention_coverage_error_message(remaining_mentions: &[String]) -> String {
        let suffix = if remaining_mentions.is_empty() {
            String::new()
        } else {
            let items: Vec<String> = remaining_mentions.iter().map(|m| format!("@{m}")).collect();
            format!(" Missing evidence scope for: {}", items.join(", "))
        };
        format!(
            "Unable to complete the answer because multi-file grounding was incomplete.\
             {suffix} Please retry with explicit @file references."
        )
    }

    fn comparison_format_error_message() -> String {
        "Unable to complete the comparative answer with grounded citations. Please retry \
         and keep explicit @file scope so evidence can be cited item by item."
            .to_string()
    }

    /// True when `@mentions` must trigger mandatory `search_chunks`
    /// grounding: mentions present, the tool available, and an index on
    /// disk.
    fn requires_mention_scoped_search(&self, text: &str) -> bool {
        if text.trim().is_empty() || extract_mentions(text).is_empty() {
            return false;
        }
        if !self.context.tool_available("search_chunks") {
            return false;
        }
        IndexStore::exists(&self.context.base_dir)
    }

    /// Runs the agent with a user message.
    ///
    /// # Errors
    ///
    /// Propagates fatal LLM errors (authentication, exhausted
    /// transport retries). Tool failures never surface as errors; they
    /// are materialized as `Error:` strings the LLM sees.
    #[allow(clippy::too_many_lines)]
    pub async fn run(&mut self, text: &str, options: RunOptions) -> Result<String> {
        if !options.continue_from_current {
            self.context.messages.push(user_message(text));
        }
        let iteration_limit = options.max_iterations.unwrap_or(MAX_ITERATIONS).max(1);

        let required_mentions: BTreeSet<String> = extract_mentions(text).into_iter().collect();
        let requires_mention_scoped_search = self.requires_mention_scoped_search(text);
        // Both grounding policies need a usable retrieval path; without
        // one there is nothing to enforce.
        let requires_cross_doc_coverage = requires_mention_scoped_search
            && required_mentions.len() >= 2
            && has_comparison_keyword(text);
        let force_exhaustive_retrieval = looks_exhaustive_query(text);

        let mut mention_enforcement_attempts = 0usize;
        let mut coverage_enforcement_attempts = 0usize;
        let mut comparison_format_enforcement_attempts = 0usize;
        let mut had_grounded_search = false;
        let mut covered_mentions: BTreeSet<String> = BTreeSet::new();
        let mut had_write_tool_call = false;
        let mut had_successful_write = false;
        let mut write_failures: Vec<String> = Vec::new();
        let mut compaction_warning_injected = false;

        let mut iterations = 0usize;
        while iterations < iteration_limit {
            iterations += 1;
            debug!(agent_id = %self.context.agent_id, iteration = iterations, "waiting for LLM");

            let request = ChatRequest {
                model: self.context.model_id.clone(),
                messages: self.context.messages.clone(),
                temperature: None,
                max_tokens: None,
                tools: build_definitions(&self.context),
            };
            let response = self.provider.chat(&request).await?;
            self.record_usage(response.usage);
            self.context
                .messages
                .push(assistant_message(&response.content, response.tool_calls.clone()));

            if response.tool_calls.is_empty() {
                if requires_cross_doc_coverage
                    && !required_mentions.is_empty()
                    && covered_mentions != required_mentions
                {
                    let remaining: Vec<String> = required_mentions
                        .difference(&covered_mentions)
                        .cloned()
                        .collect();
                    if coverage_enforcement_attempts >= MAX_MENTION_GROUNDING_REMINDERS {
                        return Ok(Self::mention_coverage_error_message(&remaining));
                    }
                    coverage_enforcement_attempts += 1;
                    self.context.messages.push(user_message(&format!(
                        "[System notice] This is a multi-file comparison request. Before \
                         answering, call search_chunks again and include the remaining \
                         @mentions in the query: {}.",
                        format_mentions(&remaining)
                    )));
                    continue;
                }
                if requires_cross_doc_coverage
                    && had_grounded_search
                    && !has_citation_markers(&response.content)
                {
                    if comparison_format_enforcement_attempts >= MAX_COMPARISON_FORMAT_REMINDERS {
                        return Ok(Self::comparison_format_error_message());
                    }
                    comparison_format_enforcement_attempts += 1;
                    self.context.messages.push(user_message(
                        "[System notice] For comparative multi-file tasks, answer in two stages:\n\
                         1) Evidence matrix grouped by source file.\n\
                         2) Conclusions based only on cited evidence.\n\
                         Every factual claim must include at least one citation marker like [1]. \
                         If evidence is missing, explicitly write 'not found in retrieved evidence'.",
                    ));
                    continue;
                }
                if requires_mention_scoped_search && !had_grounded_search {
                    if mention_enforcement_attempts >= MAX_MENTION_GROUNDING_REMINDERS {
                        return Ok(Self::mention_grounding_error_message());
                    }
                    mention_enforcement_attempts += 1;
                    self.context.messages.push(user_message(
                        "[System notice] The user referenced files using @mentions. Before \
                         answering, you must call search_chunks with the user query (including \
                         @mentions) to ground the response in indexed evidence.",
                    ));
                    continue;
                }

                let mut final_text = if response.content.is_empty() {
                    "I could not produce a textual response. Please try rephrasing your question."
                        .to_string()
                } else {
                    response.content
                };
                if had_write_tool_call && !had_successful_write && !write_failures.is_empty() {
                    let tail_start = write_failures.len().saturating_sub(3);
                    let details: Vec<String> = write_failures[tail_start..]
                        .iter()
                        .map(|item| format!("- {item}"))
                        .collect();
                    final_text.push_str(&format!(
                        "\n\nWrite operations were not applied due to errors:\n{}",
                        details.join("\n")
                    ));
                }
                return Ok(final_text);
            }

            let (tool_results, pending_spawns) = self
                .process_tool_calls(&response.tool_calls, force_exhaustive_retrieval)
                .await;

            // Inject the context-window advisory once per run, and only
            // while the loop continues so the LLM can act on it.
            if self.needs_compaction() && !compaction_warning_injected {
                compaction_warning_injected = true;
                let pct = self.context_utilization() * 100.0;
                let remaining = self
                    .max_context_tokens
                    .saturating_sub(self.last_prompt_tokens);
                self.context.messages.push(user_message(&format!(
                    "[System notice] Context window is at {pct:.0}% capacity \
                     ({}/{} tokens, ~{remaining} remaining). You have the compact_context \
                     tool available to summarize the conversation and free up space. \
                     Consider using it now, or wrap up your current task quickly.",
                    self.last_prompt_tokens, self.max_context_tokens
                )));
            }

            for (call, result) in response.tool_calls.iter().zip(&tool_results) {
                if call.name == "search_chunks" {
                    let args = ToolExecutor::parse_args(&call.arguments);
                    if let Some(query) = args.get("query").and_then(Value::as_str) {
                        for query_mention in extract_mentions(query) {
                            for required in &required_mentions {
                                if mentions_equivalent(required, &query_mention) {
                                    covered_mentions.insert(required.clone());
                                }
                            }
                        }
                    }
                    if result
                        .content
                        .starts_with("No indexed documents match the @file references")
                    {
                        return Ok(result.content.clone());
                    }
                    if !is_error_result(&result.content) {
                        had_grounded_search = true;
                    }
                }
                if WRITE_TOOL_NAMES.contains(&call.name.as_str()) {
                    had_write_tool_call = true;
                    if is_error_result(&result.content) {
                        write_failures.push(format!("{}: {}", call.name, result.content));
                    } else {
                        had_successful_write = true;
                    }
                }
            }

            for result in &tool_results {
                self.context
                    .messages
                    .push(tool_message(&result.tool_call_id, &result.content));
            }

            if requires_mention_scoped_search
                && !had_grounded_search
                && !response
                    .tool_calls
                    .iter()
                    .any(|tc| tc.name == "search_chunks")
            {
                if mention_enforcement_attempts >= MAX_MENTION_GROUNDING_REMINDERS {
                    return Ok(Self::mention_grounding_error_message());
                }
                mention_enforcement_attempts += 1;
                self.context.messages.push(user_message(
                    "[System notice] You still need to call search_chunks for the @mentioned \
                     files before producing the final answer.",
                ));
            }

            if !pending_spawns.is_empty() {
                let outcomes = spawn::execute_spawns(self, pending_spawns).await;
                for outcome in outcomes {
                    // LLM-visible ordering stays stable: results are
                    // reconciled by tool_call_id, not completion order.
                    let slot = self.context.messages.iter_mut().find(|message| {
                        message.tool_call_id.as_deref() == Some(outcome.tool_call_id.as_str())
                    });
                    if let Some(message) = slot {
                        message.content = outcome.content;
                    }
                }
            }
        }

        warn!(agent_id = %self.context.agent_id, iteration_limit, "max iterations reached");
        Ok(Self::format_max_iterations_message(iteration_limit))
    }

    /// Executes tool calls in order, collecting results and deferred
    /// spawn requests. Compaction requests run immediately.
    async fn process_tool_calls(
        &mut self,
        tool_calls: &[ToolCall],
        force_exhaustive_retrieval: bool,
    ) -> (Vec<ToolResult>, Vec<PendingSpawn>) {
        let mut results = Vec::with_capacity(tool_calls.len());
        let mut spawns = Vec::new();
        let mut consumed_tokens = 0usize;

        for call in tool_calls {
            let mut args = ToolExecutor::parse_args(&call.arguments);
            if call.name == "search_chunks"
                && force_exhaustive_retrieval
                && args.get("retrieval_mode").is_none()
                && let Some(object) = args.as_object_mut()
            {
                object.insert(
                    "retrieval_mode".to_string(),
                    Value::String("exhaustive".to_string()),
                );
            }

            debug!(agent_id = %self.context.agent_id, tool = %call.name, "executing tool");
            let outcome = self.executor.execute(&call.name, &args, &self.context).await;

            let content = match outcome {
                ToolOutcome::Spawn(request) => {
                    let placeholder = match &request {
                        SpawnRequest::Dynamic { .. } => "[Spawning sub-agent...]",
                        SpawnRequest::Predefined { .. } => "[Spawning predefined agent...]",
                    };
                    spawns.push(PendingSpawn {
                        tool_call_id: call.id.clone(),
                        request,
                    });
                    placeholder.to_string()
                }
                ToolOutcome::Compact(instructions) => {
                    match self.compact_conversation(instructions.as_deref()).await {
                        Ok(Some(summary)) => {
                            format!("Conversation compacted successfully. Summary:\n{summary}")
                        }
                        Ok(None) => "Nothing to compact (conversation is empty).".to_string(),
                        Err(e) => format!("Compaction failed: {e}"),
                    }
                }
                ToolOutcome::Text(result) => self.guard_tool_result(result, consumed_tokens),
            };

            consumed_tokens += content.len() / GUARD_CHARS_PER_TOKEN;
            results.push(ToolResult {
                tool_call_id: call.id.clone(),
                is_error: is_error_result(&content),
                content,
            });
        }

        (results, spawns)
    }

    /// Truncates a tool result to the remaining context budget on a
    /// grapheme boundary.
    fn guard_tool_result(&self, result: String, consumed_tokens: usize) -> String {
        let remaining = (self.max_context_tokens as usize)
            .saturating_sub(self.last_prompt_tokens as usize)
            .saturating_sub(consumed_tokens);
        let budget_tokens = (remaining / 2).clamp(MIN_TOOL_RESULT_TOKENS, MAX_TOOL_RESULT_TOKENS);
        let budget_chars = budget_tokens * GUARD_CHARS_PER_TOKEN;
        if result.len() <= budget_chars {
            return result;
        }

        let mut cut = 0;
        for (offset, grapheme) in result.grapheme_indices(true) {
            if offset + grapheme.len() > budget_chars {
                break;
            }
            cut = offset + grapheme.len();
        }
        let dropped = result.len() - cut;
        format!("{}\n[... truncated {dropped} chars]", &result[..cut])
    }

    /// Summarizes the earlier conversation down to a single note,
    /// preserving the system prompt and the most recent turns.
    ///
    /// Returns `None` when there is nothing worth compacting.
    async fn compact_conversation(&mut self, instructions: Option<&str>) -> Result<Option<String>> {
        let system_count = self
            .context
            .messages
            .iter()
            .take_while(|m| m.role == Role::System)
            .count();
        let body: Vec<ChatMessage> = self.context.messages[system_count..].to_vec();
        if body.is_empty() {
            return Ok(None);
        }

        // Keep the tail, advanced past any leading tool results so the
        // kept transcript never starts with an orphaned tool message.
        let mut keep_from = body.len().saturating_sub(COMPACT_KEEP_RECENT);
        while keep_from < body.len() && body[keep_from].role == Role::Tool {
            keep_from += 1;
        }
        if keep_from == 0 {
            return Ok(None);
        }

        let mut transcript = String::new();
        for message in &body[..keep_from] {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            if message.tool_calls.is_empty() {
                transcript.push_str(&format!("{role}: {}\n", message.content));
            } else {
                let names: Vec<&str> =
                    message.tool_calls.iter().map(|tc| tc.name.as_str()).collect();
                transcript.push_str(&format!(
                    "{role}: {} [tool calls: {}]\n",
                    message.content,
                    names.join(", ")
                ));
            }
        }

        let mut prompt = "Summarize the conversation below into a compact note that preserves \
                          the user's goals, decisions made, file paths touched, and pending \
                          work. Answer with the summary only."
            .to_string();
        if let Some(instructions) = instructions {
            prompt.push_str(&format!("\nAdditional instructions: {instructions}"));
        }
        prompt.push_str("\n\n");
        prompt.push_str(&transcript);

        let request = ChatRequest {
            model: self.context.model_id.clone(),
            messages: vec![
                system_message("You condense agent conversations without losing task state."),
                user_message(&prompt),
            ],
            temperature: None,
            max_tokens: Some(1024),
            tools: Vec::new(),
        };
        let response = self.provider.chat(&request).await?;
        let summary = response.content.trim().to_string();
        if summary.is_empty() {
            return Ok(None);
        }

        let mut compacted: Vec<ChatMessage> =
            self.context.messages[..system_count].to_vec();
        compacted.push(user_message(&format!("[Conversation summary] {summary}")));
        compacted.extend_from_slice(&body[keep_from..]);
        self.context.messages = compacted;

        Ok(Some(summary))
    }

    /// Builds a child agent for a spawn request. Returns the child, its
    /// task, and the label used in result prefixes, or an error string
    /// for the parent's tool result.
    pub(crate) fn build_child(
        &self,
        request: &SpawnRequest,
    ) -> std::result::Result<(Self, String, String), String> {
        let (child_profile, task, label, child_id) = match request {
            SpawnRequest::Predefined { agent_name, task } => {
                let Some(profile) = self.profile.create_subagent_profile(agent_name) else {
                    return Err(format!("Error: Unknown predefined agent '{agent_name}'"));
                };
                let child_id = {
                    #[allow(clippy::unwrap_used)]
                    let mut counter = self.child_counter.lock().unwrap();
                    *counter += 1;
                    format!("{}.{agent_name}.{counter}", self.context.agent_id)
                };
                (profile, task.clone(), agent_name.clone(), child_id)
            }
            SpawnRequest::Dynamic {
                task,
                context,
                model,
                tools,
            } => {
                let (child_number, child_id) = {
                    #[allow(clippy::unwrap_used)]
                    let mut counter = self.child_counter.lock().unwrap();
                    *counter += 1;
                    (*counter, format!("{}.sub.{counter}", self.context.agent_id))
                };
                let profile = self.profile.derive_dynamic(
                    context,
                    model.as_deref(),
                    tools.as_deref(),
                    child_number,
                );
                (profile, task.clone(), "sub-agent".to_string(), child_id)
            }
        };

        debug!(child_id = %child_id, label = %label, "spawning sub-agent");

        let mut child = Self::new(
            self.settings.clone(),
            child_profile,
            Arc::clone(&self.provider),
            &child_id,
            self.context.current_depth + 1,
            Some(&self.context.agent_id),
        );
        // Traces and turn accounting stay consistent across the tree.
        child.context.rag_turn_id.clone_from(&self.context.rag_turn_id);
        child.context.rag_turn_counter = self.context.rag_turn_counter;
        child.context.rag_debug = self.context.rag_debug;
        child.context.confirm.clone_from(&self.context.confirm);
        child.context.dry_run = self.context.dry_run;

        Ok((child, task, label))
    }

    /// Spawn worker limit for a batch of the given size.
    pub(crate) fn spawn_workers(&self, batch_len: usize) -> usize {
        batch_len.min(self.settings.parallel_workers).max(1)
    }
}

impl std::fmt::Debug for RecursiveAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecursiveAgent")
            .field("agent_id", &self.context.agent_id)
            .field("depth", &self.context.current_depth)
            .field("messages", &self.context.messages.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_iterations_message_roundtrip() {
        let message = RecursiveAgent::format_max_iterations_message(20);
        assert!(message.starts_with("Maximum iterations reached (20)."));
        assert_eq!(RecursiveAgent::extract_max_iterations_limit(&message), Some(20));
        assert_eq!(RecursiveAgent::extract_max_iterations_limit("other text"), None);
    }

    #[test]
    fn test_canonical_error_messages() {
        assert!(
            RecursiveAgent::mention_grounding_error_message().contains("search_chunks")
        );
        let coverage =
            RecursiveAgent::mention_coverage_error_message(&["b.pdf".to_string()]);
        assert!(coverage.contains("Missing evidence scope for: @b.pdf"));
        assert!(
            RecursiveAgent::comparison_format_error_message().contains("grounded citations")
        );
    }
}
