//! The recursive agent system: profiles, contexts, providers, tool
//! dispatch, the run loop, and the spawn scheduler.

pub mod context;
pub mod executor;
pub mod mentions;
pub mod message;
pub mod profile;
pub mod provider;
pub mod providers;
pub mod recursive;
pub mod spawn;
pub mod tool;

pub use context::{AgentContext, ConfirmFn};
pub use executor::ToolExecutor;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use profile::{AgentProfile, ProfileConfig};
pub use provider::LlmProvider;
pub use providers::openai::OpenAiProvider;
pub use recursive::{MAX_ITERATIONS, RecursiveAgent, RunOptions};
pub use tool::{SpawnRequest, ToolCall, ToolDefinition, ToolOutcome, ToolResult};
