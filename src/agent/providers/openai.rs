//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, local proxies) via
//! the base URL override in [`Settings`]. Requests retry with capped
//! exponential backoff on transport failures; authentication errors are
//! fatal.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestToolMessage, ChatCompletionRequestUserMessage, ChatCompletionTool,
    ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequest,
    FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use tracing::debug;

use crate::config::Settings;
use crate::error::{AgentError, Result};

use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::ToolCall;

/// Maximum retry attempts per chat request.
const MAX_RETRIES: u32 = 3;

/// `OpenAI`-compatible LLM provider.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a new provider from settings.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let mut config =
            OpenAIConfig::new().with_api_key(settings.api_key.clone().unwrap_or_default());
        if let Some(ref base_url) = settings.base_url {
            config = config.with_api_base(base_url);
        }
        Self {
            client: Client::with_config(config),
        }
    }

    fn is_auth_error(message: &str) -> bool {
        let lowered = message.to_lowercase();
        ["401", "403", "invalid_api_key", "unauthorized", "authentication"]
            .iter()
            .any(|marker| lowered.contains(marker))
    }

    fn is_transient_error(message: &str) -> bool {
        let lowered = message.to_lowercase();
        ["429", "500", "502", "503", "timeout", "connection"]
            .iter()
            .any(|marker| lowered.contains(marker))
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: async_openai::types::ChatCompletionRequestSystemMessageContent::Text(
                        msg.content.clone(),
                    ),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                    msg.content.clone(),
                ),
                name: None,
            }),
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| ChatCompletionMessageToolCall {
                                id: tc.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                let content = if msg.content.is_empty() {
                    None
                } else {
                    Some(
                        async_openai::types::ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        ),
                    )
                };

                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content,
                    name: None,
                    tool_calls,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
            Role::Tool => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: async_openai::types::ChatCompletionRequestToolMessageContent::Text(
                    msg.content.clone(),
                ),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }),
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let (tools, tool_choice) = if request.tools.is_empty() {
            (None, None)
        } else {
            (
                Some(
                    request
                        .tools
                        .iter()
                        .map(|td| ChatCompletionTool {
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionObject {
                                name: td.name.clone(),
                                description: Some(td.description.clone()),
                                parameters: Some(td.parameters.clone()),
                                strict: None,
                            },
                        })
                        .collect(),
                ),
                Some(ChatCompletionToolChoiceOption::Auto),
            )
        };

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature.filter(|&t| t != 0.0),
            max_completion_tokens: request.max_tokens,
            tools,
            tool_choice,
            ..Default::default()
        }
    }

    fn convert_response(response: async_openai::types::CreateChatCompletionResponse) -> ChatResponse {
        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let tool_calls = choice
            .and_then(|c| c.message.tool_calls.as_ref())
            .map(|tcs| {
                tcs.iter()
                    .map(|tc| ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        ChatResponse {
            content,
            usage,
            tool_calls,
            finish_reason,
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut last_error = String::new();

        for attempt in 0..MAX_RETRIES {
            let openai_request = Self::build_request(request);
            match self.client.chat().create(openai_request).await {
                Ok(response) => return Ok(Self::convert_response(response)),
                Err(e) => {
                    last_error = e.to_string();
                    if Self::is_auth_error(&last_error) {
                        return Err(AgentError::Authentication {
                            provider: "openai".to_string(),
                            message: last_error,
                        }
                        .into());
                    }
                    if Self::is_transient_error(&last_error) && attempt < MAX_RETRIES - 1 {
                        let sleep_secs = 2u64.pow(attempt);
                        debug!(attempt, sleep_secs, "chat request retry");
                        tokio::time::sleep(std::time::Duration::from_secs(sleep_secs)).await;
                        continue;
                    }
                    break;
                }
            }
        }

        Err(AgentError::ApiRequest {
            message: last_error,
            status: None,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message;
    use crate::agent::tool::ToolDefinition;

    #[test]
    fn test_convert_system_message() {
        let msg = message::system_message("test");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_convert_tool_message() {
        let msg = message::tool_message("call_123", "result data");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_convert_assistant_with_tool_calls() {
        let msg = message::assistant_tool_calls_message(vec![ToolCall {
            id: "call_1".to_string(),
            name: "search_chunks".to_string(),
            arguments: r#"{"query":"q"}"#.to_string(),
        }]);
        let converted = OpenAiProvider::convert_message(&msg);
        if let ChatCompletionRequestMessage::Assistant(a) = converted {
            assert_eq!(a.tool_calls.as_ref().map_or(0, Vec::len), 1);
        } else {
            unreachable!("expected assistant message");
        }
    }

    #[test]
    fn test_build_request_with_tools() {
        let request = ChatRequest {
            model: "test-model".to_string(),
            messages: vec![message::user_message("test")],
            temperature: Some(0.0),
            max_tokens: Some(100),
            tools: vec![ToolDefinition {
                name: "read_file".to_string(),
                description: "Read a file".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }],
        };
        let built = OpenAiProvider::build_request(&request);
        assert_eq!(built.tools.as_ref().map_or(0, Vec::len), 1);
        assert!(built.tool_choice.is_some());
        // Zero temperature is elided rather than sent.
        assert!(built.temperature.is_none());
    }

    #[test]
    fn test_error_classification() {
        assert!(OpenAiProvider::is_auth_error("HTTP 401 Unauthorized"));
        assert!(OpenAiProvider::is_auth_error("invalid_api_key"));
        assert!(!OpenAiProvider::is_auth_error("429 rate limit"));
        assert!(OpenAiProvider::is_transient_error("429 rate limit"));
        assert!(OpenAiProvider::is_transient_error("connection refused"));
        assert!(!OpenAiProvider::is_transient_error("404 not found"));
    }
}
