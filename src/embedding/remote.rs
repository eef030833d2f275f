//! API-backed embedder over an OpenAI-compatible embeddings endpoint.
//!
//! Requests run with capped exponential backoff: rate limits, server
//! errors, and transport failures retry up to three times; client errors
//! (400/401/403) never retry.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{AgentError, Result};

use super::{EMBED_DIM, Embedder, l2_normalize};

/// Maximum retry attempts per embedding request.
const MAX_RETRIES: u32 = 3;

/// OpenAI-compatible embedding client.
pub struct ApiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl ApiEmbedder {
    /// Creates an embedder from settings (key, base URL, model).
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let mut config =
            OpenAIConfig::new().with_api_key(settings.api_key.clone().unwrap_or_default());
        if let Some(ref base_url) = settings.base_url {
            config = config.with_api_base(base_url);
        }
        Self {
            client: Client::with_config(config),
            model: settings.embedding_model.clone(),
        }
    }

    /// True when the error message indicates a non-retryable client
    /// failure (auth or malformed request).
    fn is_fatal(message: &str) -> bool {
        ["400", "401", "403", "invalid_api_key", "unauthorized"]
            .iter()
            .any(|marker| message.to_lowercase().contains(marker))
    }

    /// True when the error message indicates a transient failure worth
    /// retrying.
    fn is_transient(message: &str) -> bool {
        ["429", "500", "502", "503", "timeout", "connection"]
            .iter()
            .any(|marker| message.to_lowercase().contains(marker))
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = String::new();

        for attempt in 0..MAX_RETRIES {
            let request = CreateEmbeddingRequestArgs::default()
                .model(self.model.clone())
                .input(texts.to_vec())
                .build()
                .map_err(|e| AgentError::ApiRequest {
                    message: e.to_string(),
                    status: None,
                })?;

            match self.client.embeddings().create(request).await {
                Ok(response) => {
                    if response.data.len() != texts.len() {
                        return Err(AgentError::ResponseParse {
                            message: format!(
                                "embedding API returned {} embeddings for {} inputs",
                                response.data.len(),
                                texts.len()
                            ),
                        }
                        .into());
                    }
                    let mut vectors = Vec::with_capacity(response.data.len());
                    for data in response.data {
                        if data.embedding.len() != EMBED_DIM {
                            return Err(crate::error::IndexError::DimensionMismatch {
                                got: data.embedding.len(),
                                expected: EMBED_DIM,
                            }
                            .into());
                        }
                        vectors.push(l2_normalize(data.embedding));
                    }
                    return Ok(vectors);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if Self::is_fatal(&last_error) {
                        return Err(AgentError::Authentication {
                            provider: "embeddings".to_string(),
                            message: last_error,
                        }
                        .into());
                    }
                    if Self::is_transient(&last_error) && attempt < MAX_RETRIES - 1 {
                        let sleep_secs = 2u64.pow(attempt);
                        debug!(attempt, sleep_secs, "embedding request retry");
                        tokio::time::sleep(std::time::Duration::from_secs(sleep_secs)).await;
                        continue;
                    }
                    break;
                }
            }
        }

        warn!(error = %last_error, "embedding request failed after retries");
        Err(AgentError::ApiRequest {
            message: last_error,
            status: None,
        }
        .into())
    }
}

impl std::fmt::Debug for ApiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiEmbedder")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Embedder for ApiEmbedder {
    fn dimensions(&self) -> usize {
        EMBED_DIM
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.request_batch(&[text.to_string()]).await?;
        vectors.into_iter().next().ok_or_else(|| {
            AgentError::ResponseParse {
                message: "embedding API returned no vectors".to_string(),
            }
            .into()
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_batch(texts).await
    }
}
