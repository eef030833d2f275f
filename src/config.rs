//! Runtime settings with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::time::Duration;

use crate::error::{AgentError, Result};

/// Default chat model identifier.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default embedding model identifier.
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-ai/nomic-embed-text-v1.5";
/// Default minimum chunk size in approximate tokens.
const DEFAULT_CHUNK_MIN_TOKENS: usize = 300;
/// Default maximum chunk size in approximate tokens.
const DEFAULT_CHUNK_MAX_TOKENS: usize = 800;
/// Default video transcript window in seconds.
const DEFAULT_VIDEO_WINDOW_SECONDS: f64 = 60.0;
/// Default Stage-A catalog shortlist size.
const DEFAULT_CATALOG_ROUTER_K: usize = 20;
/// Default vector candidates before fusion.
const DEFAULT_VECTOR_K: usize = 15;
/// Default FTS candidates before fusion.
const DEFAULT_FTS_K: usize = 15;
/// Default RRF constant.
const DEFAULT_RRF_K: u32 = 60;
/// Default per-document diversity cap.
const DEFAULT_MAX_CHUNKS_PER_DOC: usize = 3;
/// Default number of parallel spawn workers.
const DEFAULT_PARALLEL_WORKERS: usize = 4;
/// Default embedding batch size per API call.
const DEFAULT_EMBED_BATCH_SIZE: usize = 64;
/// Default context window size when the provider does not report one.
const DEFAULT_MAX_CONTEXT_TOKENS: u32 = 128_000;
/// Default chat request timeout.
const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 60;
/// Default embedding request timeout.
const DEFAULT_EMBED_TIMEOUT_SECS: u64 = 120;

/// Application settings shared by the indexer, retriever, and agent.
#[derive(Debug, Clone)]
pub struct Settings {
    /// API key for the chat + embedding provider.
    pub api_key: Option<String>,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Chat model identifier.
    pub model: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Minimum chunk size in approximate tokens.
    pub rag_chunk_min_tokens: usize,
    /// Maximum chunk size in approximate tokens.
    pub rag_chunk_max_tokens: usize,
    /// Video transcript grouping window in seconds.
    pub rag_video_window_seconds: f64,
    /// Stage-A catalog shortlist size in doc ids.
    pub rag_catalog_router_k: usize,
    /// Vector search candidates before fusion.
    pub rag_vector_k: usize,
    /// FTS candidates before fusion.
    pub rag_fts_k: usize,
    /// RRF fusion constant.
    pub rag_rrf_k: u32,
    /// Maximum chunks per document in a result list.
    pub rag_max_chunks_per_doc: usize,
    /// Whether to expand video chunks into temporal bundles.
    pub rag_expand_video_temporal: bool,
    /// Persist retrieval traces to `.flavia/rag_debug.jsonl`.
    pub rag_debug: bool,
    /// Concurrency limit for parallel sub-agent spawns.
    pub parallel_workers: usize,
    /// Chunks per embedding API call.
    pub embed_batch_size: usize,
    /// Context window size used for compaction accounting.
    pub max_context_tokens: u32,
    /// Chat request timeout (read; connect is fixed at 10 s).
    pub chat_timeout: Duration,
    /// Embedding request timeout (read; connect is fixed at 10 s).
    pub embed_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            rag_chunk_min_tokens: DEFAULT_CHUNK_MIN_TOKENS,
            rag_chunk_max_tokens: DEFAULT_CHUNK_MAX_TOKENS,
            rag_video_window_seconds: DEFAULT_VIDEO_WINDOW_SECONDS,
            rag_catalog_router_k: DEFAULT_CATALOG_ROUTER_K,
            rag_vector_k: DEFAULT_VECTOR_K,
            rag_fts_k: DEFAULT_FTS_K,
            rag_rrf_k: DEFAULT_RRF_K,
            rag_max_chunks_per_doc: DEFAULT_MAX_CHUNKS_PER_DOC,
            rag_expand_video_temporal: true,
            rag_debug: false,
            parallel_workers: DEFAULT_PARALLEL_WORKERS,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            chat_timeout: Duration::from_secs(DEFAULT_CHAT_TIMEOUT_SECS),
            embed_timeout: Duration::from_secs(DEFAULT_EMBED_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    /// Creates a new builder for [`Settings`].
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Creates settings from environment variables with defaults.
    pub fn from_env() -> Self {
        Self::builder().from_env().build()
    }

    /// Returns the configured API key.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] when no key is configured.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AgentError::ApiKeyMissing.into())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Builder for [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
    rag_chunk_min_tokens: Option<usize>,
    rag_chunk_max_tokens: Option<usize>,
    rag_video_window_seconds: Option<f64>,
    rag_catalog_router_k: Option<usize>,
    rag_vector_k: Option<usize>,
    rag_fts_k: Option<usize>,
    rag_rrf_k: Option<u32>,
    rag_max_chunks_per_doc: Option<usize>,
    rag_expand_video_temporal: Option<bool>,
    rag_debug: Option<bool>,
    parallel_workers: Option<usize>,
    embed_batch_size: Option<usize>,
    max_context_tokens: Option<u32>,
}

impl SettingsBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = env_string("FLAVIA_API_KEY").or_else(|| env_string("OPENAI_API_KEY"));
        }
        if self.base_url.is_none() {
            self.base_url = env_string("FLAVIA_BASE_URL").or_else(|| env_string("OPENAI_BASE_URL"));
        }
        if self.model.is_none() {
            self.model = env_string("FLAVIA_MODEL");
        }
        if self.embedding_model.is_none() {
            self.embedding_model = env_string("FLAVIA_EMBEDDING_MODEL");
        }
        if self.rag_chunk_min_tokens.is_none() {
            self.rag_chunk_min_tokens = env_parse("FLAVIA_RAG_CHUNK_MIN_TOKENS");
        }
        if self.rag_chunk_max_tokens.is_none() {
            self.rag_chunk_max_tokens = env_parse("FLAVIA_RAG_CHUNK_MAX_TOKENS");
        }
        if self.rag_video_window_seconds.is_none() {
            self.rag_video_window_seconds = env_parse("FLAVIA_RAG_VIDEO_WINDOW_SECONDS");
        }
        if self.rag_catalog_router_k.is_none() {
            self.rag_catalog_router_k = env_parse("FLAVIA_RAG_CATALOG_ROUTER_K");
        }
        if self.rag_vector_k.is_none() {
            self.rag_vector_k = env_parse("FLAVIA_RAG_VECTOR_K");
        }
        if self.rag_fts_k.is_none() {
            self.rag_fts_k = env_parse("FLAVIA_RAG_FTS_K");
        }
        if self.rag_rrf_k.is_none() {
            self.rag_rrf_k = env_parse("FLAVIA_RAG_RRF_K");
        }
        if self.rag_max_chunks_per_doc.is_none() {
            self.rag_max_chunks_per_doc = env_parse("FLAVIA_RAG_MAX_CHUNKS_PER_DOC");
        }
        if self.rag_expand_video_temporal.is_none() {
            self.rag_expand_video_temporal = env_bool("FLAVIA_RAG_EXPAND_VIDEO_TEMPORAL");
        }
        if self.rag_debug.is_none() {
            self.rag_debug = env_bool("FLAVIA_RAG_DEBUG");
        }
        if self.parallel_workers.is_none() {
            self.parallel_workers = env_parse("FLAVIA_PARALLEL_WORKERS");
        }
        if self.embed_batch_size.is_none() {
            self.embed_batch_size = env_parse("FLAVIA_EMBED_BATCH_SIZE");
        }
        if self.max_context_tokens.is_none() {
            self.max_context_tokens = env_parse("FLAVIA_MAX_CONTEXT_TOKENS");
        }
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the chat model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets the chunk size bounds in approximate tokens.
    #[must_use]
    pub const fn chunk_tokens(mut self, min: usize, max: usize) -> Self {
        self.rag_chunk_min_tokens = Some(min);
        self.rag_chunk_max_tokens = Some(max);
        self
    }

    /// Sets the parallel spawn worker limit.
    #[must_use]
    pub const fn parallel_workers(mut self, n: usize) -> Self {
        self.parallel_workers = Some(n);
        self
    }

    /// Enables retrieval debug traces.
    #[must_use]
    pub const fn rag_debug(mut self, enabled: bool) -> Self {
        self.rag_debug = Some(enabled);
        self
    }

    /// Builds the settings, applying defaults for unset fields.
    #[must_use]
    pub fn build(self) -> Settings {
        let defaults = Settings::default();
        Settings {
            api_key: self.api_key,
            base_url: self.base_url,
            model: self.model.unwrap_or(defaults.model),
            embedding_model: self.embedding_model.unwrap_or(defaults.embedding_model),
            rag_chunk_min_tokens: self
                .rag_chunk_min_tokens
                .unwrap_or(defaults.rag_chunk_min_tokens),
            rag_chunk_max_tokens: self
                .rag_chunk_max_tokens
                .unwrap_or(defaults.rag_chunk_max_tokens),
            rag_video_window_seconds: self
                .rag_video_window_seconds
                .unwrap_or(defaults.rag_video_window_seconds),
            rag_catalog_router_k: self
                .rag_catalog_router_k
                .unwrap_or(defaults.rag_catalog_router_k),
            rag_vector_k: self.rag_vector_k.unwrap_or(defaults.rag_vector_k),
            rag_fts_k: self.rag_fts_k.unwrap_or(defaults.rag_fts_k),
            rag_rrf_k: self.rag_rrf_k.unwrap_or(defaults.rag_rrf_k),
            rag_max_chunks_per_doc: self
                .rag_max_chunks_per_doc
                .unwrap_or(defaults.rag_max_chunks_per_doc),
            rag_expand_video_temporal: self
                .rag_expand_video_temporal
                .unwrap_or(defaults.rag_expand_video_temporal),
            rag_debug: self.rag_debug.unwrap_or(defaults.rag_debug),
            parallel_workers: self.parallel_workers.unwrap_or(defaults.parallel_workers),
            embed_batch_size: self.embed_batch_size.unwrap_or(defaults.embed_batch_size),
            max_context_tokens: self
                .max_context_tokens
                .unwrap_or(defaults.max_context_tokens),
            chat_timeout: defaults.chat_timeout,
            embed_timeout: defaults.embed_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.rag_rrf_k, 60);
        assert_eq!(settings.rag_max_chunks_per_doc, 3);
        assert_eq!(settings.rag_chunk_min_tokens, 300);
        assert_eq!(settings.rag_chunk_max_tokens, 800);
        assert!(settings.rag_expand_video_temporal);
        assert!(!settings.rag_debug);
    }

    #[test]
    fn test_builder_overrides() {
        let settings = Settings::builder()
            .api_key("test-key")
            .model("test-model")
            .chunk_tokens(100, 200)
            .parallel_workers(2)
            .rag_debug(true)
            .build();
        assert_eq!(settings.api_key.as_deref(), Some("test-key"));
        assert_eq!(settings.model, "test-model");
        assert_eq!(settings.rag_chunk_min_tokens, 100);
        assert_eq!(settings.rag_chunk_max_tokens, 200);
        assert_eq!(settings.parallel_workers, 2);
        assert!(settings.rag_debug);
    }

    #[test]
    fn test_require_api_key_missing() {
        let settings = Settings::default();
        assert!(settings.require_api_key().is_err());
    }

    #[test]
    fn test_require_api_key_present() {
        let settings = Settings::builder().api_key("k").build();
        assert_eq!(settings.require_api_key().ok(), Some("k"));
    }
}
