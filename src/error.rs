//! Error types for flavia-rs operations.
//!
//! This module provides a comprehensive error hierarchy using `thiserror` for
//! catalog, chunking, index, retrieval, agent, and tool operations.

use thiserror::Error;

/// Result type alias for flavia-rs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for flavia-rs operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Catalog-related errors (scanning, persistence).
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Chunking-related errors (text processing).
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Index-related errors (database operations).
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Retrieval-related errors (hybrid search pipeline).
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Agent-related errors (LLM calls, spawn execution).
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Catalog-specific errors for scan and persistence operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog file missing on disk.
    #[error("no content catalog found at {path}. Run: flavia-rs init")]
    NotFound {
        /// Expected catalog path.
        path: String,
    },

    /// Catalog JSON could not be parsed.
    #[error("corrupt catalog file: {0}")]
    Corrupt(String),

    /// Catalog could not be written.
    #[error("failed to save catalog: {0}")]
    Save(String),

    /// Invalid ignore pattern supplied by the user.
    #[error("invalid ignore pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it failed to compile.
        reason: String,
    },
}

/// Chunking-specific errors for text processing.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Invalid chunk configuration.
    #[error("invalid chunk configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
}

/// Index-specific errors for database operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Index database missing (index build not run).
    #[error("no search index found. Run: flavia-rs index build")]
    NotBuilt,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored vector has an unexpected dimension.
    #[error("embedding dimension mismatch: got {got}, expected {expected}")]
    DimensionMismatch {
        /// Actual vector dimension.
        got: usize,
        /// Expected vector dimension.
        expected: usize,
    },
}

/// Retrieval-specific errors for the hybrid search pipeline.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Query embedding failed after retries.
    #[error("failed to embed query: {0}")]
    QueryEmbedding(String),

    /// Stage B search failed.
    #[error("search failed: {0}")]
    Search(String),
}

/// Agent-specific errors for LLM and spawn operations.
#[derive(Error, Debug)]
pub enum AgentError {
    /// No API key configured for the provider.
    #[error("no API key configured. Set FLAVIA_API_KEY or OPENAI_API_KEY")]
    ApiKeyMissing,

    /// Authentication failed; not retryable.
    #[error("authentication failed for provider '{provider}': {message}")]
    Authentication {
        /// Provider identifier for the hint.
        provider: String,
        /// Underlying error detail.
        message: String,
    },

    /// Transport-level API failure (connection, timeout, 5xx, 429).
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Underlying error detail.
        message: String,
        /// HTTP status when known.
        status: Option<u16>,
    },

    /// The provider returned a response the agent could not use.
    #[error("response parse failed: {message}")]
    ResponseParse {
        /// Diagnostic message.
        message: String,
    },

    /// Spawn scheduling failure (task join, semaphore).
    #[error("spawn execution failed: {message}")]
    Spawn {
        /// Diagnostic message.
        message: String,
    },

    /// Profile configuration is invalid.
    #[error("invalid agent profile: {message}")]
    Profile {
        /// What was wrong with the profile.
        message: String,
    },
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Index(IndexError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

impl From<serde_yaml::Error> for AgentError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Profile {
            message: err.to_string(),
        }
    }
}

impl From<regex::Error> for ChunkingError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config {
            message: "bad config".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad config");
    }

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::NotFound {
            path: "/vault/.flavia/content_catalog.json".to_string(),
        };
        assert!(err.to_string().contains("flavia-rs init"));

        let err = CatalogError::Corrupt("unexpected EOF".to_string());
        assert!(err.to_string().contains("unexpected EOF"));
    }

    #[test]
    fn test_index_error_display() {
        let err = IndexError::NotBuilt;
        assert_eq!(
            err.to_string(),
            "no search index found. Run: flavia-rs index build"
        );

        let err = IndexError::DimensionMismatch {
            got: 384,
            expected: 768,
        };
        assert!(err.to_string().contains("384"));
        assert!(err.to_string().contains("768"));
    }

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::Authentication {
            provider: "openai".to_string(),
            message: "invalid key".to_string(),
        };
        assert!(err.to_string().contains("openai"));

        let err = AgentError::ApiKeyMissing;
        assert!(err.to_string().contains("FLAVIA_API_KEY"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: Error = rusqlite_err.into();
        assert!(matches!(err, Error::Index(IndexError::Database(_))));
    }

    #[test]
    fn test_error_from_catalog() {
        let cat_err = CatalogError::Save("disk full".to_string());
        let err: Error = cat_err.into();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[test]
    fn test_error_from_retrieval() {
        let ret_err = RetrievalError::QueryEmbedding("timeout".to_string());
        let err: Error = ret_err.into();
        assert!(matches!(err, Error::Retrieval(_)));
    }

    #[test]
    fn test_from_serde_json_error_to_index_error() {
        let json_err: serde_json::Error = match serde_json::from_str::<i32>("invalid") {
            Err(e) => e,
            Ok(_) => return,
        };
        let err: IndexError = json_err.into();
        assert!(matches!(err, IndexError::Serialization(_)));
    }
}
