//! # flavia-rs
//!
//! Local vault assistant core: a content catalog over heterogeneous
//! files, a hybrid semantic/lexical retrieval index, and a recursive
//! tool-calling agent that answers questions grounded in the vault.
//!
//! ## Subsystems
//!
//! - **Catalog**: scans the vault, classifies files, tracks status
//!   transitions, persists to `.flavia/content_catalog.json`
//! - **Chunking**: splits converted documents into retrievable
//!   fragments with stable ids (text, video transcript, video frame)
//! - **Index**: one embedded `SQLite` database with co-resident vector,
//!   metadata, and FTS5 tables
//! - **Retrieval**: catalog router → vector + FTS → RRF fusion →
//!   diversity → coverage back-fill → temporal expansion
//! - **Agent**: recursive tool-calling loop with grounding policies,
//!   context compaction, and parallel sub-agent spawning

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod agent;
pub mod catalog;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod guard;
pub mod index;
pub mod indexer;
pub mod retrieval;
pub mod tools;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use catalog::{Catalog, DirectoryNode, FileEntry, FileStatus, FileType};
pub use chunking::{Chunk, ChunkerConfig, Locator, Modality};
pub use config::Settings;

// Re-export index types
pub use index::{IndexStats, IndexStore};

// Re-export retrieval types
pub use retrieval::{ResultRow, RetrievalMode, RetrievalParams, RetrievalTrace, retrieve};

// Re-export embedding types
pub use embedding::{EMBED_DIM, Embedder, HashEmbedder, cosine_similarity, create_embedder};

// Re-export agent types
pub use agent::{
    AgentContext, AgentProfile, LlmProvider, OpenAiProvider, RecursiveAgent, RunOptions,
};

// Re-export CLI types
pub use cli::{Cli, Commands};
