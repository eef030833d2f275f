//! Embedded retrieval index: vector table, metadata, and FTS5.

pub mod schema;
pub mod store;

pub use store::{FtsHit, IndexStats, IndexStore, StoredChunk, VectorHit};
