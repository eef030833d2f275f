//! The agent's tool surface.
//!
//! Read, write, catalog, retrieval, spawn, and compaction tools. Every
//! tool result is a UTF-8 string; error results begin with `Error:` or
//! `Operation cancelled`. Spawn and compaction tools return control-flow
//! variants instead of strings.

pub mod backup;
pub mod catalog;
pub mod read;
pub mod registry;
pub mod search;
pub mod spawn;
pub mod write;

pub use registry::{ALL_TOOL_NAMES, WRITE_TOOL_NAMES, build_definitions, tool_is_available};
