//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// flavia-rs: local vault assistant core.
#[derive(Debug, Parser)]
#[command(name = "flavia-rs", version, about, long_about = None)]
pub struct Cli {
    /// Vault base directory (default: current directory).
    #[arg(short, long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the content catalog from a full scan.
    Init {
        /// Extra ignore patterns (shell-style globs on names).
        #[arg(long = "ignore")]
        ignore_patterns: Vec<String>,
    },
    /// Incrementally update the content catalog.
    Update,
    /// Manage the retrieval index.
    Index {
        /// Index operation.
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Ask the agent a question grounded in the vault.
    Ask {
        /// The question.
        question: String,
        /// Iteration cap for the agent loop.
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Preview write operations instead of applying them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Query the content catalog.
    Catalog {
        /// Substring match on filename.
        #[arg(long)]
        name: Option<String>,
        /// Exact extension, e.g. `.pdf`.
        #[arg(long)]
        extension: Option<String>,
        /// Coarse file type.
        #[arg(long)]
        file_type: Option<String>,
        /// Lifecycle status.
        #[arg(long)]
        status: Option<String>,
        /// Substring search in path + summary + tags.
        #[arg(long)]
        text: Option<String>,
        /// Maximum results.
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show catalog and index statistics.
    Stats,
}

/// Index operations.
#[derive(Debug, Subcommand)]
pub enum IndexAction {
    /// Clear and rebuild the index from every converted document.
    Build {
        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },
    /// Index only new/modified documents, purging stale chunks.
    Update,
    /// Show index statistics.
    Status,
}
