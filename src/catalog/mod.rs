//! Content catalog: the central index of all vault files.
//!
//! Supports full scans, incremental updates with status transitions,
//! multi-filter queries, overview summaries, and JSON persistence under
//! `.flavia/content_catalog.json`.

pub mod scanner;

pub use scanner::{
    DirectoryNode, FileEntry, FileScanner, FileStatus, FileType, SourceType, compute_checksum,
};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CatalogError, Result};

/// Catalog schema version.
pub const CATALOG_VERSION: &str = "1.0";
/// Catalog file name inside the config directory.
pub const CATALOG_FILENAME: &str = "content_catalog.json";

/// Per-catalog settings persisted alongside the entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Convert binary documents automatically during setup.
    pub auto_convert: bool,
    /// Generate summaries automatically during setup.
    pub auto_summarize: bool,
    /// User ignore patterns applied on every scan.
    pub ignored_patterns: Vec<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            auto_convert: true,
            auto_summarize: false,
            ignored_patterns: Vec::new(),
        }
    }
}

/// Summary of an incremental update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSummary {
    /// Paths newly discovered.
    pub new: Vec<String>,
    /// Paths whose content changed.
    pub modified: Vec<String>,
    /// Paths no longer present.
    pub missing: Vec<String>,
    /// Paths unchanged (including mtime-only touches).
    pub unchanged: Vec<String>,
}

/// Aggregate catalog statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Number of non-missing files.
    pub total_files: usize,
    /// Total size of non-missing files in bytes.
    pub total_size_bytes: u64,
    /// Counts by file type label.
    pub by_type: BTreeMap<String, usize>,
    /// Counts by extension.
    pub by_extension: BTreeMap<String, usize>,
    /// Counts by status label.
    pub by_status: BTreeMap<String, usize>,
    /// Files with a summary.
    pub with_summary: usize,
    /// Files with a conversion.
    pub with_conversion: usize,
}

/// Query filters for [`Catalog::query`]. All filters are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Substring match on filename (case-insensitive).
    pub name: Option<String>,
    /// Exact extension match, e.g. `.pdf`.
    pub extension: Option<String>,
    /// Exact file-type match.
    pub file_type: Option<FileType>,
    /// Exact category match.
    pub category: Option<String>,
    /// Filter by summary presence.
    pub has_summary: Option<bool>,
    /// Filter by conversion presence.
    pub has_conversion: Option<bool>,
    /// Exact status match.
    pub status: Option<FileStatus>,
    /// Substring search in path + summary + tags (case-insensitive).
    pub text_search: Option<String>,
    /// Maximum results.
    pub limit: usize,
}

/// On-disk catalog document.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogDocument {
    version: String,
    catalog_created_at: String,
    catalog_updated_at: String,
    base_dir: String,
    settings: CatalogSettings,
    stats: CatalogStats,
    directory_tree: Option<DirectoryNode>,
    files: Vec<FileEntry>,
}

/// Central index of all files in a vault directory.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Vault base directory.
    base_dir: PathBuf,
    /// Schema version.
    version: String,
    /// Creation timestamp, ISO-8601 UTC.
    catalog_created_at: String,
    /// Last update timestamp, ISO-8601 UTC.
    catalog_updated_at: String,
    /// Entries keyed by relative path.
    files: BTreeMap<String, FileEntry>,
    /// Directory tree for overview summaries.
    directory_tree: Option<DirectoryNode>,
    /// Catalog settings.
    settings: CatalogSettings,
}

impl Catalog {
    /// Creates an empty catalog for a base directory.
    #[must_use]
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            version: CATALOG_VERSION.to_string(),
            catalog_created_at: String::new(),
            catalog_updated_at: String::new(),
            files: BTreeMap::new(),
            directory_tree: None,
            settings: CatalogSettings::default(),
        }
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the entries keyed by relative path.
    #[must_use]
    pub const fn files(&self) -> &BTreeMap<String, FileEntry> {
        &self.files
    }

    /// Returns a mutable entry by path.
    pub fn entry_mut(&mut self, path: &str) -> Option<&mut FileEntry> {
        self.files.get_mut(path)
    }

    /// Returns the directory tree from the latest scan.
    #[must_use]
    pub const fn directory_tree(&self) -> Option<&DirectoryNode> {
        self.directory_tree.as_ref()
    }

    /// Performs a full scan and builds the catalog from scratch.
    ///
    /// # Errors
    ///
    /// Returns an error when an ignore pattern does not compile.
    pub fn build(&mut self, ignore_patterns: &[String]) -> Result<&mut Self> {
        let patterns = if ignore_patterns.is_empty() {
            self.settings.ignored_patterns.clone()
        } else {
            ignore_patterns.to_vec()
        };
        let scanner = FileScanner::new(&self.base_dir, &patterns)?;
        let (entries, tree) = scanner.scan();

        let now = Utc::now().to_rfc3339();
        self.catalog_created_at = now.clone();
        self.catalog_updated_at = now;
        self.directory_tree = Some(tree);

        self.files.clear();
        for entry in entries {
            self.files.insert(entry.path.clone(), entry);
        }

        if !ignore_patterns.is_empty() {
            self.settings.ignored_patterns = ignore_patterns.to_vec();
        }

        Ok(self)
    }

    /// Incremental update: detect new, modified, and missing files.
    ///
    /// A file is `modified` iff its mtime changed AND its checksum
    /// changed; an mtime-only touch just refreshes timestamps. Modified
    /// entries keep `converted_to` and tags but lose their summary.
    ///
    /// # Errors
    ///
    /// Returns an error when the ignore patterns no longer compile.
    pub fn update(&mut self) -> Result<UpdateSummary> {
        let scanner = FileScanner::new(&self.base_dir, &self.settings.ignored_patterns)?;
        let (current_entries, tree) = scanner.scan();

        let current_paths: std::collections::BTreeSet<String> =
            current_entries.iter().map(|e| e.path.clone()).collect();
        let existing_paths: std::collections::BTreeSet<String> =
            self.files.keys().cloned().collect();

        let mut summary = UpdateSummary::default();

        for mut entry in current_entries {
            if !self.files.contains_key(&entry.path) {
                entry.status = FileStatus::New;
                summary.new.push(entry.path.clone());
                self.files.insert(entry.path.clone(), entry);
                continue;
            }
            let Some(old_entry) = self.files.get_mut(&entry.path) else {
                continue;
            };
            if entry.modified_at == old_entry.modified_at {
                old_entry.status = FileStatus::Current;
                summary.unchanged.push(entry.path);
            } else if entry.checksum_sha256 == old_entry.checksum_sha256 {
                // Timestamp changed but content didn't (touch).
                old_entry.modified_at = entry.modified_at;
                old_entry.indexed_at = entry.indexed_at;
                old_entry.status = FileStatus::Current;
                summary.unchanged.push(entry.path);
            } else {
                // Truly modified: carry conversion + tags, drop summary.
                entry.status = FileStatus::Modified;
                entry.summary = None;
                entry.converted_to = old_entry.converted_to.clone();
                entry.tags = old_entry.tags.clone();
                entry.frame_descriptions = old_entry.frame_descriptions.clone();
                summary.modified.push(entry.path.clone());
                *old_entry = entry;
            }
        }

        for path in existing_paths.difference(&current_paths) {
            if let Some(entry) = self.files.get_mut(path) {
                entry.status = FileStatus::Missing;
                summary.missing.push(path.clone());
            }
        }

        self.directory_tree = Some(tree);
        self.catalog_updated_at = Utc::now().to_rfc3339();

        Ok(summary)
    }

    /// Removes entries with status `missing`. Returns the purged paths.
    pub fn remove_missing(&mut self) -> Vec<String> {
        let to_remove: Vec<String> = self
            .files
            .iter()
            .filter(|(_, e)| e.status == FileStatus::Missing)
            .map(|(p, _)| p.clone())
            .collect();
        for path in &to_remove {
            self.files.remove(path);
        }
        to_remove
    }

    /// Transitions `new`/`modified` entries to `current` after indexing.
    pub fn mark_all_current(&mut self) {
        for entry in self.files.values_mut() {
            if matches!(entry.status, FileStatus::New | FileStatus::Modified) {
                entry.status = FileStatus::Current;
            }
        }
    }

    /// Queries the catalog with conjunctive filters.
    #[must_use]
    pub fn query(&self, query: &CatalogQuery) -> Vec<&FileEntry> {
        let limit = if query.limit == 0 { 50 } else { query.limit };
        let mut results = Vec::new();

        for entry in self.files.values() {
            if let Some(ref name) = query.name
                && !entry.name.to_lowercase().contains(&name.to_lowercase())
            {
                continue;
            }
            if let Some(ref extension) = query.extension
                && entry.extension != extension.to_lowercase()
            {
                continue;
            }
            if let Some(file_type) = query.file_type
                && entry.file_type != file_type
            {
                continue;
            }
            if let Some(ref category) = query.category
                && &entry.category != category
            {
                continue;
            }
            if let Some(has_summary) = query.has_summary
                && entry.summary.is_some() != has_summary
            {
                continue;
            }
            if let Some(has_conversion) = query.has_conversion
                && entry.converted_to.is_some() != has_conversion
            {
                continue;
            }
            if let Some(status) = query.status
                && entry.status != status
            {
                continue;
            }
            if let Some(ref text) = query.text_search {
                let needle = text.to_lowercase();
                let mut haystack = entry.path.to_lowercase();
                if let Some(ref summary) = entry.summary {
                    haystack.push(' ');
                    haystack.push_str(&summary.to_lowercase());
                }
                if !entry.tags.is_empty() {
                    haystack.push(' ');
                    haystack.push_str(&entry.tags.join(" ").to_lowercase());
                }
                if !haystack.contains(&needle) {
                    continue;
                }
            }

            results.push(entry);
            if results.len() >= limit {
                break;
            }
        }

        results
    }

    /// Entries with `new`/`modified` status.
    #[must_use]
    pub fn modified_files(&self) -> Vec<&FileEntry> {
        self.files
            .values()
            .filter(|e| matches!(e.status, FileStatus::New | FileStatus::Modified))
            .collect()
    }

    /// Binary documents without a converted sibling.
    #[must_use]
    pub fn files_needing_conversion(&self) -> Vec<&FileEntry> {
        self.files
            .values()
            .filter(|e| {
                e.file_type == FileType::BinaryDocument
                    && e.converted_to.is_none()
                    && e.status != FileStatus::Missing
            })
            .collect()
    }

    /// Text or converted files without a summary.
    #[must_use]
    pub fn files_needing_summary(&self) -> Vec<&FileEntry> {
        self.files
            .values()
            .filter(|e| {
                e.summary.is_none()
                    && e.status != FileStatus::Missing
                    && (e.file_type == FileType::Text || e.converted_to.is_some())
            })
            .collect()
    }

    /// Aggregate statistics over the catalog.
    #[must_use]
    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats::default();
        for entry in self.files.values() {
            *stats
                .by_status
                .entry(status_label(entry.status).to_string())
                .or_insert(0) += 1;
            if entry.status == FileStatus::Missing {
                continue;
            }
            stats.total_files += 1;
            stats.total_size_bytes += entry.size_bytes;
            *stats
                .by_type
                .entry(entry.file_type.as_str().to_string())
                .or_insert(0) += 1;
            *stats
                .by_extension
                .entry(entry.extension.clone())
                .or_insert(0) += 1;
            if entry.summary.is_some() {
                stats.with_summary += 1;
            }
            if entry.converted_to.is_some() {
                stats.with_conversion += 1;
            }
        }
        stats
    }

    /// Generates a compact text summary of the catalog for the system
    /// prompt: totals, type breakdown, depth-capped directory tree, and
    /// the first per-file summaries.
    #[must_use]
    pub fn generate_context_summary(&self, max_length: usize) -> String {
        let stats = self.stats();
        #[allow(clippy::cast_precision_loss)]
        let size_mb = stats.total_size_bytes as f64 / 1024.0 / 1024.0;
        let mut lines = vec![format!(
            "Project content catalog ({} files, {size_mb:.1} MB):",
            stats.total_files
        )];

        if !stats.by_type.is_empty() {
            let mut type_counts: Vec<(&String, &usize)> = stats.by_type.iter().collect();
            type_counts.sort_by_key(|(_, count)| std::cmp::Reverse(**count));
            let parts: Vec<String> = type_counts
                .iter()
                .map(|(label, count)| format!("{count} {label}"))
                .collect();
            lines.push(format!("  Types: {}", parts.join(", ")));
        }

        if let Some(tree) = &self.directory_tree {
            lines.push("\nDirectory structure:".to_string());
            render_tree(tree, &mut lines, 1, 3);
        }

        let mut summarized: Vec<&FileEntry> = self
            .files
            .values()
            .filter(|e| e.summary.is_some() && e.status != FileStatus::Missing)
            .collect();
        if !summarized.is_empty() {
            summarized.sort_by(|a, b| a.path.cmp(&b.path));
            lines.push("\nFile summaries:".to_string());
            for entry in summarized.iter().take(20) {
                if let Some(summary) = &entry.summary {
                    lines.push(format!("  - {}: {summary}", entry.path));
                }
            }
        }

        let mut result = lines.join("\n");
        if result.len() > max_length {
            let cut = result
                .char_indices()
                .take_while(|(i, _)| *i <= max_length.saturating_sub(3))
                .last()
                .map_or(0, |(i, _)| i);
            result.truncate(cut);
            result.push_str("...");
        }
        result
    }

    /// Saves the catalog to `<config_dir>/content_catalog.json`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Save`] on I/O or serialization failure.
    pub fn save(&self, config_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(config_dir)
            .map_err(|e| CatalogError::Save(e.to_string()))?;
        let catalog_path = config_dir.join(CATALOG_FILENAME);

        let document = CatalogDocument {
            version: self.version.clone(),
            catalog_created_at: self.catalog_created_at.clone(),
            catalog_updated_at: self.catalog_updated_at.clone(),
            base_dir: self.base_dir.display().to_string(),
            settings: self.settings.clone(),
            stats: self.stats(),
            directory_tree: self.directory_tree.clone(),
            files: self.files.values().cloned().collect(),
        };

        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| CatalogError::Save(e.to_string()))?;
        std::fs::write(&catalog_path, json).map_err(|e| CatalogError::Save(e.to_string()))?;

        Ok(catalog_path)
    }

    /// Loads the catalog from `<config_dir>/content_catalog.json`.
    ///
    /// Returns `None` when the file does not exist or cannot be parsed
    /// (a corrupt catalog triggers a full rebuild upstream).
    #[must_use]
    pub fn load(config_dir: &Path) -> Option<Self> {
        let catalog_path = config_dir.join(CATALOG_FILENAME);
        let json = std::fs::read_to_string(&catalog_path).ok()?;
        let document: CatalogDocument = match serde_json::from_str(&json) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %catalog_path.display(), error = %e, "corrupt catalog, treating as absent");
                return None;
            }
        };

        let mut catalog = Self::new(Path::new(&document.base_dir));
        catalog.version = document.version;
        catalog.catalog_created_at = document.catalog_created_at;
        catalog.catalog_updated_at = document.catalog_updated_at;
        catalog.settings = document.settings;
        catalog.directory_tree = document.directory_tree;
        for entry in document.files {
            catalog.files.insert(entry.path.clone(), entry);
        }
        Some(catalog)
    }

    /// Loads an existing catalog or builds a new one.
    ///
    /// # Errors
    ///
    /// Returns an error when a fresh build fails.
    pub fn load_or_build(base_dir: &Path, ignore_patterns: &[String]) -> Result<Self> {
        if let Some(catalog) = Self::load(&base_dir.join(".flavia")) {
            return Ok(catalog);
        }
        let mut catalog = Self::new(base_dir);
        catalog.build(ignore_patterns)?;
        Ok(catalog)
    }
}

const fn status_label(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Current => "current",
        FileStatus::New => "new",
        FileStatus::Modified => "modified",
        FileStatus::Missing => "missing",
    }
}

fn render_tree(node: &DirectoryNode, lines: &mut Vec<String>, indent: usize, max_depth: usize) {
    if indent > max_depth {
        return;
    }
    let prefix = "  ".repeat(indent);
    let summary_part = node
        .summary
        .as_ref()
        .map_or_else(String::new, |s| format!(" - {s}"));
    lines.push(format!(
        "{prefix}{}/ ({} files){summary_part}",
        node.name, node.file_count
    ));
    for child in &node.children {
        render_tree(child, lines, indent + 1, max_depth);
    }
}
