//! File scanner for content cataloging.
//!
//! Walks a base directory, classifies files by extension, computes
//! streaming SHA-256 checksums, and produces [`FileEntry`] records plus
//! a [`DirectoryNode`] tree for overview summaries.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CatalogError, Result};

/// Coarse file-type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Plain text and source code.
    Text,
    /// Binary documents requiring conversion (PDF, Office, ...).
    BinaryDocument,
    /// Images.
    Image,
    /// Audio files.
    Audio,
    /// Video files.
    Video,
    /// Archives.
    Archive,
    /// Anything else.
    Other,
}

impl FileType {
    /// Lowercase label used in citations and filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::BinaryDocument => "binary_document",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Archive => "archive",
            Self::Other => "other",
        }
    }
}

/// Lifecycle status of a cataloged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Indexed and unchanged since the last scan.
    #[default]
    Current,
    /// Discovered by the latest scan.
    New,
    /// Content changed since the last scan (checksum differs).
    Modified,
    /// Previously cataloged but absent from the latest scan.
    Missing,
}

/// Origin of a cataloged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A file on the local filesystem.
    #[default]
    Local,
    /// Downloaded from YouTube.
    Youtube,
    /// Fetched from a web page.
    Webpage,
}

/// Metadata for a single cataloged file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Relative path from the base directory (unique key).
    pub path: String,
    /// Filename.
    pub name: String,
    /// File extension, lowercase, with dot.
    pub extension: String,
    /// Coarse type classification.
    pub file_type: FileType,
    /// Specific category, e.g. `python`, `pdf`, `mp3`.
    pub category: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Creation timestamp, ISO-8601 UTC.
    pub created_at: String,
    /// Last-modification timestamp, ISO-8601 UTC.
    pub modified_at: String,
    /// When this entry was cataloged, ISO-8601 UTC.
    pub indexed_at: String,
    /// SHA-256 of the file contents (hex). Empty when unreadable.
    pub checksum_sha256: String,
    /// Lifecycle status; transitions are produced only by the catalog.
    #[serde(default)]
    pub status: FileStatus,
    /// Relative path of the converted text sibling under `.converted/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_to: Option<String>,
    /// Short content summary, if one was generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Extraction quality: `good`, `partial`, or `poor`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_quality: Option<String>,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Where the file came from.
    #[serde(default)]
    pub source_type: SourceType,
    /// Original URL for online sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Provider metadata for online sources (title, duration, author, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_metadata: BTreeMap<String, String>,
    /// Fetch lifecycle for online sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_status: Option<String>,
    /// Relative paths of per-frame description files for videos.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frame_descriptions: Vec<String>,
}

/// A node in the directory tree used for overview summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Relative path from the base directory (`.` for the root).
    pub path: String,
    /// Directory name.
    pub name: String,
    /// Optional directory summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Recursive file count.
    #[serde(default)]
    pub file_count: usize,
    /// Child directories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DirectoryNode>,
}

/// Directories never scanned, regardless of user patterns.
const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".flavia",
    ".converted",
    ".index",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    "node_modules",
    ".venv",
    "venv",
    "env",
    ".tox",
    ".nox",
    "target",
    "dist",
    "build",
    ".idea",
    ".vscode",
];

/// Files never cataloged.
const DEFAULT_IGNORE_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Checksum read buffer size.
const CHECKSUM_BLOCK_SIZE: usize = 65536;

/// Scans a directory tree and collects file metadata.
pub struct FileScanner {
    base_dir: PathBuf,
    ignore_patterns: Option<GlobSet>,
}

impl FileScanner {
    /// Creates a scanner rooted at `base_dir` with optional user ignore
    /// patterns (shell-style globs matched against entry names).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidPattern`] when a pattern does not
    /// compile.
    pub fn new(base_dir: &Path, ignore_patterns: &[String]) -> Result<Self> {
        let ignore_patterns = if ignore_patterns.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in ignore_patterns {
                let glob = Glob::new(pattern).map_err(|e| CatalogError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                builder.add(glob);
            }
            Some(
                builder
                    .build()
                    .map_err(|e| CatalogError::InvalidPattern {
                        pattern: ignore_patterns.join(", "),
                        reason: e.to_string(),
                    })?,
            )
        };

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            ignore_patterns,
        })
    }

    /// Scans the base directory.
    ///
    /// Returns the collected entries (traversal order: per directory,
    /// subdirectories first, names case-insensitively sorted) and the
    /// directory tree.
    #[must_use]
    pub fn scan(&self) -> (Vec<FileEntry>, DirectoryNode) {
        let mut files = Vec::new();
        let root = self.build_directory_tree(&self.base_dir, &mut files);
        (files, root)
    }

    /// Scans a single file.
    #[must_use]
    pub fn scan_file(&self, file_path: &Path) -> Option<FileEntry> {
        if !file_path.is_file() {
            return None;
        }
        self.create_file_entry(file_path)
    }

    fn build_directory_tree(&self, directory: &Path, files: &mut Vec<FileEntry>) -> DirectoryNode {
        let rel_path = directory
            .strip_prefix(&self.base_dir)
            .map_or_else(|_| ".".to_string(), |p| {
                let s = p.to_string_lossy().to_string();
                if s.is_empty() { ".".to_string() } else { s }
            });
        let name = directory
            .file_name()
            .map_or_else(|| self.base_dir.display().to_string(), |n| n.to_string_lossy().to_string());

        let mut node = DirectoryNode {
            path: rel_path,
            name,
            summary: None,
            file_count: 0,
            children: Vec::new(),
        };

        let Ok(read_dir) = std::fs::read_dir(directory) else {
            return node;
        };
        let mut entries: Vec<PathBuf> = read_dir
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        // Directories first, then case-insensitive name order.
        entries.sort_by_key(|p| {
            (
                !p.is_dir(),
                p.file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default(),
            )
        });

        let mut file_count = 0;
        for entry in entries {
            let Some(entry_name) = entry.file_name().map(|n| n.to_string_lossy().to_string())
            else {
                continue;
            };
            if self.is_ignored(&entry_name) {
                continue;
            }
            if entry.is_dir() {
                if DEFAULT_IGNORE_DIRS.contains(&entry_name.as_str()) {
                    continue;
                }
                let child = self.build_directory_tree(&entry, files);
                file_count += child.file_count;
                node.children.push(child);
            } else if entry.is_file() {
                if DEFAULT_IGNORE_FILES.contains(&entry_name.as_str()) {
                    continue;
                }
                if let Some(file_entry) = self.create_file_entry(&entry) {
                    files.push(file_entry);
                    file_count += 1;
                }
            }
        }

        node.file_count = file_count;
        node
    }

    /// Creates a [`FileEntry`] for a single file. Unreadable files are
    /// skipped silently (returns `None`).
    fn create_file_entry(&self, file_path: &Path) -> Option<FileEntry> {
        let metadata = std::fs::metadata(file_path).ok()?;
        let rel_path = file_path
            .strip_prefix(&self.base_dir)
            .ok()?
            .to_string_lossy()
            .to_string();
        let extension = file_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        let (file_type, category) = classify_extension(&extension);
        let now = Utc::now().to_rfc3339();

        let created_at = metadata
            .created()
            .map_or_else(|_| now.clone(), |t| DateTime::<Utc>::from(t).to_rfc3339());
        let modified_at = metadata
            .modified()
            .map_or_else(|_| now.clone(), |t| DateTime::<Utc>::from(t).to_rfc3339());

        Some(FileEntry {
            path: rel_path,
            name: file_path.file_name()?.to_string_lossy().to_string(),
            extension,
            file_type,
            category,
            size_bytes: metadata.len(),
            created_at,
            modified_at,
            indexed_at: now,
            checksum_sha256: compute_checksum(file_path),
            status: FileStatus::Current,
            converted_to: None,
            summary: None,
            extraction_quality: None,
            tags: Vec::new(),
            source_type: SourceType::Local,
            source_url: None,
            source_metadata: BTreeMap::new(),
            fetch_status: None,
            frame_descriptions: Vec::new(),
        })
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignore_patterns
            .as_ref()
            .is_some_and(|set| set.is_match(name))
    }
}

/// Computes the streaming SHA-256 checksum of a file. Returns an empty
/// string when the file cannot be read.
#[must_use]
pub fn compute_checksum(file_path: &Path) -> String {
    let Ok(mut file) = File::open(file_path) else {
        return String::new();
    };
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHECKSUM_BLOCK_SIZE];
    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(_) => return String::new(),
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Classifies a file by its (lowercase, dotted) extension.
#[must_use]
pub fn classify_extension(ext: &str) -> (FileType, String) {
    const TEXT_CATEGORIES: &[(&str, &str)] = &[
        (".py", "python"),
        (".js", "javascript"),
        (".ts", "typescript"),
        (".c", "c"),
        (".cpp", "cpp"),
        (".h", "c_header"),
        (".hpp", "cpp_header"),
        (".java", "java"),
        (".go", "go"),
        (".rs", "rust"),
        (".rb", "ruby"),
        (".jl", "julia"),
        (".md", "markdown"),
        (".markdown", "markdown"),
        (".rst", "restructuredtext"),
        (".txt", "text"),
        (".log", "log"),
        (".tex", "latex"),
        (".bib", "bibtex"),
        (".json", "json"),
        (".yaml", "yaml"),
        (".yml", "yaml"),
        (".toml", "toml"),
        (".ini", "ini"),
        (".cfg", "config"),
        (".html", "html"),
        (".htm", "html"),
        (".xml", "xml"),
        (".css", "css"),
        (".sql", "sql"),
        (".sh", "shell"),
        (".bash", "shell"),
        (".zsh", "shell"),
        (".csv", "csv"),
        (".tsv", "tsv"),
    ];
    const TEXT_EXTRA: &[&str] = &[
        ".jsx", ".tsx", ".php", ".swift", ".kt", ".scala", ".r", ".m", ".lua", ".pl", ".ps1",
        ".bat", ".cmd", ".text", ".xhtml", ".conf", ".sty", ".cls", ".env", ".gitignore",
        ".dockerignore", ".graphql", ".scss", ".sass", ".less", ".vue", ".svelte",
    ];
    const BINARY_DOCUMENTS: &[(&str, &str)] = &[
        (".pdf", "pdf"),
        (".doc", "word"),
        (".docx", "word"),
        (".ppt", "presentation"),
        (".pptx", "presentation"),
        (".xls", "spreadsheet"),
        (".xlsx", "spreadsheet"),
        (".odt", "document"),
        (".ods", "spreadsheet"),
        (".odp", "presentation"),
        (".epub", "ebook"),
    ];
    const IMAGES: &[&str] = &[
        ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".tiff", ".tif", ".webp", ".ico", ".svg",
    ];
    const AUDIO: &[&str] = &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".wma", ".m4a"];
    const VIDEO: &[&str] = &[
        ".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".mpg", ".mpeg",
    ];
    const ARCHIVES: &[&str] = &[".zip", ".tar", ".gz", ".bz2", ".xz", ".7z", ".rar"];

    if let Some((_, category)) = TEXT_CATEGORIES.iter().find(|(e, _)| *e == ext) {
        return (FileType::Text, (*category).to_string());
    }
    if TEXT_EXTRA.contains(&ext) {
        return (FileType::Text, "text".to_string());
    }
    if let Some((_, category)) = BINARY_DOCUMENTS.iter().find(|(e, _)| *e == ext) {
        return (FileType::BinaryDocument, (*category).to_string());
    }
    let bare = ext.trim_start_matches('.').to_string();
    if IMAGES.contains(&ext) {
        return (FileType::Image, bare);
    }
    if AUDIO.contains(&ext) {
        return (FileType::Audio, bare);
    }
    if VIDEO.contains(&ext) {
        return (FileType::Video, bare);
    }
    if ARCHIVES.contains(&ext) {
        return (FileType::Archive, bare);
    }
    if bare.is_empty() {
        return (FileType::Other, "unknown".to_string());
    }
    (FileType::Other, bare)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(".py", FileType::Text, "python")]
    #[test_case(".md", FileType::Text, "markdown")]
    #[test_case(".pdf", FileType::BinaryDocument, "pdf")]
    #[test_case(".docx", FileType::BinaryDocument, "word")]
    #[test_case(".png", FileType::Image, "png")]
    #[test_case(".mp3", FileType::Audio, "mp3")]
    #[test_case(".mp4", FileType::Video, "mp4")]
    #[test_case(".zip", FileType::Archive, "zip")]
    #[test_case(".xyz", FileType::Other, "xyz")]
    #[test_case("", FileType::Other, "unknown")]
    fn test_classify(ext: &str, expected_type: FileType, expected_category: &str) {
        let (file_type, category) = classify_extension(ext);
        assert_eq!(file_type, expected_type);
        assert_eq!(category, expected_category);
    }

    #[test]
    fn test_scan_collects_files_and_tree() {
        let Ok(temp) = tempfile::tempdir() else { return };
        std::fs::create_dir_all(temp.path().join("docs")).ok();
        std::fs::write(temp.path().join("readme.md"), "# hello").ok();
        std::fs::write(temp.path().join("docs/paper.pdf"), b"%PDF-1.4").ok();
        std::fs::create_dir_all(temp.path().join(".git")).ok();
        std::fs::write(temp.path().join(".git/config"), "ignored").ok();

        let Ok(scanner) = FileScanner::new(temp.path(), &[]) else {
            return;
        };
        let (files, tree) = scanner.scan();

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"readme.md"));
        assert!(paths.iter().any(|p| p.ends_with("paper.pdf")));
        assert!(!paths.iter().any(|p| p.contains(".git")));
        assert_eq!(tree.file_count, 2);
    }

    #[test]
    fn test_scan_honors_user_patterns() {
        let Ok(temp) = tempfile::tempdir() else { return };
        std::fs::write(temp.path().join("keep.md"), "keep").ok();
        std::fs::write(temp.path().join("skip.tmp"), "skip").ok();

        let Ok(scanner) = FileScanner::new(temp.path(), &["*.tmp".to_string()]) else {
            return;
        };
        let (files, _) = scanner.scan();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "keep.md");
    }

    #[test]
    fn test_checksum_stable() {
        let Ok(temp) = tempfile::tempdir() else { return };
        let path = temp.path().join("a.txt");
        std::fs::write(&path, "content").ok();
        let first = compute_checksum(&path);
        let second = compute_checksum(&path);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_checksum_unreadable_is_empty() {
        assert_eq!(compute_checksum(Path::new("/nonexistent/file")), "");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = FileScanner::new(Path::new("/tmp"), &["[".to_string()]);
        assert!(result.is_err());
    }
}
