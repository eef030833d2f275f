//! Chunk converted documents into retrievable fragments.
//!
//! Produces chunk streams for the indexer. Text-like documents yield a
//! single `text`-family stream with line locators; video documents yield
//! two streams: timed `video_transcript` windows and `video_frame`
//! description blocks, both with timecode locators.
//!
//! Chunk identity is stable: `doc_id` hashes `base_dir:path:checksum`
//! and `chunk_id` hashes `doc_id:modality:offset`, so re-chunking
//! unchanged content reproduces the same ids.

pub mod text;
pub mod timecode;
pub mod video;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::catalog::{FileEntry, FileType};
use crate::error::{ChunkingError, Result};
use crate::guard::normalize_path;

/// Approximate characters per token used for chunk budgets.
pub const CHARS_PER_TOKEN: usize = 4;

/// Source-kind label on a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Plain text or converted document body.
    Text,
    /// Image caption text.
    ImageCaption,
    /// Audio transcription.
    AudioTranscript,
    /// Timed video transcription window.
    VideoTranscript,
    /// Video frame description block.
    VideoFrame,
}

impl Modality {
    /// Stable lowercase label (used in chunk ids and the index).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::ImageCaption => "image_caption",
            Self::AudioTranscript => "audio_transcript",
            Self::VideoTranscript => "video_transcript",
            Self::VideoFrame => "video_frame",
        }
    }

    /// Parses a stored modality label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "text" => Some(Self::Text),
            "image_caption" => Some(Self::ImageCaption),
            "audio_transcript" => Some(Self::AudioTranscript),
            "video_transcript" => Some(Self::VideoTranscript),
            "video_frame" => Some(Self::VideoFrame),
            _ => None,
        }
    }

    /// True for the timed video streams.
    #[must_use]
    pub const fn is_video_temporal(self) -> bool {
        matches!(self, Self::VideoTranscript | Self::VideoFrame)
    }

    /// Modality of a text-chunked document with the given file type.
    #[must_use]
    pub const fn for_file_type(file_type: FileType) -> Self {
        match file_type {
            FileType::Audio => Self::AudioTranscript,
            FileType::Video => Self::VideoTranscript,
            FileType::Image => Self::ImageCaption,
            _ => Self::Text,
        }
    }
}

/// Per-chunk position record: line span or timecode span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    /// Line span in the converted file (1-indexed, inclusive).
    Lines {
        /// First line of the chunk.
        line_start: usize,
        /// Last line of the chunk.
        line_end: usize,
    },
    /// Timecode span, `HH:MM:SS` strings.
    Time {
        /// Window start.
        time_start: String,
        /// Window end.
        time_end: String,
    },
}

impl Locator {
    /// Parsed `time_start` in seconds, when this is a time locator.
    #[must_use]
    pub fn time_start_secs(&self) -> Option<f64> {
        match self {
            Self::Time { time_start, .. } => timecode::parse_timecode(time_start),
            Self::Lines { .. } => None,
        }
    }

    /// Parsed `time_end` in seconds, when this is a time locator.
    #[must_use]
    pub fn time_end_secs(&self) -> Option<f64> {
        match self {
            Self::Time { time_end, .. } => timecode::parse_timecode(time_end),
            Self::Lines { .. } => None,
        }
    }
}

/// A retrievable fragment of a converted document.
///
/// Chunks are derived values: they exist only between chunking and
/// indexing and are persisted as index records, never as objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id: SHA-1 of `doc_id:modality:offset`.
    pub chunk_id: String,
    /// Stable document id: SHA-1 of `base_dir:path:checksum`.
    pub doc_id: String,
    /// Source-kind label.
    pub modality: Modality,
    /// Relative path of the converted file this chunk came from.
    pub converted_path: String,
    /// Human-readable document name.
    pub doc_name: String,
    /// Original file-type label (`pdf`, `video`, ...).
    pub file_type: String,
    /// Position within the converted file.
    pub locator: Locator,
    /// Ordered section titles above this chunk.
    pub heading_path: Vec<String>,
    /// Chunk text.
    pub text: String,
}

/// Configurable chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Minimum chunk size in characters.
    pub min_chars: usize,
    /// Maximum chunk size in characters.
    pub max_chars: usize,
    /// Video transcript grouping window in seconds.
    pub video_window_secs: f64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_chars: 300 * CHARS_PER_TOKEN,
            max_chars: 800 * CHARS_PER_TOKEN,
            video_window_secs: 60.0,
        }
    }
}

impl ChunkerConfig {
    /// Builds a config from settings token budgets.
    #[must_use]
    pub const fn from_settings(settings: &crate::config::Settings) -> Self {
        Self {
            min_chars: settings.rag_chunk_min_tokens * CHARS_PER_TOKEN,
            max_chars: settings.rag_chunk_max_tokens * CHARS_PER_TOKEN,
            video_window_secs: settings.rag_video_window_seconds,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingError::InvalidConfig`] when budgets are zero or
    /// inverted.
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(ChunkingError::InvalidConfig {
                reason: "max_chars must be > 0".to_string(),
            }
            .into());
        }
        if self.min_chars > self.max_chars {
            return Err(ChunkingError::InvalidConfig {
                reason: format!(
                    "min_chars {} must not exceed max_chars {}",
                    self.min_chars, self.max_chars
                ),
            }
            .into());
        }
        Ok(())
    }
}

fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stable document id from base dir, relative path, and checksum.
#[must_use]
pub fn doc_id(base_dir: &Path, path: &str, checksum: &str) -> String {
    sha1_hex(&format!("{}:{path}:{checksum}", base_dir.display()))
}

/// Stable chunk id from document id, modality, and offset.
#[must_use]
pub fn chunk_id(doc_id: &str, modality: Modality, offset: u64) -> String {
    sha1_hex(&format!("{doc_id}:{}:{offset}", modality.as_str()))
}

/// Resolves `path_value` under `base_dir`, rejecting traversal and
/// outside paths. Returns `None` when unsafe.
#[must_use]
pub fn safe_resolve(base_dir: &Path, path_value: &str) -> Option<PathBuf> {
    let candidate = Path::new(path_value);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };
    let resolved = normalize_path(&joined);
    if resolved.starts_with(normalize_path(base_dir)) {
        Some(resolved)
    } else {
        None
    }
}

/// Path string stored in chunk source metadata: relative when inside the
/// base directory.
#[must_use]
pub fn path_for_output(base_dir: &Path, path: &Path) -> String {
    path.strip_prefix(normalize_path(base_dir)).map_or_else(
        |_| path.display().to_string(),
        |rel| rel.display().to_string(),
    )
}

/// Chunks one catalog entry, dispatching on its file type.
///
/// Missing or unsafe converted files produce an empty chunk list, not an
/// error.
#[must_use]
pub fn chunk_document(entry: &FileEntry, base_dir: &Path, config: &ChunkerConfig) -> Vec<Chunk> {
    let Some(converted_to) = entry.converted_to.as_deref() else {
        return Vec::new();
    };
    let Some(converted_path) = safe_resolve(base_dir, converted_to) else {
        return Vec::new();
    };
    if !converted_path.exists() {
        return Vec::new();
    }

    if entry.file_type == FileType::Video {
        return video::chunk_video_document(
            &converted_path,
            &entry.name,
            base_dir,
            &entry.path,
            &entry.frame_descriptions,
            config,
        );
    }

    text::chunk_text_document(
        &converted_path,
        &entry.name,
        entry.file_type,
        base_dir,
        &entry.path,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_doc_id_stable() {
        let base = Path::new("/vault");
        let a = doc_id(base, "papers/deep.pdf", "abc123");
        let b = doc_id(base, "papers/deep.pdf", "abc123");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_doc_id_changes_with_checksum() {
        let base = Path::new("/vault");
        let a = doc_id(base, "papers/deep.pdf", "abc123");
        let b = doc_id(base, "papers/deep.pdf", "def456");
        assert_ne!(a, b);
    }

    #[test]
    fn test_chunk_id_distinct_modalities() {
        let doc = doc_id(Path::new("/vault"), "talk.mp4", "c1");
        let transcript = chunk_id(&doc, Modality::VideoTranscript, 60);
        let frame = chunk_id(&doc, Modality::VideoFrame, 60);
        assert_ne!(transcript, frame);
    }

    #[test]
    fn test_safe_resolve_rejects_escape() {
        let base = Path::new("/vault");
        assert!(safe_resolve(base, ".converted/a.md").is_some());
        assert!(safe_resolve(base, "../outside.md").is_none());
        assert!(safe_resolve(base, "/etc/passwd").is_none());
    }

    #[test]
    fn test_modality_labels_roundtrip() {
        for modality in [
            Modality::Text,
            Modality::ImageCaption,
            Modality::AudioTranscript,
            Modality::VideoTranscript,
            Modality::VideoFrame,
        ] {
            assert_eq!(Modality::parse(modality.as_str()), Some(modality));
        }
        assert_eq!(Modality::parse("bogus"), None);
    }

    #[test]
    fn test_locator_serialization_shapes() {
        let lines = Locator::Lines {
            line_start: 3,
            line_end: 9,
        };
        let json = serde_json::to_string(&lines).unwrap_or_default();
        assert!(json.contains("line_start"));

        let time = Locator::Time {
            time_start: "00:10:05".to_string(),
            time_end: "00:11:02".to_string(),
        };
        let json = serde_json::to_string(&time).unwrap_or_default();
        assert!(json.contains("time_start"));
        let parsed: Option<Locator> = serde_json::from_str(&json).ok();
        assert_eq!(parsed, Some(time));
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkerConfig::default().validate().is_ok());
        let bad = ChunkerConfig {
            min_chars: 100,
            max_chars: 10,
            video_window_secs: 60.0,
        };
        assert!(bad.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_chunk_id_deterministic(offset in 0u64..100_000, checksum in "[a-f0-9]{8}") {
            let doc = doc_id(Path::new("/vault"), "a.md", &checksum);
            let first = chunk_id(&doc, Modality::Text, offset);
            let second = chunk_id(&doc, Modality::Text, offset);
            prop_assert_eq!(first, second);
        }
    }
}
