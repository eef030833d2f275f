//! Video chunking: timed transcript windows and frame descriptions.
//!
//! The transcript stream isolates the body after `## Transcription`,
//! parses per-line timecodes, and groups segments into windows of
//! roughly `video_window_secs`. Each window's chunk id uses the integer
//! start second as its offset, so ids survive re-runs. Frame description
//! files split on `## Frame at HH:MM:SS` headings into point-in-time
//! chunks.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::catalog::{FileType, compute_checksum};

use super::text::chunk_text;
use super::timecode::{parse_timecode, seconds_to_timecode};
use super::{Chunk, ChunkerConfig, Locator, Modality, chunk_id, doc_id, path_for_output, safe_resolve};

fn transcription_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?im)^##\s+Transcription\s*$").unwrap()
    })
}

fn timecode_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(
            r"^\[?\s*(\d{1,2}:\d{2}(?::\d{2})?)\s*(?:-\s*(\d{1,2}:\d{2}(?::\d{2})?))?\s*\]?\s*(.*)$",
        )
        .unwrap()
    })
}

fn frame_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?i)^#{1,2}\s+(?:Visual\s+)?Frame\s+at\s+(\d{1,2}:\d{2}(?::\d{2})?)\s*$")
            .unwrap()
    })
}

fn description_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?im)^##\s+Description\s*$").unwrap()
    })
}

/// A timed transcript segment.
#[derive(Debug, Clone)]
struct Segment {
    start: f64,
    end: f64,
    text: String,
}

/// Chunks a video document: transcript stream plus frame stream.
///
/// Unsafe or unreadable inputs contribute nothing; a transcript without
/// any parseable timecodes falls back to text chunking.
#[must_use]
pub fn chunk_video_document(
    converted_path: &Path,
    source_name: &str,
    base_dir: &Path,
    original_path: &str,
    frame_desc_paths: &[String],
    config: &ChunkerConfig,
) -> Vec<Chunk> {
    let checksum = compute_checksum(converted_path);
    let doc = doc_id(base_dir, original_path, &checksum);

    let mut chunks = Vec::new();

    let transcript_text = std::fs::read_to_string(converted_path).unwrap_or_default();
    if !transcript_text.trim().is_empty() {
        chunks.extend(chunk_video_transcript(
            &transcript_text,
            &doc,
            source_name,
            base_dir,
            converted_path,
            config,
        ));
    }

    for frame_path_str in frame_desc_paths {
        let Some(frame_path) = safe_resolve(base_dir, frame_path_str) else {
            continue;
        };
        let Ok(frame_text) = std::fs::read_to_string(&frame_path) else {
            continue;
        };
        chunks.extend(chunk_frame_descriptions(
            &frame_text,
            &doc,
            source_name,
            base_dir,
            &frame_path,
        ));
    }

    chunks
}

/// Returns the content after a `## Transcription` heading when present.
fn extract_transcription_body(text: &str) -> &str {
    transcription_heading_re()
        .find(text)
        .map_or(text, |m| &text[m.end()..])
}

/// Produces `video_transcript` chunks grouped into windows.
fn chunk_video_transcript(
    text: &str,
    doc: &str,
    source_name: &str,
    base_dir: &Path,
    converted_path: &Path,
    config: &ChunkerConfig,
) -> Vec<Chunk> {
    let body = extract_transcription_body(text);
    let mut segments: Vec<Segment> = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = timecode_line_re().captures(line).and_then(|caps| {
            let start_tc = caps.get(1)?.as_str();
            let start = parse_timecode(start_tc)?;
            let end = caps
                .get(2)
                .and_then(|m| parse_timecode(m.as_str()))
                .unwrap_or(start);
            let content = caps.get(3).map_or("", |m| m.as_str()).trim().to_string();
            if content.is_empty() {
                None
            } else {
                Some(Segment {
                    start,
                    end,
                    text: content,
                })
            }
        });
        match parsed {
            Some(segment) => segments.push(segment),
            None => {
                // Untimed line: append to the previous segment.
                if let Some(prev) = segments.last_mut() {
                    prev.text.push(' ');
                    prev.text.push_str(line);
                }
            }
        }
    }

    if segments.is_empty() {
        // No timecodes detectable: fall back to text chunking.
        let converted_rel = path_for_output(base_dir, converted_path);
        return chunk_text(
            text,
            doc,
            Modality::for_file_type(FileType::Video),
            &converted_rel,
            source_name,
            FileType::Video.as_str(),
            config,
        );
    }

    let converted_rel = path_for_output(base_dir, converted_path);
    let mut chunks = Vec::new();
    let mut window_start = segments[0].start;
    let mut window: Vec<Segment> = Vec::new();

    let flush = |chunks: &mut Vec<Chunk>, window: &mut Vec<Segment>| {
        if window.is_empty() {
            return;
        }
        let t_start = window[0].start;
        let t_end = window[window.len() - 1].end;
        let combined: Vec<&str> = window.iter().map(|s| s.text.as_str()).collect();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let offset = t_start.max(0.0) as u64;
        chunks.push(Chunk {
            chunk_id: chunk_id(doc, Modality::VideoTranscript, offset),
            doc_id: doc.to_string(),
            modality: Modality::VideoTranscript,
            converted_path: converted_rel.clone(),
            doc_name: source_name.to_string(),
            file_type: FileType::Video.as_str().to_string(),
            locator: Locator::Time {
                time_start: seconds_to_timecode(t_start),
                time_end: seconds_to_timecode(t_end),
            },
            heading_path: Vec::new(),
            text: combined.join(" "),
        });
        window.clear();
    };

    for segment in segments {
        if !window.is_empty() && (segment.start - window_start) >= config.video_window_secs {
            flush(&mut chunks, &mut window);
            window_start = segment.start;
        }
        window.push(segment);
    }
    flush(&mut chunks, &mut window);
    chunks
}

/// Extracts the human description from frame markdown body lines:
/// everything after `## Description`, or after front-matter delimiters.
fn extract_frame_description(lines: &[String]) -> String {
    let text = lines.join("\n").trim().to_string();
    if text.is_empty() {
        return String::new();
    }
    if let Some(m) = description_heading_re().find(&text) {
        return text[m.end()..].trim().to_string();
    }
    if let Some(stripped) = text.strip_prefix("---")
        && let Some(end) = stripped.find("\n---")
    {
        return stripped[end + 4..].trim().to_string();
    }
    text
}

/// Produces `video_frame` chunks from a frame-description markdown file.
fn chunk_frame_descriptions(
    text: &str,
    doc: &str,
    source_name: &str,
    base_dir: &Path,
    frame_path: &Path,
) -> Vec<Chunk> {
    let frame_rel = path_for_output(base_dir, frame_path);
    let mut chunks = Vec::new();
    let mut current_tc: Option<String> = None;
    let mut current_lines: Vec<String> = Vec::new();

    let flush = |chunks: &mut Vec<Chunk>, tc: &mut Option<String>, lines: &mut Vec<String>| {
        let Some(tc_value) = tc.take() else {
            lines.clear();
            return;
        };
        let description = extract_frame_description(lines);
        lines.clear();
        if description.is_empty() {
            return;
        }
        let t = parse_timecode(&tc_value).unwrap_or(0.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let offset = t.max(0.0) as u64;
        let timecode = seconds_to_timecode(t);
        chunks.push(Chunk {
            chunk_id: chunk_id(doc, Modality::VideoFrame, offset),
            doc_id: doc.to_string(),
            modality: Modality::VideoFrame,
            converted_path: frame_rel.clone(),
            doc_name: source_name.to_string(),
            file_type: FileType::Video.as_str().to_string(),
            locator: Locator::Time {
                time_start: timecode.clone(),
                time_end: timecode,
            },
            heading_path: vec![format!("Frame at {tc_value}")],
            text: description,
        });
    };

    for line in text.lines() {
        if let Some(caps) = frame_heading_re().captures(line.trim()) {
            flush(&mut chunks, &mut current_tc, &mut current_lines);
            current_tc = caps.get(1).map(|m| m.as_str().to_string());
        } else if current_tc.is_some() {
            current_lines.push(line.to_string());
        }
    }
    flush(&mut chunks, &mut current_tc, &mut current_lines);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TRANSCRIPT: &str = "\
# Talk

## Transcription

[00:00:05] Welcome to the session.
[00:00:40 - 00:00:55] Today we cover retrieval.
and ranking fusion.
[00:01:20] Second window begins here.
[00:02:30] Third window starts now.
";

    fn vault_with_transcript() -> Option<(TempDir, Vec<Chunk>)> {
        let temp = TempDir::new().ok()?;
        let converted = temp.path().join(".converted/talk.md");
        std::fs::create_dir_all(converted.parent()?).ok()?;
        std::fs::write(&converted, TRANSCRIPT).ok()?;
        let chunks = chunk_video_document(
            &converted,
            "talk.mp4",
            temp.path(),
            "talk.mp4",
            &[],
            &ChunkerConfig::default(),
        );
        Some((temp, chunks))
    }

    #[test]
    fn test_transcript_windows() {
        let Some((_temp, chunks)) = vault_with_transcript() else {
            return;
        };
        // 60-second windows: [5..55], [80], [150].
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.modality == Modality::VideoTranscript));
        assert_eq!(
            chunks[0].locator,
            Locator::Time {
                time_start: "00:00:05".to_string(),
                time_end: "00:00:55".to_string(),
            }
        );
        // Untimed continuation lines concatenate onto the prior segment.
        assert!(chunks[0].text.contains("and ranking fusion."));
    }

    #[test]
    fn test_window_chunk_id_uses_start_second() {
        let Some((_temp, chunks)) = vault_with_transcript() else {
            return;
        };
        let expected = chunk_id(&chunks[0].doc_id, Modality::VideoTranscript, 5);
        assert_eq!(chunks[0].chunk_id, expected);
    }

    #[test]
    fn test_untimed_transcript_falls_back_to_text() {
        let Ok(temp) = TempDir::new() else { return };
        let converted = temp.path().join(".converted/talk.md");
        std::fs::create_dir_all(converted.parent().unwrap_or(temp.path())).ok();
        std::fs::write(
            &converted,
            "## Transcription\n\nNo timecodes in this transcript at all, just prose long enough to chunk.",
        )
        .ok();
        let chunks = chunk_video_document(
            &converted,
            "talk.mp4",
            temp.path(),
            "talk.mp4",
            &[],
            &ChunkerConfig {
                min_chars: 20,
                max_chars: 400,
                video_window_secs: 60.0,
            },
        );
        assert!(!chunks.is_empty());
        assert!(matches!(chunks[0].locator, Locator::Lines { .. }));
    }

    #[test]
    fn test_frame_descriptions() {
        let Ok(temp) = TempDir::new() else { return };
        let converted = temp.path().join(".converted/talk.md");
        let frames = temp.path().join(".converted/talk_frames.md");
        std::fs::create_dir_all(converted.parent().unwrap_or(temp.path())).ok();
        std::fs::write(&converted, TRANSCRIPT).ok();
        std::fs::write(
            &frames,
            "## Frame at 00:00:10\n\n## Description\n\nA title slide.\n\n\
             ## Frame at 00:01:30\n\nA diagram of the pipeline.\n",
        )
        .ok();

        let chunks = chunk_video_document(
            &converted,
            "talk.mp4",
            temp.path(),
            "talk.mp4",
            &[".converted/talk_frames.md".to_string()],
            &ChunkerConfig::default(),
        );

        let frames: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.modality == Modality::VideoFrame)
            .collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].text, "A title slide.");
        assert_eq!(frames[0].heading_path, vec!["Frame at 00:00:10".to_string()]);
        assert_eq!(
            frames[1].locator,
            Locator::Time {
                time_start: "00:01:30".to_string(),
                time_end: "00:01:30".to_string(),
            }
        );
    }

    #[test]
    fn test_frame_front_matter_description() {
        let lines = vec![
            "---".to_string(),
            "source: ffmpeg".to_string(),
            "---".to_string(),
            "Slide with a bar chart.".to_string(),
        ];
        assert_eq!(extract_frame_description(&lines), "Slide with a bar chart.");
    }

    #[test]
    fn test_unsafe_frame_paths_skipped() {
        let Ok(temp) = TempDir::new() else { return };
        let converted = temp.path().join(".converted/talk.md");
        std::fs::create_dir_all(converted.parent().unwrap_or(temp.path())).ok();
        std::fs::write(&converted, TRANSCRIPT).ok();
        let chunks = chunk_video_document(
            &converted,
            "talk.mp4",
            temp.path(),
            "talk.mp4",
            &["../outside_frames.md".to_string()],
            &ChunkerConfig::default(),
        );
        assert!(chunks.iter().all(|c| c.modality == Modality::VideoTranscript));
    }
}
