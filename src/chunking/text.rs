//! Text-modality chunking: paragraphs, heading paths, size-bounded merge.
//!
//! Splits converted markdown on blank lines, tracks the running heading
//! path, groups consecutive paragraphs that share a heading path, and
//! merges within each run toward the configured character budgets.
//! Chunk-id offsets advance by `lines + 1` per emitted chunk, keeping
//! ids order-independent and stable across re-runs.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::catalog::{FileType, compute_checksum};

use super::{Chunk, ChunkerConfig, Locator, Modality, chunk_id, doc_id, path_for_output};

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^(#{1,6})\s+(.+)").unwrap()
    })
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"[.!?]\s+").unwrap()
    })
}

/// A paragraph with its 1-indexed line span.
#[derive(Debug, Clone)]
struct Paragraph {
    line_start: usize,
    line_end: usize,
    text: String,
}

/// A merged chunk body with its line span.
#[derive(Debug, Clone)]
struct MergedChunk {
    text: String,
    line_start: usize,
    line_end: usize,
}

/// Chunks a plain text/markdown converted document.
///
/// Unreadable files produce an empty list.
#[must_use]
pub fn chunk_text_document(
    converted_path: &Path,
    source_name: &str,
    file_type: FileType,
    base_dir: &Path,
    original_path: &str,
    config: &ChunkerConfig,
) -> Vec<Chunk> {
    let Ok(text) = std::fs::read_to_string(converted_path) else {
        return Vec::new();
    };

    let checksum = compute_checksum(converted_path);
    let doc = doc_id(base_dir, original_path, &checksum);
    let modality = Modality::for_file_type(file_type);
    let converted_rel = path_for_output(base_dir, converted_path);

    chunk_text(
        &text,
        &doc,
        modality,
        &converted_rel,
        source_name,
        file_type.as_str(),
        config,
    )
}

/// Chunks already-loaded text. Split out for the video-transcript
/// fallback path and tests.
#[must_use]
pub fn chunk_text(
    text: &str,
    doc: &str,
    modality: Modality,
    converted_rel: &str,
    source_name: &str,
    file_type_label: &str,
    config: &ChunkerConfig,
) -> Vec<Chunk> {
    let paragraphs = split_into_paragraphs(text);
    let runs = section_runs(&paragraphs);

    let mut chunks = Vec::new();
    let mut offset: u64 = 0;
    for (headings, paras) in runs {
        for merged in merge_paragraphs(&paras, config.min_chars, config.max_chars) {
            if merged.text.trim().is_empty() {
                continue;
            }
            let cid = chunk_id(doc, modality, offset);
            offset += merged.text.lines().count() as u64 + 1;
            chunks.push(Chunk {
                chunk_id: cid,
                doc_id: doc.to_string(),
                modality,
                converted_path: converted_rel.to_string(),
                doc_name: source_name.to_string(),
                file_type: file_type_label.to_string(),
                locator: Locator::Lines {
                    line_start: merged.line_start,
                    line_end: merged.line_end,
                },
                heading_path: headings.clone(),
                text: merged.text,
            });
        }
    }
    chunks
}

/// Splits text on blank lines, preserving non-empty paragraphs and their
/// 1-indexed line spans.
fn split_into_paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut para_start: Option<usize> = None;
    let lines: Vec<&str> = text.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            if let Some(start) = para_start.take() {
                paragraphs.push(Paragraph {
                    line_start: start,
                    line_end: line_no - 1,
                    text: current.join("\n"),
                });
                current.clear();
            }
        } else {
            if para_start.is_none() {
                para_start = Some(line_no);
            }
            current.push(line);
        }
    }
    if let Some(start) = para_start {
        paragraphs.push(Paragraph {
            line_start: start,
            line_end: lines.len(),
            text: current.join("\n"),
        });
    }
    paragraphs
}

/// Updates a heading path from a markdown heading line. A heading at
/// level N truncates deeper levels before appending its title.
fn heading_path_from_line(line: &str, current: &[String]) -> Option<Vec<String>> {
    let caps = heading_re().captures(line.trim())?;
    let level = caps.get(1).map_or(1, |m| m.as_str().len());
    let title = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
    let mut new_path: Vec<String> = current.iter().take(level.saturating_sub(1)).cloned().collect();
    new_path.push(title);
    Some(new_path)
}

/// Groups paragraphs into contiguous runs sharing a heading path,
/// stripping heading lines out of the content.
fn section_runs(paragraphs: &[Paragraph]) -> Vec<(Vec<String>, Vec<Paragraph>)> {
    let mut current_headings: Vec<String> = Vec::new();
    let mut with_context: Vec<(Vec<String>, Paragraph)> = Vec::new();

    for para in paragraphs {
        let first_line = para.text.lines().next().unwrap_or("");
        if let Some(updated) = heading_path_from_line(first_line, &current_headings) {
            current_headings = updated;
            // Drop the heading line itself from the paragraph content.
            let rest: Vec<&str> = para.text.lines().skip(1).collect();
            let rest_text = rest.join("\n").trim().to_string();
            if !rest_text.is_empty() {
                with_context.push((
                    current_headings.clone(),
                    Paragraph {
                        line_start: para.line_start + 1,
                        line_end: para.line_end,
                        text: rest_text,
                    },
                ));
            }
        } else {
            with_context.push((current_headings.clone(), para.clone()));
        }
    }

    let mut runs: Vec<(Vec<String>, Vec<Paragraph>)> = Vec::new();
    for (headings, para) in with_context {
        let continues_run = runs
            .last()
            .is_some_and(|(run_headings, _)| *run_headings == headings);
        if continues_run {
            if let Some((_, run)) = runs.last_mut() {
                run.push(para);
            }
        } else {
            runs.push((headings, vec![para]));
        }
    }
    runs
}

/// Merges short paragraphs and splits oversized ones into chunks with
/// line spans. Accumulates until at least `min_chars`, flushes, and
/// splits paragraphs beyond `max_chars` at sentence boundaries.
fn merge_paragraphs(paragraphs: &[Paragraph], min_chars: usize, max_chars: usize) -> Vec<MergedChunk> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_start: Option<usize> = None;
    let mut buffer_end: Option<usize> = None;

    let flush =
        |chunks: &mut Vec<MergedChunk>, buffer: &mut String, start: &mut Option<usize>, end: &mut Option<usize>| {
            if !buffer.trim().is_empty()
                && let (Some(s), Some(e)) = (*start, *end)
            {
                chunks.push(MergedChunk {
                    text: buffer.trim().to_string(),
                    line_start: s,
                    line_end: e,
                });
            }
            buffer.clear();
            *start = None;
            *end = None;
        };

    for para in paragraphs {
        if para.text.len() > max_chars {
            flush(&mut chunks, &mut buffer, &mut buffer_start, &mut buffer_end);
            for piece in split_by_sentences(&para.text, min_chars, max_chars) {
                chunks.push(MergedChunk {
                    text: piece,
                    line_start: para.line_start,
                    line_end: para.line_end,
                });
            }
        } else {
            if buffer.len() + para.text.len() + 2 > max_chars && !buffer.is_empty() {
                flush(&mut chunks, &mut buffer, &mut buffer_start, &mut buffer_end);
            }
            if buffer_start.is_none() {
                buffer_start = Some(para.line_start);
            }
            if !buffer.is_empty() {
                buffer.push_str("\n\n");
            }
            buffer.push_str(&para.text);
            buffer_end = Some(para.line_end);
            if buffer.len() >= min_chars {
                flush(&mut chunks, &mut buffer, &mut buffer_start, &mut buffer_end);
            }
        }
    }
    flush(&mut chunks, &mut buffer, &mut buffer_start, &mut buffer_end);
    chunks
}

/// Splits an oversized paragraph at sentence boundaries into pieces in
/// the [min, max] character range where possible.
fn split_by_sentences(text: &str, min_chars: usize, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut sentence_buffer = String::new();

    let mut sentences: Vec<&str> = Vec::new();
    let mut last = 0;
    for m in sentence_re().find_iter(text) {
        sentences.push(&text[last..m.end()]);
        last = m.end();
    }
    if last < text.len() {
        sentences.push(&text[last..]);
    }

    for sentence in sentences {
        let sentence = sentence.trim_end();
        if sentence_buffer.len() + sentence.len() + 1 > max_chars && !sentence_buffer.is_empty() {
            pieces.push(sentence_buffer.trim().to_string());
            sentence_buffer.clear();
        }
        if !sentence_buffer.is_empty() {
            sentence_buffer.push(' ');
        }
        sentence_buffer.push_str(sentence);
        if sentence_buffer.len() >= min_chars {
            pieces.push(sentence_buffer.trim().to_string());
            sentence_buffer.clear();
        }
    }
    if !sentence_buffer.trim().is_empty() {
        pieces.push(sentence_buffer.trim().to_string());
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ChunkerConfig {
        ChunkerConfig {
            min_chars: 40,
            max_chars: 120,
            video_window_secs: 60.0,
        }
    }

    fn run_chunker(text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
        chunk_text(text, "doc1", Modality::Text, ".converted/a.md", "a", "text", config)
    }

    #[test]
    fn test_paragraph_split_line_spans() {
        let text = "first para\nstill first\n\nsecond para\n\n\nthird";
        let paragraphs = split_into_paragraphs(text);
        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[0].line_start, 1);
        assert_eq!(paragraphs[0].line_end, 2);
        assert_eq!(paragraphs[1].line_start, 4);
        assert_eq!(paragraphs[2].text, "third");
    }

    #[test]
    fn test_heading_path_truncates_deeper_levels() {
        let current = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let updated = heading_path_from_line("## New", &current);
        assert_eq!(updated, Some(vec!["A".to_string(), "New".to_string()]));
    }

    #[test]
    fn test_chunks_carry_heading_path() {
        let text = "# Intro\n\nintro paragraph with enough words to emit a chunk right away\n\n\
                    ## Methods\n\nmethods paragraph also long enough to emit its own chunk here";
        let chunks = run_chunker(text, &small_config());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading_path, vec!["Intro".to_string()]);
        assert_eq!(
            chunks[1].heading_path,
            vec!["Intro".to_string(), "Methods".to_string()]
        );
    }

    #[test]
    fn test_short_paragraphs_merge() {
        let config = ChunkerConfig {
            min_chars: 60,
            max_chars: 400,
            video_window_secs: 60.0,
        };
        let text = "tiny one\n\ntiny two\n\ntiny three\n\ntiny four\n\ntiny five\n\ntiny six\n\ntiny seven";
        let chunks = run_chunker(text, &config);
        assert!(!chunks.is_empty());
        assert!(chunks.len() < 7, "short paragraphs should merge");
    }

    #[test]
    fn test_oversized_paragraph_splits_at_sentences() {
        let sentence = "This sentence is reasonably long and pads the paragraph body. ";
        let text = sentence.repeat(10);
        let chunks = run_chunker(&text, &small_config());
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 140, "piece too large: {}", chunk.text.len());
        }
    }

    #[test]
    fn test_chunk_ids_stable_across_reruns() {
        let text = "# Title\n\nA body paragraph that is long enough to flush as one chunk.\n\n\
                    Another paragraph with some further content to chunk.";
        let first = run_chunker(text, &small_config());
        let second = run_chunker(text, &small_config());
        let first_ids: Vec<&str> = first.iter().map(|c| c.chunk_id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_line_locators_point_into_source() {
        let text = "para one body that is long enough to flush by itself right here ok\n\n\
                    para two body that is also long enough to flush alone as well yes";
        let chunks = run_chunker(text, &small_config());
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].locator,
            Locator::Lines {
                line_start: 1,
                line_end: 1
            }
        );
        assert_eq!(
            chunks[1].locator,
            Locator::Lines {
                line_start: 3,
                line_end: 3
            }
        );
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(run_chunker("", &small_config()).is_empty());
        assert!(run_chunker("\n\n\n", &small_config()).is_empty());
    }

    #[test]
    fn test_missing_file_yields_empty() {
        let chunks = chunk_text_document(
            Path::new("/nonexistent/converted.md"),
            "name",
            FileType::Text,
            Path::new("/vault"),
            "a.md",
            &ChunkerConfig::default(),
        );
        assert!(chunks.is_empty());
    }
}
