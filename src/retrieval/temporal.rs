//! Temporal expansion of video hits into evidence bundles.
//!
//! A point match on a video transcript or frame expands into the
//! minimal coherent "what was said and shown around that moment":
//! transcript windows within ±15 s (±10 s for frame anchors) plus frame
//! descriptions in the same window, falling back to the nearest frame
//! within ±30 s per side when none qualify. Bundles list transcripts
//! first, then frames, each sorted by time.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::chunking::timecode::{parse_timecode, seconds_to_timecode};
use crate::chunking::{Locator, Modality, doc_id, safe_resolve};
use crate::index::IndexStore;

use super::ResultRow;

/// Transcript anchor half-window in seconds.
const TRANSCRIPT_WINDOW_SECS: f64 = 15.0;
/// Frame anchor half-window in seconds.
const FRAME_WINDOW_SECS: f64 = 10.0;
/// Nearest-frame fallback distance in seconds.
const NEAREST_FRAME_MAX_SECS: f64 = 30.0;

fn frame_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?i)^#{1,2}\s+(?:Visual\s+)?Frame\s+at\s+(\d{1,2}:\d{2}(?::\d{2})?)\s*$")
            .unwrap()
    })
}

fn frame_stem_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"frame_(\d{2})m(\d{2})s").unwrap()
    })
}

fn description_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?im)^##\s+Description\s*$").unwrap()
    })
}

/// One item of a temporal evidence bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleItem {
    /// `HH:MM:SS` or `HH:MM:SS–HH:MM:SS` display string.
    pub time_display: String,
    /// `(Audio)` for transcripts, `(Screen)` for frames.
    pub modality_label: String,
    /// Evidence text.
    pub text: String,
    /// Source modality label.
    pub modality: String,
}

/// A timed evidence item before formatting.
#[derive(Debug, Clone)]
struct TimedItem {
    time_start: f64,
    time_end: f64,
    text: String,
}

/// Expands every video temporal chunk in `results` with an evidence
/// bundle. Non-video rows pass through untouched.
pub fn expand_video_chunks(
    results: &mut [ResultRow],
    base_dir: &Path,
    store: &IndexStore,
    catalog: Option<&Catalog>,
) {
    for result in results.iter_mut() {
        if Modality::parse(&result.modality).is_some_and(Modality::is_video_temporal) {
            if let Some(bundle) = expand_temporal_window(result, base_dir, store, catalog) {
                result.temporal_bundle = Some(bundle);
            }
        }
    }
}

/// Expands one video chunk into a chronological evidence bundle.
///
/// Returns `None` when the chunk is not video-temporal or its locator
/// has no parseable anchor time.
#[must_use]
pub fn expand_temporal_window(
    anchor: &ResultRow,
    base_dir: &Path,
    store: &IndexStore,
    catalog: Option<&Catalog>,
) -> Option<Vec<BundleItem>> {
    let modality = Modality::parse(&anchor.modality)?;
    if !modality.is_video_temporal() {
        return None;
    }
    let anchor_time = anchor.locator.as_ref().and_then(Locator::time_start_secs)?;
    if anchor.doc_id.is_empty() {
        return None;
    }

    let window = if modality == Modality::VideoTranscript {
        TRANSCRIPT_WINDOW_SECS
    } else {
        FRAME_WINDOW_SECS
    };
    let range_start = anchor_time - window;
    let range_end = anchor_time + window;

    // Frames: all within the window, or the nearest per side within 30 s.
    let all_frames = frames_for_doc(&anchor.doc_id, base_dir, catalog);
    let mut frames_in_range: Vec<TimedItem> = all_frames
        .iter()
        .filter(|(time, _)| *time >= range_start && *time <= range_end)
        .filter_map(|(_, path)| read_frame_file(path))
        .collect();
    if frames_in_range.is_empty() {
        let (before, after) = nearest_frames(anchor_time, &all_frames);
        frames_in_range.extend(before);
        frames_in_range.extend(after);
        frames_in_range.sort_by(|a, b| {
            a.time_start
                .partial_cmp(&b.time_start)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    // Transcripts: every stored window whose start falls in range.
    let transcript_chunks = store
        .chunks_by_doc_id(&anchor.doc_id, Some(&[Modality::VideoTranscript]))
        .unwrap_or_default();
    let mut transcripts_in_range: Vec<TimedItem> = transcript_chunks
        .into_iter()
        .filter_map(|chunk| {
            let locator = chunk.locator.as_ref()?;
            let start = locator.time_start_secs()?;
            if start < range_start || start > range_end {
                return None;
            }
            let end = locator.time_end_secs().unwrap_or(start);
            Some(TimedItem {
                time_start: start,
                time_end: end,
                text: chunk.text,
            })
        })
        .collect();
    transcripts_in_range.sort_by(|a, b| {
        a.time_start
            .partial_cmp(&b.time_start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Some(format_bundle(&transcripts_in_range, &frames_in_range))
}

/// Frame description files for a document, `(seconds, path)` sorted by
/// time. Frame timecodes come from the `frame_MMmSSs` stem convention.
fn frames_for_doc(
    target_doc_id: &str,
    base_dir: &Path,
    catalog: Option<&Catalog>,
) -> Vec<(f64, PathBuf)> {
    let loaded;
    let catalog = match catalog {
        Some(catalog) => catalog,
        None => {
            let Some(c) = Catalog::load(&base_dir.join(".flavia")) else {
                return Vec::new();
            };
            loaded = c;
            &loaded
        }
    };

    let entry = catalog.files().values().find(|entry| {
        doc_id(base_dir, &entry.path, &entry.checksum_sha256) == target_doc_id
    });
    let Some(entry) = entry else {
        return Vec::new();
    };

    let mut frames = Vec::new();
    for frame_path_str in &entry.frame_descriptions {
        let Some(frame_path) = safe_resolve(base_dir, frame_path_str) else {
            continue;
        };
        if !frame_path.exists() {
            continue;
        }
        let stem = frame_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if let Some(caps) = frame_stem_re().captures(&stem) {
            let minutes: f64 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0.0);
            let seconds: f64 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0.0);
            frames.push((minutes * 60.0 + seconds, frame_path));
        }
    }
    frames.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    frames
}

/// Nearest frame before and after `center_time` within the fallback
/// distance.
fn nearest_frames(
    center_time: f64,
    all_frames: &[(f64, PathBuf)],
) -> (Option<TimedItem>, Option<TimedItem>) {
    let mut nearest_before: Option<TimedItem> = None;
    let mut nearest_after: Option<TimedItem> = None;
    let mut min_before = NEAREST_FRAME_MAX_SECS;
    let mut min_after = NEAREST_FRAME_MAX_SECS;

    for (time, path) in all_frames {
        let dist = time - center_time;
        if dist <= 0.0 && -dist <= min_before {
            if let Some(item) = read_frame_file(path) {
                min_before = -dist;
                nearest_before = Some(item);
            }
        }
        if dist > 0.0 && dist <= min_after {
            if let Some(item) = read_frame_file(path) {
                min_after = dist;
                nearest_after = Some(item);
            }
        }
    }

    (nearest_before, nearest_after)
}

/// Reads a frame description file: timecode from the `## Frame at`
/// heading (default 00:00:00), description after `## Description` or
/// front-matter.
fn read_frame_file(frame_path: &Path) -> Option<TimedItem> {
    let text = std::fs::read_to_string(frame_path).ok()?;

    let time = text
        .lines()
        .find_map(|line| {
            frame_heading_re()
                .captures(line.trim())
                .and_then(|caps| caps.get(1))
                .and_then(|m| parse_timecode(m.as_str()))
        })
        .unwrap_or(0.0);

    let description = if let Some(m) = description_heading_re().find(&text) {
        text[m.end()..].trim().to_string()
    } else if let Some(stripped) = text.strip_prefix("---") {
        stripped.find("\n---").map_or_else(
            || text.trim().to_string(),
            |end| stripped[end + 4..].trim().to_string(),
        )
    } else {
        text.trim().to_string()
    };

    Some(TimedItem {
        time_start: time,
        time_end: time,
        text: description,
    })
}

fn time_display(item: &TimedItem) -> String {
    if (item.time_start - item.time_end).abs() < f64::EPSILON {
        seconds_to_timecode(item.time_start)
    } else {
        format!(
            "{}–{}",
            seconds_to_timecode(item.time_start),
            seconds_to_timecode(item.time_end)
        )
    }
}

/// Formats the bundle: transcripts first, then frames, each sorted by
/// time, with `(Audio)`/`(Screen)` labels.
fn format_bundle(transcripts: &[TimedItem], frames: &[TimedItem]) -> Vec<BundleItem> {
    let mut bundle = Vec::with_capacity(transcripts.len() + frames.len());
    for item in transcripts {
        bundle.push(BundleItem {
            time_display: time_display(item),
            modality_label: "(Audio)".to_string(),
            text: item.text.clone(),
            modality: Modality::VideoTranscript.as_str().to_string(),
        });
    }
    for item in frames {
        bundle.push(BundleItem {
            time_display: time_display(item),
            modality_label: "(Screen)".to_string(),
            text: item.text.clone(),
            modality: Modality::VideoFrame.as_str().to_string(),
        });
    }
    bundle
}
