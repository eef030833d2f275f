//! Timecode parsing and formatting for video streams.

/// Parses `HH:MM:SS`, `MM:SS`, or bare `SS` into seconds.
///
/// Returns `None` when the string is not a timecode.
#[must_use]
pub fn parse_timecode(tc: &str) -> Option<f64> {
    let parts: Vec<&str> = tc.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut values = Vec::with_capacity(parts.len());
    for part in parts {
        values.push(part.trim().parse::<f64>().ok()?);
    }
    match values.as_slice() {
        [h, m, s] => Some(h * 3600.0 + m * 60.0 + s),
        [m, s] => Some(m * 60.0 + s),
        [s] => Some(*s),
        _ => None,
    }
}

/// Formats seconds as `HH:MM:SS`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn seconds_to_timecode(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    };
    let h = (total / 3600.0) as u64;
    let m = ((total % 3600.0) / 60.0) as u64;
    let s = (total % 60.0) as u64;
    format!("{h:02}:{m:02}:{s:02}")
}
