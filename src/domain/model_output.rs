//! Schema-validating parsers for free-form text-analysis output.
//!
//! The analysis collaborator is asked for bare JSON but may wrap it in
//! commentary or code fences. Everything that scrapes and validates that
//! output lives here; callers only see a typed value or a `ParseError`.

use crate::domain::segments::{EventMap, Segment};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no JSON {0} found in model output")]
    NoJson(&'static str),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("segment plan is empty")]
    Empty,

    #[error("segment {index} invalid: {reason}")]
    InvalidSegment { index: usize, reason: String },
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)```").expect("valid regex"))
}

fn event_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9_]+").expect("valid regex"))
}

/// Body of the first fenced block, or the whole text when unfenced.
fn unfence(raw: &str) -> &str {
    fence_re()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim()
}

/// Substring from the first `open` to the last `close`, inclusive.
fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Recover and validate a mood segment plan.
///
/// Valid plans are non-empty, every segment has finite bounds with
/// `end > start >= 0`, and starts never decrease. Gaps and overlaps between
/// neighbours are left as returned.
pub fn parse_segment_plan(raw: &str) -> Result<Vec<Segment>, ParseError> {
    let body = delimited(unfence(raw), '[', ']')
        .or_else(|| delimited(raw, '[', ']'))
        .ok_or(ParseError::NoJson("array"))?;
    let segments: Vec<Segment> = serde_json::from_str(body)?;

    if segments.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut previous_start = f64::NEG_INFINITY;
    for (index, segment) in segments.iter().enumerate() {
        let invalid = |reason: String| ParseError::InvalidSegment { index, reason };
        if !segment.start.is_finite() || !segment.end.is_finite() {
            return Err(invalid("non-finite bound".to_string()));
        }
        if segment.start < 0.0 {
            return Err(invalid(format!("negative start {}", segment.start)));
        }
        if segment.end <= segment.start {
            return Err(invalid(format!(
                "end {} not after start {}",
                segment.end, segment.start
            )));
        }
        if segment.start < previous_start {
            return Err(invalid(format!(
                "start {} before previous start {}",
                segment.start, previous_start
            )));
        }
        previous_start = segment.start;
    }

    Ok(segments)
}

/// Recover a sound-event map, keeping only timestamps inside `[0, duration)`.
///
/// Event names are normalised to lowercase snake case; types left without
/// any usable timestamp are dropped.
pub fn parse_event_map(raw: &str, duration: f64) -> Result<EventMap, ParseError> {
    let body = delimited(unfence(raw), '{', '}')
        .or_else(|| delimited(raw, '{', '}'))
        .ok_or(ParseError::NoJson("object"))?;
    let parsed: BTreeMap<String, Vec<f64>> = serde_json::from_str(body)?;

    let mut events = EventMap::new();
    for (name, times) in parsed {
        let name = normalize_event_name(&name);
        if name.is_empty() {
            continue;
        }
        let mut kept: Vec<f64> = times
            .into_iter()
            .filter(|t| t.is_finite() && *t >= 0.0 && *t < duration)
            .collect();
        if kept.is_empty() {
            continue;
        }
        let entry = events.entry(name).or_insert_with(Vec::new);
        entry.append(&mut kept);
        entry.sort_by(|a, b| a.total_cmp(b));
        entry.dedup();
    }
    Ok(events)
}

pub fn normalize_event_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    event_name_re()
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}
