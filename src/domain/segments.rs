use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Closed mood vocabulary for background segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Mood {
    Suspense,
    Action,
    Climax,
    Sad,
    Neutral,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Suspense,
        Mood::Action,
        Mood::Climax,
        Mood::Sad,
        Mood::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Suspense => "suspense",
            Mood::Action => "action",
            Mood::Climax => "climax",
            Mood::Sad => "sad",
            Mood::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown mood {:?}", s))
    }
}

impl TryFrom<String> for Mood {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// `[start, end)` on the narration timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub mood: Mood,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Event type name → occurrence timestamps (seconds). Ordered for stable graphs.
pub type EventMap = BTreeMap<String, Vec<f64>>;

/// Number of source clips needed to cover `duration`.
pub fn required_segment_count(duration: f64, clip_seconds: f64) -> usize {
    ((duration / clip_seconds).ceil() as usize).max(1)
}

/// Split `duration` into equal neutral segments, one per source clip length.
///
/// Total for every positive, finite duration.
pub fn fallback_segments(duration: f64, clip_seconds: f64) -> Result<Vec<Segment>> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(Error::validation(format!(
            "narration duration must be positive, got {}",
            duration
        )));
    }
    if !clip_seconds.is_finite() || clip_seconds <= 0.0 {
        return Err(Error::validation(format!(
            "source clip length must be positive, got {}",
            clip_seconds
        )));
    }

    let n = required_segment_count(duration, clip_seconds);
    let step = duration / n as f64;
    let segments = (0..n)
        .map(|i| {
            let start = i as f64 * step;
            let end = if i + 1 == n {
                duration
            } else {
                (start + step).min(duration)
            };
            Segment {
                start,
                end,
                mood: Mood::Neutral,
            }
        })
        .collect();
    Ok(segments)
}

/// Leading `max_chars` characters of `text`, marked when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_covers_duration_exactly() {
        let segments = fallback_segments(46.0, 22.0).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments.last().unwrap().end, 46.0);
        for pair in segments.windows(2) {
            assert!((pair[0].end - pair[1].start).abs() < 1e-9);
        }
        assert!(segments.iter().all(|s| s.mood == Mood::Neutral));
    }

    #[test]
    fn test_fallback_invariants_across_durations() {
        for d in [0.01, 1.0, 21.99, 22.0, 22.01, 45.5, 300.0, 3601.7] {
            let segments = fallback_segments(d, 22.0).unwrap();
            assert_eq!(segments.len(), required_segment_count(d, 22.0));
            assert!(!segments.is_empty());
            assert!(segments.iter().all(|s| s.end > s.start), "d={}", d);
            assert!(segments.windows(2).all(|w| w[0].start <= w[1].start));
            assert_eq!(segments.last().unwrap().end, d);
        }
    }

    #[test]
    fn test_fallback_rejects_non_positive_duration() {
        assert!(fallback_segments(0.0, 22.0).is_err());
        assert!(fallback_segments(-3.0, 22.0).is_err());
        assert!(fallback_segments(f64::NAN, 22.0).is_err());
    }

    #[test]
    fn test_mood_parses_case_insensitively() {
        assert_eq!("Suspense".parse::<Mood>().unwrap(), Mood::Suspense);
        assert_eq!(" sad ".parse::<Mood>().unwrap(), Mood::Sad);
        assert!("joyful".parse::<Mood>().is_err());
        let seg: Segment =
            serde_json::from_str(r#"{"start":0,"end":5.5,"mood":"CLIMAX"}"#).unwrap();
        assert_eq!(seg.mood, Mood::Climax);
        assert_eq!(serde_json::to_string(&Mood::Climax).unwrap(), "\"climax\"");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("short", 200), "short");
        assert_eq!(excerpt("héllo wörld", 5), "héllo...");
        assert_eq!(excerpt("ab  cd", 3), "ab...");
    }
}
