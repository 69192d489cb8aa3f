//! Parses the external ASR server's JSON frames into `TranscriptChunk`s.
//! Timestamps prefer word-level timings when present, then message-level
//! `start`/`end`, then arrival time (spec.md §4.9 rule 5).

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::chunk::TranscriptChunk;

#[derive(Debug, Clone, Deserialize)]
pub struct WordTiming {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsrFrame {
    #[serde(default)]
    pub partial: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub result: Vec<WordTiming>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub speaker: Option<String>,
}

pub enum ParsedFrame {
    Partial(String),
    Final(TranscriptChunk),
    Ignored,
}

/// `session_start` anchors word/message-level relative seconds onto an
/// absolute wall-clock-derived millisecond timeline.
pub fn parse_frame(raw: &str, session_start: DateTime<Utc>) -> ParsedFrame {
    let Ok(frame) = serde_json::from_str::<AsrFrame>(raw) else {
        return ParsedFrame::Ignored;
    };

    if let Some(partial) = frame.partial {
        return ParsedFrame::Partial(partial);
    }

    let Some(text) = frame.text else {
        return ParsedFrame::Ignored;
    };
    if text.trim().is_empty() {
        return ParsedFrame::Ignored;
    }

    let now_ms = Utc::now().signed_duration_since(session_start).num_milliseconds();

    let (start_ms, end_ms) = if let (Some(first), Some(last)) = (frame.result.first(), frame.result.last()) {
        match (first.start, last.end) {
            (Some(s), Some(e)) => (seconds_to_ms(session_start, s), seconds_to_ms(session_start, e)),
            _ => message_level_or_arrival(&frame, session_start, now_ms),
        }
    } else {
        message_level_or_arrival(&frame, session_start, now_ms)
    };

    ParsedFrame::Final(TranscriptChunk { start_ms, end_ms, text, speaker: frame.speaker })
}

fn message_level_or_arrival(frame: &AsrFrame, session_start: DateTime<Utc>, now_ms: i64) -> (i64, i64) {
    match (frame.start, frame.end) {
        (Some(s), Some(e)) => (seconds_to_ms(session_start, s), seconds_to_ms(session_start, e)),
        _ => (now_ms, now_ms),
    }
}

fn seconds_to_ms(session_start: DateTime<Utc>, seconds: f64) -> i64 {
    let _ = session_start;
    (seconds * 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_frame_detected() {
        let now = Utc::now();
        match parse_frame(r#"{"partial":"hel"}"#, now) {
            ParsedFrame::Partial(p) => assert_eq!(p, "hel"),
            _ => panic!("expected partial"),
        }
    }

    #[test]
    fn word_level_timing_preferred() {
        let now = Utc::now();
        let raw = r#"{"text":"hello world","result":[{"start":1.0,"end":1.3},{"start":1.3,"end":1.8}]}"#;
        match parse_frame(raw, now) {
            ParsedFrame::Final(chunk) => {
                assert_eq!(chunk.start_ms, 1000);
                assert_eq!(chunk.end_ms, 1800);
            }
            _ => panic!("expected final chunk"),
        }
    }

    #[test]
    fn empty_text_ignored() {
        let now = Utc::now();
        assert!(matches!(parse_frame(r#"{"text":""}"#, now), ParsedFrame::Ignored));
    }
}
