//! Transcript chunk model and the dedup/partial-handling rules from
//! spec.md §4.9 rules (6) and (7).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptChunk {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub speaker: Option<String>,
}

/// Accumulates chunks for one room's transcript, applying the dedup rule
/// before appending and tracking the last partial text for end-of-stream
/// flushing.
#[derive(Debug, Default)]
pub struct TranscriptBuffer {
    chunks: Vec<TranscriptChunk>,
    last_partial_text: String,
}

const DEDUP_WINDOW_MS: i64 = 1500;

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule (6): suppress an incoming chunk if it is textually identical to
    /// the last appended chunk, within 1500 ms of its end, and from the same
    /// speaker.
    pub fn should_dedup(&self, candidate: &TranscriptChunk) -> bool {
        let Some(last) = self.chunks.last() else { return false };
        last.text == candidate.text
            && (candidate.end_ms - last.end_ms).abs() < DEDUP_WINDOW_MS
            && last.speaker == candidate.speaker
    }

    pub fn append(&mut self, chunk: TranscriptChunk) -> bool {
        if self.should_dedup(&chunk) {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    pub fn set_partial(&mut self, text: String) {
        self.last_partial_text = text;
    }

    /// Rule (7): on stop, if the last partial text is non-empty, append it
    /// as a final chunk with `startMs = endMs = now`.
    pub fn flush_partial(&mut self, now_ms: i64, speaker: Option<String>) {
        if !self.last_partial_text.trim().is_empty() {
            let chunk = TranscriptChunk {
                start_ms: now_ms,
                end_ms: now_ms,
                text: std::mem::take(&mut self.last_partial_text),
                speaker,
            };
            self.append(chunk);
        }
    }

    pub fn snapshot(&self) -> Vec<TranscriptChunk> {
        self.chunks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(end_ms: i64, text: &str) -> TranscriptChunk {
        TranscriptChunk { start_ms: end_ms - 500, end_ms, text: text.into(), speaker: Some("alice".into()) }
    }

    #[test]
    fn dedup_collapses_near_identical_chunks() {
        let mut buf = TranscriptBuffer::new();
        assert!(buf.append(chunk(1000, "hello there")));
        assert!(!buf.append(chunk(2000, "hello there")));
        assert_eq!(buf.snapshot().len(), 1);
    }

    #[test]
    fn distinct_text_not_deduped() {
        let mut buf = TranscriptBuffer::new();
        assert!(buf.append(chunk(1000, "hello there")));
        assert!(buf.append(chunk(1200, "goodbye now")));
        assert_eq!(buf.snapshot().len(), 2);
    }

    #[test]
    fn far_apart_duplicate_not_deduped() {
        let mut buf = TranscriptBuffer::new();
        assert!(buf.append(chunk(1000, "hello there")));
        assert!(buf.append(chunk(4000, "hello there")));
        assert_eq!(buf.snapshot().len(), 2);
    }

    #[test]
    fn partial_flush_appends_final_chunk() {
        let mut buf = TranscriptBuffer::new();
        buf.set_partial("still speaking".into());
        buf.flush_partial(5000, Some("alice".into()));
        let snap = buf.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].start_ms, 5000);
        assert_eq!(snap[0].end_ms, 5000);
    }

    #[test]
    fn empty_partial_not_flushed() {
        let mut buf = TranscriptBuffer::new();
        buf.flush_partial(5000, None);
        assert!(buf.snapshot().is_empty());
    }
}
