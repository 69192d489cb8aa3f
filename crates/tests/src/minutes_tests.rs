//! Minutes Generator single-flight behavior (P5) and scenario 6 (concurrent
//! POSTs for the same room's minutes), exercised directly against
//! `sfuctl_minutes::MinutesGenerator` with a counting test double standing
//! in for the remote summarizer.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sfuctl_core::identity::channel_id;
use sfuctl_minutes::{LocalSummarizer, MinutesGenerator, Summarizer, TranscriptSource};
use sfuctl_transcription::TranscriptChunk;

struct CountingSummarizer {
    calls: AtomicUsize,
}

#[async_trait]
impl Summarizer for CountingSummarizer {
    async fn summarize(&self, transcript_text: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(format!("summary of: {transcript_text}"))
    }
}

fn chunk(text: &str) -> TranscriptChunk {
    TranscriptChunk { start_ms: 0, end_ms: 1000, text: text.to_string(), speaker: Some("alice@x.y".to_string()) }
}

/// Concurrent `get_or_generate` calls for the same ended room's minutes
/// all observe byte-identical PDF output.
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_requests_return_identical_minutes() {
    let summarizer = Arc::new(CountingSummarizer { calls: AtomicUsize::new(0) });
    let generator = Arc::new(MinutesGenerator::new(summarizer, Arc::new(LocalSummarizer)));
    let channel = channel_id("tenant-a", "room-minutes-1");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let generator = generator.clone();
        let channel = channel.clone();
        handles.push(tokio::spawn(async move {
            generator
                .get_or_generate(&channel, "room-minutes-1".to_string(), false, TranscriptSource::Stopped(vec![chunk("hello there team")]))
                .await
                .unwrap()
        }));
    }

    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap());
    }

    let first = &results[0].pdf_bytes;
    for r in &results[1..] {
        assert_eq!(r.pdf_bytes, *first);
    }
}

/// Once a room's minutes are generated and cached, a later request is
/// served from the cache instead of re-invoking the summarizer.
#[tokio::test]
async fn ended_room_minutes_are_cached_after_first_generation() {
    let summarizer = Arc::new(CountingSummarizer { calls: AtomicUsize::new(0) });
    let generator = MinutesGenerator::new(summarizer.clone(), Arc::new(LocalSummarizer));
    let channel = channel_id("tenant-a", "room-minutes-2");

    assert!(generator.cached(&channel).is_none());

    let first = generator
        .get_or_generate(&channel, "room-minutes-2".to_string(), false, TranscriptSource::Stopped(vec![chunk("the meeting covered the roadmap")]))
        .await
        .unwrap();

    let calls_after_first = summarizer.calls.load(Ordering::SeqCst);
    assert_eq!(calls_after_first, 1);

    let cached = generator.cached(&channel).expect("minutes should be cached once the room is no longer active");
    assert_eq!(cached.pdf_bytes, first.pdf_bytes);
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), calls_after_first, "cache hit must not re-invoke the summarizer");
}

/// An empty transcript cannot be summarized (no minutes for a room where no
/// one ever spoke).
#[tokio::test]
async fn empty_transcript_is_rejected() {
    let generator = MinutesGenerator::new(Arc::new(LocalSummarizer), Arc::new(LocalSummarizer));
    let channel = channel_id("tenant-a", "room-minutes-3");

    let err = generator
        .get_or_generate(&channel, "room-minutes-3".to_string(), false, TranscriptSource::Stopped(vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, sfuctl_minutes::MinutesError::NoTranscript));
}

/// A still-active room's minutes are generated fresh but never cached.
#[tokio::test]
async fn active_room_minutes_are_not_cached() {
    let generator = MinutesGenerator::new(Arc::new(LocalSummarizer), Arc::new(LocalSummarizer));
    let channel = channel_id("tenant-a", "room-minutes-4");

    generator
        .get_or_generate(&channel, "room-minutes-4".to_string(), true, TranscriptSource::Live(vec![chunk("status update for the live room")]))
        .await
        .unwrap();

    assert!(generator.cached(&channel).is_none());
}
