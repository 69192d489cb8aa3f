//! Single-flight summarize-then-PDF generator, keyed by `channelId`.
//! Concurrent requests for the same channel join the same in-flight
//! future and observe byte-identical output (P5); a failed generation
//! falls back to the prior cached PDF when one exists.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use sfuctl_core::identity::ChannelId;
use sfuctl_transcription::TranscriptChunk;
use thiserror::Error;

use crate::pdf::render_minutes_pdf;
use crate::summarizer::Summarizer;

#[derive(Debug, Error, Clone)]
pub enum MinutesError {
    #[error("no transcript available for this room")]
    NoTranscript,
    #[error("summarization failed: {0}")]
    SummarizeFailed(String),
    #[error("pdf rendering failed: {0}")]
    RenderFailed(String),
}

#[derive(Debug, Clone)]
pub struct MinutesResult {
    pub pdf_bytes: Arc<Vec<u8>>,
    pub transcript: Arc<Vec<TranscriptChunk>>,
}

type InFlight = Shared<BoxFuture<'static, Result<Arc<MinutesResult>, MinutesError>>>;

/// What the caller knows about a room at the time minutes are requested:
/// whether it is still active (live snapshot available) or ended (only a
/// cached/stopped transcript remains).
pub enum TranscriptSource {
    Live(Vec<TranscriptChunk>),
    Stopped(Vec<TranscriptChunk>),
}

pub struct MinutesGenerator {
    in_flight: DashMap<ChannelId, InFlight>,
    pdf_cache: DashMap<ChannelId, Arc<MinutesResult>>,
    summarizer: Arc<dyn Summarizer>,
    local_fallback: Arc<dyn Summarizer>,
}

impl MinutesGenerator {
    pub fn new(summarizer: Arc<dyn Summarizer>, local_fallback: Arc<dyn Summarizer>) -> Self {
        Self {
            in_flight: DashMap::new(),
            pdf_cache: DashMap::new(),
            summarizer,
            local_fallback,
        }
    }

    pub fn cached(&self, channel: &ChannelId) -> Option<Arc<MinutesResult>> {
        self.pdf_cache.get(channel).map(|e| e.clone())
    }

    /// Produces (or joins an in-flight production of) the minutes for
    /// `channel`. `room_active` controls caching: results for an active
    /// room are never cached, only results produced once the room is
    /// inactive are persisted for later fast-path retrieval.
    pub async fn get_or_generate(
        &self,
        channel: &ChannelId,
        room_id: String,
        room_active: bool,
        transcript: TranscriptSource,
    ) -> Result<Arc<MinutesResult>, MinutesError> {
        if !room_active {
            if let Some(cached) = self.cached(channel) {
                return Ok(cached);
            }
        }

        if let Some(existing) = self.in_flight.get(channel) {
            return existing.clone().await;
        }

        let fut = self.spawn_generation(channel.clone(), room_id, room_active, transcript);
        let shared: InFlight = fut.boxed().shared();
        self.in_flight.insert(channel.clone(), shared.clone());

        let result = shared.await;

        self.in_flight.remove(channel);

        if let Ok(ref ok) = result {
            if !room_active {
                self.pdf_cache.insert(channel.clone(), ok.clone());
            }
        } else if let Some(cached) = self.cached(channel) {
            return Ok(cached);
        }

        result
    }

    fn spawn_generation(
        &self,
        channel: ChannelId,
        room_id: String,
        _room_active: bool,
        transcript_source: TranscriptSource,
    ) -> BoxFuture<'static, Result<Arc<MinutesResult>, MinutesError>> {
        let summarizer = self.summarizer.clone();
        let local_fallback = self.local_fallback.clone();

        async move {
            let transcript = match transcript_source {
                TranscriptSource::Live(t) | TranscriptSource::Stopped(t) => t,
            };
            if transcript.is_empty() {
                return Err(MinutesError::NoTranscript);
            }

            let transcript_text = transcript.iter().map(|c| c.text.clone()).collect::<Vec<_>>().join(" ");

            let summary = match summarizer.summarize(&transcript_text).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(%channel, error = %e, "remote summarizer failed, falling back to local summarizer");
                    local_fallback
                        .summarize(&transcript_text)
                        .await
                        .map_err(|e| MinutesError::SummarizeFailed(e.to_string()))?
                }
            };

            let pdf_bytes = render_minutes_pdf(&room_id, &summary, &transcript)
                .map_err(|e| MinutesError::RenderFailed(e.to_string()))?;

            Ok(Arc::new(MinutesResult {
                pdf_bytes: Arc::new(pdf_bytes),
                transcript: Arc::new(transcript),
            }))
        }
        .boxed()
    }
}
