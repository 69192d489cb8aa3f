//! `TranscriptionEngine`: the shared, `Arc`-held map of active per-room
//! pipelines. Grounded on the reference repo's `engine.rs`
//! (`DashMap<String, WorkerHandle>` keyed by conference/producer) — keyed
//! here by `channelId` since spec.md permits only one pipeline per room.

use std::sync::Arc;

use dashmap::DashMap;
use sfuctl_core::identity::ChannelId;
use sfuctl_core::media_plane::{MediaPlane, ProducerId};

use crate::chunk::TranscriptChunk;
use crate::config::TranscriptionSettings;
use crate::worker::Transcriber;

#[derive(Default)]
pub struct TranscriptionEngine {
    active: DashMap<ChannelId, Arc<Transcriber>>,
    media_plane: Option<Arc<dyn MediaPlane>>,
    settings: Option<TranscriptionSettings>,
}

impl TranscriptionEngine {
    pub fn new(media_plane: Arc<dyn MediaPlane>, settings: TranscriptionSettings) -> Self {
        Self { active: DashMap::new(), media_plane: Some(media_plane), settings: Some(settings) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.as_ref().map(|s| s.enabled()).unwrap_or(false)
    }

    /// Starts a pipeline for the room's first audio producer. Idempotent:
    /// a re-entry while a pipeline is already active for this channel is a
    /// no-op, and only one pipeline is ever permitted per room — a second
    /// audio producer does not attach.
    pub async fn start(&self, channel: &ChannelId, producer_id: ProducerId) -> anyhow::Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        if self.active.contains_key(channel) {
            return Ok(());
        }
        let media_plane = self.media_plane.clone().expect("enabled implies media_plane set");
        let settings = self.settings.clone().expect("enabled implies settings set");

        let worker = Transcriber::start(channel.clone(), producer_id, media_plane, settings).await?;
        self.active.insert(channel.clone(), worker);
        Ok(())
    }

    pub async fn stop(&self, channel: &ChannelId) {
        if let Some((_, worker)) = self.active.remove(channel) {
            worker.stop().await;
        }
    }

    pub fn is_active(&self, channel: &ChannelId) -> bool {
        self.active.contains_key(channel)
    }

    /// Live transcript snapshot, used both by the administrator surface and
    /// by the Minutes Generator when the room is still active.
    pub fn snapshot(&self, channel: &ChannelId) -> Option<Vec<TranscriptChunk>> {
        self.active.get(channel).map(|w| w.snapshot())
    }
}
