//! Drain Coordinator: the only component permitted to issue
//! mass-disconnection calls. Transitions the process-global `draining`
//! flag; when forcing, broadcasts a restart notice, optionally sleeps, then
//! disconnects every socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;

use crate::events::{ChannelBus, Event};
use crate::registry::RoomRegistry;

const MAX_NOTICE_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainRequest {
    pub draining: bool,
    pub force: bool,
    pub notice: Option<String>,
    pub notice_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainResponse {
    pub draining: bool,
    pub forced: bool,
}

/// Process-global drain state. The flag is an `AtomicBool` for cheap reads
/// from every request path; the sequencing mutex serializes the
/// broadcast/delay/disconnect phases of a forced drain so two concurrent
/// force-drains don't interleave their disconnect sweeps.
pub struct DrainCoordinator {
    draining: AtomicBool,
    sequencing: Mutex<()>,
}

impl Default for DrainCoordinator {
    fn default() -> Self {
        Self { draining: AtomicBool::new(false), sequencing: Mutex::new(()) }
    }
}

impl DrainCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Applies a drain request. When `force && draining`, broadcasts
    /// `serverRestarting{reconnecting:true}` to every room and every pending
    /// socket, optionally sleeps (clamped to 30,000 ms), then disconnects
    /// every room's sockets followed by every pending socket. No room guard
    /// is held across the delay — this only touches the `ChannelBus`.
    pub async fn apply(&self, registry: &RoomRegistry, bus: &ChannelBus, req: DrainRequest) -> DrainResponse {
        self.draining.store(req.draining, Ordering::SeqCst);

        let forced = req.force && req.draining;
        if forced {
            // Serializes the broadcast/delay/disconnect sequence without
            // holding any per-room guard across the delay.
            let _seq = self.sequencing.lock().await;

            let channels = registry.all_channel_ids();
            for ch in &channels {
                let notice = Event::ServerRestarting { reconnecting: true, notice: req.notice.clone() };
                bus.send_to_channel(ch, &notice);
                bus.send_to_pending_channel(ch, &notice);
            }

            let delay_ms = req.notice_delay_ms.unwrap_or(0).min(MAX_NOTICE_DELAY_MS);
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            for ch in &channels {
                bus.disconnect_channel(ch);
                bus.disconnect_pending_channel(ch);
            }
        }

        DrainResponse { draining: req.draining, forced }
    }
}
