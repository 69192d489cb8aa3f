//! Moderation Engine invariants (P3/P4) and scenarios 2/4, exercised
//! directly against `sfuctl_core::moderation` plus a `RoomRegistry` and
//! `InMemoryMediaPlane`, the same "no HTTP layer needed" style as
//! `room_invariant_tests.rs`.

use std::sync::Arc;

use sfuctl_core::admission::{self, JoinRequest};
use sfuctl_core::events::ChannelBus;
use sfuctl_core::media_plane::{InMemoryMediaPlane, MediaKind, MediaType};
use sfuctl_core::model::{ParticipantMode, SocketHandle};
use sfuctl_core::moderation::{self, BulkCloseOptions, ProducerSelector};
use sfuctl_core::registry::RoomRegistry;

#[derive(Debug)]
struct MockSocket;

impl SocketHandle for MockSocket {
    fn send(&self, _event: &str, _payload: serde_json::Value) {}
    fn disconnect(&self, _close_immediate: bool) {}
}

fn mock_socket() -> Arc<dyn SocketHandle> {
    Arc::new(MockSocket)
}

#[derive(Debug, Default)]
struct RecordingSocket {
    received: std::sync::Mutex<Vec<String>>,
}

impl SocketHandle for RecordingSocket {
    fn send(&self, event: &str, _payload: serde_json::Value) {
        self.received.lock().unwrap().push(event.to_string());
    }
    fn disconnect(&self, _close_immediate: bool) {}
}

fn join_request(user_key: &str, session_id: &str, mode: ParticipantMode) -> JoinRequest {
    JoinRequest {
        user_key: user_key.to_string(),
        session_id: session_id.to_string(),
        display_name: "Tester".to_string(),
        requested_mode: mode,
        is_admin_by_token: false,
        socket: mock_socket(),
    }
}

/// P4: `closeProducerById` is idempotent — the second call on an
/// already-closed producer returns `Ok(None)` with no further events.
#[tokio::test]
async fn close_producer_by_id_is_idempotent() {
    let registry = RoomRegistry::new();
    let bus = ChannelBus::new();
    let (media_plane, _rx) = InMemoryMediaPlane::new();

    let channel = sfuctl_core::identity::channel_id("tenant-a", "room-1");
    let entry = registry.create_if_absent("tenant-a", "room-1");

    let outcome = {
        let mut room = entry.guard.lock();
        admission::admit(&mut room, join_request("alice@x.y", "s1", ParticipantMode::Meeting), false)
    };
    {
        let mut room = entry.guard.lock();
        room.install_producer(&outcome.user_id, "prod-1".to_string(), MediaKind::Audio, MediaType::Webcam);
    }

    let first = moderation::close_producer_by_id(&registry, &channel, &bus, &media_plane, &"prod-1".to_string())
        .await
        .unwrap();
    assert!(first.is_some());

    let second = moderation::close_producer_by_id(&registry, &channel, &bus, &media_plane, &"prod-1".to_string())
        .await
        .unwrap();
    assert!(second.is_none());
}

/// Scenario 2: blocking a present identity also kicks every active session
/// for that `userKey` when `kick_present` is set.
#[tokio::test]
async fn block_identity_kicks_present_sessions() {
    let registry = RoomRegistry::new();
    let bus = ChannelBus::new();

    let channel = sfuctl_core::identity::channel_id("tenant-a", "room-2");
    let entry = registry.create_if_absent("tenant-a", "room-2");

    {
        let mut room = entry.guard.lock();
        admission::admit(&mut room, join_request("carol@x.y", "s1", ParticipantMode::Meeting), false);
    }

    let outcome = moderation::block_identity(&registry, &channel, &bus, &"carol@x.y".to_string(), true, "blocked by operator").unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.kicked.len(), 1);

    let repeat = moderation::block_identity(&registry, &channel, &bus, &"carol@x.y".to_string(), true, "blocked by operator").unwrap();
    assert!(!repeat.changed);

    let room = entry.guard.lock();
    assert!(room.blocked_user_keys.contains("carol@x.y"));
    assert!(room.clients.is_empty());
}

/// Scenario 4: a bulk mute with `include_admins: false` leaves the host's
/// and any admin's producers untouched while closing everyone else's.
#[tokio::test]
async fn bulk_close_excludes_admins_by_default() {
    let registry = RoomRegistry::new();
    let bus = ChannelBus::new();
    let (media_plane, _rx) = InMemoryMediaPlane::new();

    let channel = sfuctl_core::identity::channel_id("tenant-a", "room-3");
    let entry = registry.create_if_absent("tenant-a", "room-3");

    let (host_id, attendee_id) = {
        let mut room = entry.guard.lock();
        let host = admission::admit(&mut room, join_request("host@x.y", "s1", ParticipantMode::Meeting), true);
        let attendee = admission::admit(&mut room, join_request("dana@x.y", "s2", ParticipantMode::Meeting), false);
        room.install_producer(&host.user_id, "prod-host".to_string(), MediaKind::Audio, MediaType::Webcam);
        room.install_producer(&attendee.user_id, "prod-dana".to_string(), MediaKind::Audio, MediaType::Webcam);
        (host.user_id, attendee.user_id)
    };

    let selector = ProducerSelector { kinds: Some(vec![MediaKind::Audio]), types: None };
    let opts = BulkCloseOptions::default();
    let closed = moderation::bulk_close(&registry, &channel, &bus, &media_plane, &selector, &opts, "muted by operator")
        .await
        .unwrap();

    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].user_id, attendee_id);

    let room = entry.guard.lock();
    assert!(room.clients.get(&host_id).unwrap().producers.values().any(|p| p.producer_id == "prod-host"));
}

/// §4.5: `producerClosed` reaches every peer except the producer's owner
/// and any webinar attendee — watch-only participants never see another
/// peer's media lifecycle events.
#[tokio::test]
async fn producer_closed_excludes_webinar_attendees() {
    let registry = RoomRegistry::new();
    let bus = ChannelBus::new();
    let (media_plane, _rx) = InMemoryMediaPlane::new();

    let channel = sfuctl_core::identity::channel_id("tenant-a", "room-5");
    let entry = registry.create_if_absent("tenant-a", "room-5");

    let peer_socket = Arc::new(RecordingSocket::default());
    let attendee_socket = Arc::new(RecordingSocket::default());

    {
        let mut room = entry.guard.lock();
        let speaker = admission::admit(&mut room, join_request("speaker@x.y", "s1", ParticipantMode::Meeting), true);

        let mut peer_req = join_request("peer@x.y", "s2", ParticipantMode::Meeting);
        peer_req.socket = peer_socket.clone();
        let peer = admission::admit(&mut room, peer_req, false);

        let mut attendee_req = join_request("viewer@x.y", "s3", ParticipantMode::WebinarAttendee);
        attendee_req.socket = attendee_socket.clone();
        let attendee = admission::admit(&mut room, attendee_req, false);

        room.install_producer(&speaker.user_id, "prod-speaker".to_string(), MediaKind::Audio, MediaType::Webcam);
        bus.join(&channel, speaker.user_id.clone(), mock_socket());
        bus.join(&channel, peer.user_id.clone(), peer_socket.clone());
        bus.join(&channel, attendee.user_id.clone(), attendee_socket.clone());
    }

    moderation::close_producer_by_id(&registry, &channel, &bus, &media_plane, &"prod-speaker".to_string())
        .await
        .unwrap();

    assert!(peer_socket.received.lock().unwrap().contains(&"producerClosed".to_string()));
    assert!(!attendee_socket.received.lock().unwrap().contains(&"producerClosed".to_string()));
}

/// P3: blocking then unblocking an identity restores admission eligibility
/// (the block-list state only — any kicked session stays kicked).
#[tokio::test]
async fn unblock_restores_admission_eligibility() {
    let registry = RoomRegistry::new();
    let bus = ChannelBus::new();

    let channel = sfuctl_core::identity::channel_id("tenant-a", "room-4");
    let entry = registry.create_if_absent("tenant-a", "room-4");

    moderation::block_identity(&registry, &channel, &bus, &"erin@x.y".to_string(), false, "blocked").unwrap();
    assert!(entry.guard.lock().blocked_user_keys.contains("erin@x.y"));

    entry.guard.lock().unblock_user("erin@x.y");

    let decision = admission::decide(&entry.guard.lock(), &join_request("erin@x.y", "s1", ParticipantMode::Meeting));
    assert!(matches!(decision, admission::Decision::Admit));
}
