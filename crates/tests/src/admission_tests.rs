//! Scenario 1 (waiting-room admit) against the real HTTP surface: a
//! participant is parked in `pendingClients` (seeded directly through the
//! running instance's core state, the same way a locked room's `joinRoom`
//! would have put them there), then an operator admits them through
//! `POST /rooms/{roomId}/pending/{userKey}/admit` and the grant is
//! reflected in the room's access lists.

use std::sync::Arc;

use sfuctl_core::model::{ParticipantMode, PendingEntry, SocketHandle};

use crate::fixtures::test_app::TestApp;

#[derive(Debug)]
struct MockSocket;

impl SocketHandle for MockSocket {
    fn send(&self, _event: &str, _payload: serde_json::Value) {}
    fn disconnect(&self, _close_immediate: bool) {}
}

fn seed_pending(app: &TestApp, client_id: &str, room_id: &str, user_key: &str) {
    let entry = app.core.registry.create_if_absent(client_id, room_id);
    let mut room = entry.guard.lock();
    room.set_policy(sfuctl_core::model::PolicyUpdate { locked: Some(true), ..Default::default() });
    room.enroll_pending(PendingEntry {
        user_key: user_key.to_string(),
        session_id: "s1".to_string(),
        display_name: "Alice".to_string(),
        socket: Arc::new(MockSocket),
        enrolled_at: chrono::Utc::now(),
        requested_mode: ParticipantMode::Meeting,
    });
}

#[tokio::test]
async fn admitting_a_pending_participant_grandfathers_locked_allow() {
    let app = TestApp::spawn().await;
    seed_pending(&app, "tenant-a", "room-1", "alice@x.y");

    let resp = app
        .operator_post("/admin/rooms/room-1/pending/alice@x.y/admit?clientId=tenant-a")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let access: serde_json::Value = app
        .operator_get("/admin/rooms/room-1/access?clientId=tenant-a")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let locked_allowed = access["lockedAllowedUserKeys"].as_array().unwrap();
    assert!(locked_allowed.iter().any(|v| v == "alice@x.y"));
}

#[tokio::test]
async fn rejecting_a_pending_participant_removes_them_from_the_waiting_room() {
    let app = TestApp::spawn().await;
    seed_pending(&app, "tenant-a", "room-2", "bob@x.y");

    let resp = app
        .operator_post("/admin/rooms/room-2/pending/bob@x.y/reject?clientId=tenant-a")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["affected"], 1);

    let channel = sfuctl_core::identity::channel_id("tenant-a", "room-2");
    let entry = app.core.registry.get(&channel).unwrap();
    assert!(!entry.guard.lock().pending_clients.contains_key("bob@x.y"));
}

#[tokio::test]
async fn admit_all_clears_the_entire_waiting_room() {
    let app = TestApp::spawn().await;
    seed_pending(&app, "tenant-a", "room-3", "carol@x.y");
    seed_pending(&app, "tenant-a", "room-3", "dave@x.y");

    let resp = app
        .operator_post("/admin/rooms/room-3/pending/admit-all?clientId=tenant-a")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["affected"], 2);

    let channel = sfuctl_core::identity::channel_id("tenant-a", "room-3");
    let entry = app.core.registry.get(&channel).unwrap();
    let room = entry.guard.lock();
    assert!(room.pending_clients.is_empty());
    assert_eq!(room.clients.len(), 2);
}
