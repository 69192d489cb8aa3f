//! Operator HTTP surface smoke tests: the unauthenticated `/health` probe,
//! the `x-sfu-secret` gate on every other route, and scenario 3 (a bare
//! `roomId` that exists under more than one tenant resolves as ambiguous).

use sfuctl_core::admission::{self, JoinRequest};
use sfuctl_core::model::{ParticipantMode, SocketHandle};
use std::sync::Arc;

use crate::fixtures::test_app::TestApp;

#[derive(Debug)]
struct MockSocket;

impl SocketHandle for MockSocket {
    fn send(&self, _event: &str, _payload: serde_json::Value) {}
    fn disconnect(&self, _close_immediate: bool) {}
}

#[tokio::test]
async fn health_does_not_require_a_secret() {
    let app = TestApp::spawn().await;
    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn status_requires_the_shared_secret() {
    let app = TestApp::spawn().await;

    let unauthenticated = app.client.get(app.url("/status")).send().await.unwrap();
    assert_eq!(unauthenticated.status(), 401);

    let authenticated = app.operator_get("/status").send().await.unwrap();
    assert_eq!(authenticated.status(), 200);
}

#[tokio::test]
async fn a_wrong_secret_is_also_rejected() {
    let app = TestApp::spawn().await;
    let resp = app.client.get(app.url("/status")).header("x-sfu-secret", "not-the-secret").send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

/// Scenario 3: the same bare `roomId` under two different tenants cannot be
/// addressed without a `clientId`, and the 409 response names both
/// candidate channels.
#[tokio::test]
async fn ambiguous_room_id_is_rejected_without_a_tenant_scope() {
    let app = TestApp::spawn().await;

    for client_id in ["tenant-a", "tenant-b"] {
        let entry = app.core.registry.create_if_absent(client_id, "standup");
        let mut room = entry.guard.lock();
        admission::admit(
            &mut room,
            JoinRequest {
                user_key: format!("{client_id}-user@x.y"),
                session_id: "s1".to_string(),
                display_name: "Tester".to_string(),
                requested_mode: ParticipantMode::Meeting,
                is_admin_by_token: true,
                socket: Arc::new(MockSocket),
            },
            true,
        );
    }

    let resp = app.operator_get("/admin/rooms/standup/access").send().await.unwrap();
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    let candidates = body["candidates"].as_array().expect("ambiguous response carries candidates");
    assert_eq!(candidates.len(), 2);

    let scoped = app.operator_get("/admin/rooms/standup/access?clientId=tenant-a").send().await.unwrap();
    assert_eq!(scoped.status(), 200);
}

#[tokio::test]
async fn status_reports_room_count() {
    let app = TestApp::spawn().await;
    app.core.registry.create_if_absent("tenant-a", "room-x");

    let resp = app.operator_get("/status").send().await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["roomCount"], 1);
    assert_eq!(body["transcriptionEnabled"], false);
}
