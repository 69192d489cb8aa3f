//! Full WebSocket round trips through the real `ws/handler.rs` dispatch
//! loop: `joinRoom` → `ack`, chat broadcast to a second participant, and an
//! `admin:*` action landing as an event on someone else's socket. Grounded
//! on the reference repo's WebSocket integration tests, which open a real
//! `tokio_tungstenite` client against a spawned server rather than calling
//! handlers directly.

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::fixtures::test_app::TestApp;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(app: &TestApp) -> WsStream {
    let (stream, _) = connect_async(app.ws_url()).await.expect("ws connect");
    stream
}

async fn send_event(ws: &mut WsStream, event: &str, payload: Value) {
    let frame = json!({ "event": event, "payload": payload });
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn recv_json(ws: &mut WsStream) -> Value {
    loop {
        match ws.next().await.expect("stream ended").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn join(ws: &mut WsStream, client_id: &str, room_id: &str, email: &str, display_name: &str) -> Value {
    let token = TestApp::token_for(email);
    send_event(
        ws,
        "joinRoom",
        json!({
            "clientId": client_id,
            "roomId": room_id,
            "token": token,
            "sessionId": format!("{email}-session"),
            "displayName": display_name,
        }),
    )
    .await;
    recv_json(ws).await
}

#[tokio::test]
async fn first_joiner_is_admitted_as_host() {
    let app = TestApp::spawn().await;
    let mut ws = connect(&app).await;

    let ack = join(&mut ws, "tenant-a", "standup", "alice@x.y", "Alice").await;
    assert_eq!(ack["ok"], true);
    assert_eq!(ack["result"]["status"], "joined");
    assert!(ack["result"]["rtpCapabilities"].is_object());
}

#[tokio::test]
async fn chat_broadcast_reaches_the_other_participant() {
    let app = TestApp::spawn().await;
    let mut alice = connect(&app).await;
    let mut bob = connect(&app).await;

    join(&mut alice, "tenant-a", "chat-room", "alice@x.y", "Alice").await;
    join(&mut bob, "tenant-a", "chat-room", "bob@x.y", "Bob").await;

    send_event(&mut alice, "chat:send", json!({"body": "hello room"})).await;

    let ack = recv_json(&mut alice).await;
    assert_eq!(ack["ok"], true);

    let event = recv_json(&mut bob).await;
    assert_eq!(event["event"], "chatMessage");
    assert_eq!(event["payload"]["body"], "hello room");
}

#[tokio::test]
async fn admin_kick_disconnects_the_target() {
    let app = TestApp::spawn().await;
    let mut host = connect(&app).await;
    let mut guest = connect(&app).await;

    join(&mut host, "tenant-a", "kick-room", "host@x.y", "Host").await;
    let guest_ack = join(&mut guest, "tenant-a", "kick-room", "guest@x.y", "Guest").await;
    assert_eq!(guest_ack["result"]["status"], "joined");

    let channel = sfuctl_core::identity::channel_id("tenant-a", "kick-room");
    let entry = app.core.registry.get(&channel).unwrap();
    let guest_user_id = {
        let room = entry.guard.lock();
        room.clients.values().find(|p| p.user_key == "guest@x.y").unwrap().user_id.clone()
    };

    send_event(&mut host, "admin:kick", json!({"userId": guest_user_id, "reason": "testing"})).await;
    let host_ack = recv_json(&mut host).await;
    assert_eq!(host_ack["ok"], true);

    let kicked_event = recv_json(&mut guest).await;
    assert_eq!(kicked_event["event"], "kicked");

    let closed = guest.next().await;
    assert!(closed.is_none() || matches!(closed, Some(Ok(Message::Close(_)))));
}

#[tokio::test]
async fn a_locked_room_waitlists_a_non_admin_joiner() {
    let app = TestApp::spawn().await;
    let mut host = connect(&app).await;

    join(&mut host, "tenant-a", "locked-room", "host@x.y", "Host").await;

    let channel = sfuctl_core::identity::channel_id("tenant-a", "locked-room");
    let entry = app.core.registry.get(&channel).unwrap();
    entry.guard.lock().set_policy(sfuctl_core::model::PolicyUpdate { locked: Some(true), ..Default::default() });

    let mut guest = connect(&app).await;
    let ack = join(&mut guest, "tenant-a", "locked-room", "guest@x.y", "Guest").await;
    assert_eq!(ack["ok"], true);
    assert_eq!(ack["result"]["status"], "waiting");
}
