//! WebSocket upgrade and event dispatch: `joinRoom`, chat, hand raise/lower,
//! the `admin:*` moderation family, media signaling through the
//! `MediaPlane` trait, and leave/disconnect cleanup. Grounded on the
//! reference repo's `ws/handler.rs` socket.io-style `(type, data)` dispatch
//! loop, adapted to a single `{event, payload}` JSON envelope per frame over
//! a raw Axum `WebSocket` instead of socket.io framing.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};

use sfuctl_core::admission::{self, Decision, JoinRequest};
use sfuctl_core::chat::{self, ChatIntent};
use sfuctl_core::events::Event;
use sfuctl_core::identity::{self, ChannelId, UserId, UserKey};
use sfuctl_core::media_plane::{DtlsParameters, MediaKind, MediaType, RtpCapabilities, RtpParameters};
use sfuctl_core::model::{ParticipantMode, ProducerKey, Role, SocketRef};
use sfuctl_core::moderation::{self, BulkCloseOptions, ProducerSelector};
use sfuctl_minutes::TranscriptSource;

use crate::state::AppState;
use crate::ws::socket::{WsSocketHandle, run_writer};

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection membership the dispatch loop mutates as `joinRoom`,
/// `leave`, and disconnect are processed. `channel.is_none()` means "not yet
/// joined any room" — every other event is rejected until `joinRoom`
/// succeeds.
#[derive(Default)]
struct Conn {
    channel: Option<ChannelId>,
    user_id: Option<UserId>,
    user_key: Option<UserKey>,
    pending: bool,
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(default, rename = "requestId")]
    request_id: Option<String>,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, mut stream) = socket.split();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (disconnect_tx, mut disconnect_rx) = oneshot::channel();
    let writer = tokio::spawn(run_writer(sink, out_rx));

    let handle: SocketRef = Arc::new(WsSocketHandle::new(out_tx, disconnect_tx));
    let mut conn = Conn::default();

    loop {
        tokio::select! {
            biased;
            _ = &mut disconnect_rx => break,
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => dispatch_text(&state, &mut conn, &handle, &text).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    cleanup(&state, &conn, &handle).await;
    drop(handle);
    writer.abort();
}

async fn dispatch_text(state: &AppState, conn: &mut Conn, socket: &SocketRef, text: &str) {
    let Ok(envelope) = serde_json::from_str::<Envelope>(text) else {
        socket.send("ack", json!({"ok": false, "error": "malformed envelope"}));
        return;
    };

    let result = dispatch_event(state, conn, socket, &envelope.event, envelope.payload).await;
    match result {
        Ok(value) => socket.send("ack", json!({"requestId": envelope.request_id, "ok": true, "result": value})),
        Err(err) => socket.send("ack", json!({"requestId": envelope.request_id, "ok": false, "error": err})),
    }
}

async fn dispatch_event(state: &AppState, conn: &mut Conn, socket: &SocketRef, event: &str, payload: Value) -> Result<Value, String> {
    match event {
        "joinRoom" => handle_join(state, conn, socket, payload).await,
        "leave" => handle_leave(state, conn, socket).await,
        "displayName:update" => handle_display_name_update(state, conn, payload),
        "hand:raise" => handle_hand(state, conn, true),
        "hand:lower" => handle_hand(state, conn, false),
        "chat:send" => handle_chat_send(state, conn, payload),
        "media:createTransport" => handle_create_transport(state, conn).await,
        "media:connectTransport" => handle_connect_transport(state, conn, payload).await,
        "media:produce" => handle_produce(state, conn, payload).await,
        "media:consume" => handle_consume(state, conn, payload).await,
        "media:closeProducer" => handle_close_own_producer(state, conn, payload).await,
        "admin:setPolicy" => handle_admin_set_policy(state, conn, payload).await,
        "admin:notice" => handle_admin_notice(state, conn, payload),
        "admin:end" => handle_admin_end(state, conn, payload).await,
        "admin:kick" => handle_admin_kick(state, conn, payload),
        "admin:closeProducer" => handle_admin_close_producer(state, conn, payload).await,
        "admin:closeClientProducers" => handle_admin_close_client_producers(state, conn, payload).await,
        "admin:bulkClose" => handle_admin_bulk_close(state, conn, payload).await,
        "admin:blockUser" => handle_admin_block_user(state, conn, payload),
        "admin:unblockUser" => handle_admin_unblock_user(state, conn, payload),
        "admin:allowUser" => handle_admin_allow_user(state, conn, payload).await,
        "admin:revokeAllowedUser" => handle_admin_revoke_allowed_user(state, conn, payload),
        "admin:allowLockedUser" => handle_admin_allow_locked_user(state, conn, payload),
        "admin:revokeLockedAllowedUser" => handle_admin_revoke_locked_allowed_user(state, conn, payload),
        "admin:promote" => handle_admin_promote(state, conn, payload),
        "admin:demote" => handle_admin_demote(state, conn, payload),
        "admin:transferHost" => handle_admin_transfer_host(state, conn, payload),
        "admin:clearHands" => handle_admin_clear_hands(state, conn),
        "admin:pendingAdmit" => handle_admin_pending_admit(state, conn, payload).await,
        "admin:pendingReject" => handle_admin_pending_reject(state, conn, payload),
        "admin:pendingAdmitAll" => handle_admin_pending_admit_all(state, conn).await,
        "admin:pendingRejectAll" => handle_admin_pending_reject_all(state, conn),
        other => Err(format!("unknown event: {other}")),
    }
}

fn room_entry(state: &AppState, conn: &Conn) -> Result<(ChannelId, Arc<sfuctl_core::registry::RoomEntry>), String> {
    let channel = conn.channel.clone().ok_or_else(|| "not joined".to_string())?;
    if conn.pending {
        return Err("still waiting for admission".to_string());
    }
    let entry = state.core.registry.get(&channel).ok_or_else(|| "room no longer exists".to_string())?;
    Ok((channel, entry))
}

fn current_user_id(conn: &Conn) -> Result<UserId, String> {
    conn.user_id.clone().ok_or_else(|| "not joined".to_string())
}

fn require_admin(entry: &sfuctl_core::registry::RoomEntry, user_key: &str) -> Result<(), String> {
    let role = entry.guard.lock().role_of(user_key);
    if matches!(role, Role::Host | Role::Admin) {
        Ok(())
    } else {
        Err("admin privileges required".to_string())
    }
}

// --- joinRoom / leave -----------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRoomPayload {
    client_id: String,
    room_id: String,
    token: String,
    session_id: String,
    display_name: String,
    #[serde(default)]
    requested_mode: Option<ParticipantMode>,
}

async fn handle_join(state: &AppState, conn: &mut Conn, socket: &SocketRef, payload: Value) -> Result<Value, String> {
    if conn.channel.is_some() {
        return Err("already joined".to_string());
    }
    let req: JoinRoomPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;

    let user_key = identity::derive_key(&req.token, state.settings.app.secret.as_bytes()).map_err(|e| e.to_string())?;
    let display_name = identity::normalize_display_name(&req.display_name).map_err(|e| e.to_string())?;
    let channel = identity::channel_id(&req.client_id, &req.room_id);
    let entry = state.core.registry.create_if_absent(&req.client_id, &req.room_id);

    // The first identity to reach an otherwise-empty room bootstraps it as
    // host, mirroring the "first join becomes host" convention of most
    // conferencing front ends; every later join is evaluated against
    // `adminUserKeys`/`blockedUserKeys` alone.
    let is_admin_by_token = {
        let room = entry.guard.lock();
        room.host_user_key.is_none() && room.clients.is_empty() && room.pending_clients.is_empty()
    };

    let join_req = JoinRequest {
        user_key: user_key.clone(),
        session_id: req.session_id,
        display_name,
        requested_mode: req.requested_mode.unwrap_or(ParticipantMode::Meeting),
        is_admin_by_token,
        socket: socket.clone(),
    };

    let decision = {
        let room = entry.guard.lock();
        admission::decide(&room, &join_req)
    };

    match decision {
        Decision::Reject(reason) => Err(format!("join rejected: {reason:?}")),
        Decision::Waitlist => {
            let (mutation, superseded) = {
                let mut room = entry.guard.lock();
                admission::waitlist(&mut room, join_req)
            };
            state.core.bus.join_pending(&channel, socket.clone());
            if let Some(prior) = superseded {
                prior.send("joinSuperseded", json!({}));
                prior.disconnect(false);
                state.core.bus.leave_pending(&channel, &prior);
            }
            crate::routes::emit(&state.core.bus, &channel, mutation.events);

            conn.channel = Some(channel);
            conn.user_key = Some(user_key);
            conn.pending = true;
            Ok(json!({"status": "waiting"}))
        }
        Decision::Admit | Decision::AdmitAsAdmin => {
            let is_admin = matches!(decision, Decision::AdmitAsAdmin);
            let router = state.core.media_plane.create_router(&channel).await.map_err(|e| e.to_string())?;
            let outcome = {
                let mut room = entry.guard.lock();
                admission::admit(&mut room, join_req, is_admin)
            };
            state.core.bus.join(&channel, outcome.user_id.clone(), socket.clone());
            crate::routes::emit(&state.core.bus, &channel, outcome.mutation.events);

            conn.channel = Some(channel);
            conn.user_id = Some(outcome.user_id);
            conn.user_key = Some(user_key);
            conn.pending = false;
            Ok(json!({"rtpCapabilities": router.rtp_capabilities.0, "status": "joined"}))
        }
    }
}

async fn handle_leave(state: &AppState, conn: &mut Conn, socket: &SocketRef) -> Result<Value, String> {
    cleanup(state, conn, socket).await;
    *conn = Conn::default();
    Ok(json!({"left": true}))
}

/// Shared teardown for explicit `leave` and for the socket closing without
/// one: removes the participant (or pending entry) from the Room State
/// Machine, the `ChannelBus`, and — if the room is now empty — stops its
/// transcription pipeline and drops it from the registry.
async fn cleanup(state: &AppState, conn: &Conn, socket: &SocketRef) {
    let Some(channel) = conn.channel.clone() else { return };

    if conn.pending {
        state.core.bus.leave_pending(&channel, socket);
        if let (Some(entry), Some(user_key)) = (state.core.registry.get(&channel), &conn.user_key) {
            entry.guard.lock().pending_clients.remove(user_key);
        }
        state.core.registry.remove_if_idle(&channel);
        return;
    }

    let Some(user_id) = conn.user_id.clone() else { return };
    let Some(entry) = state.core.registry.get(&channel) else { return };

    let room_id = entry.guard.lock().id.clone();

    let removed = {
        let mut room = entry.guard.lock();
        room.remove_participant(&user_id)
    };
    state.core.bus.leave(&channel, socket);
    if let Some((participant, events)) = removed {
        crate::routes::emit(&state.core.bus, &channel, events);
        state.core.media_plane.close_participant(&channel, &participant.user_id).await;
    }

    if state.core.registry.remove_if_idle(&channel) {
        let chunks = state.transcription.snapshot(&channel).unwrap_or_default();
        if !chunks.is_empty() {
            let _ = state.minutes.get_or_generate(&channel, room_id, false, TranscriptSource::Stopped(chunks)).await;
        }
        state.transcription.stop(&channel).await;
    }
}

// --- display name / hands --------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisplayNamePayload {
    display_name: String,
}

fn handle_display_name_update(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    let body: DisplayNamePayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let normalized = identity::normalize_display_name(&body.display_name).map_err(|e| e.to_string())?;

    let mutation = entry.guard.lock().update_display_name(&user_key, normalized);
    crate::routes::emit(&state.core.bus, &channel, mutation.events);
    Ok(json!({"changed": mutation.changed}))
}

fn handle_hand(state: &AppState, conn: &Conn, raise: bool) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_id = current_user_id(conn)?;
    let mutation = if raise { entry.guard.lock().raise_hand(&user_id) } else { entry.guard.lock().lower_hand(&user_id) };
    crate::routes::emit(&state.core.bus, &channel, mutation.events);
    Ok(json!({"changed": mutation.changed}))
}

// --- chat -------------------------------------------------------------------

#[derive(Deserialize)]
struct ChatPayload {
    body: String,
}

/// Parses, gates against `chatLocked`/`ttsDisabled`/`dmEnabled`, resolves a
/// DM target if addressed, and fans the message out. Only `/tts` and DMs are
/// server-enforced (§4.7); every other slash command is client-side.
fn handle_chat_send(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_id = current_user_id(conn)?;
    let body: ChatPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let intent = chat::parse_intent(&body.body).map_err(|e| e.to_string())?;

    let room = entry.guard.lock();
    let participant = room.clients.get(&user_id).ok_or("not a participant")?;
    if room.policies.chat_locked && !matches!(room.role_of_participant(participant), Role::Host | Role::Admin) {
        return Err("chat is locked".to_string());
    }
    chat::enforce_policy(&room, &intent).map_err(|e| e.to_string())?;
    let display_name = participant.display_name.clone();

    match intent {
        ChatIntent::Broadcast { body } => {
            drop(room);
            state.core.bus.send_to_channel(&channel, &Event::ChatMessage { from_user_id: user_id, display_name, body });
        }
        ChatIntent::Direct { target_handle, body } => {
            let target = chat::resolve_dm_target(&room, &user_id, &target_handle).map_err(|e| e.to_string())?;
            let target_socket = room.clients.get(&target).map(|p| p.socket.clone());
            drop(room);
            if let Some(socket) = target_socket {
                state.core.bus.send_to_socket(&socket, &Event::ChatDirect { from_user_id: user_id, to_user_id: target, display_name, body });
            }
        }
    }
    Ok(json!({"sent": true}))
}

// --- media ------------------------------------------------------------------

async fn handle_create_transport(state: &AppState, conn: &Conn) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_id = current_user_id(conn)?;
    let pair = state.core.media_plane.create_transport_pair(&channel, &user_id).await.map_err(|e| e.to_string())?;

    {
        let mut room = entry.guard.lock();
        if let Some(p) = room.clients.get_mut(&user_id) {
            p.producer_transport_id = Some(pair.send_transport.id.clone());
            p.consumer_transport_id = Some(pair.recv_transport.id.clone());
        }
    }
    serde_json::to_value(&pair).map_err(|e| e.to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectTransportPayload {
    transport_id: String,
    dtls_parameters: Value,
}

async fn handle_connect_transport(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, _entry) = room_entry(state, conn)?;
    let user_id = current_user_id(conn)?;
    let body: ConnectTransportPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    state
        .core
        .media_plane
        .connect_transport(&channel, &user_id, body.transport_id, DtlsParameters(body.dtls_parameters))
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({"connected": true}))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProducePayload {
    kind: MediaKind,
    media_type: MediaType,
    rtp_parameters: Value,
}

/// Installs the new producer after enforcing I7 (at most one producer per
/// (kind, type) — any predecessor is closed through the Moderation Engine
/// first), and attaches the Transcription Pipeline to the room's first audio
/// producer.
async fn handle_produce(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_id = current_user_id(conn)?;
    let body: ProducePayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;

    let existing = {
        let room = entry.guard.lock();
        room.clients
            .get(&user_id)
            .and_then(|p| p.producers.get(&ProducerKey { kind: body.kind, media_type: body.media_type }).map(|r| r.producer_id.clone()))
    };
    if let Some(old) = existing {
        moderation::close_producer_by_id(&state.core.registry, &channel, &state.core.bus, state.core.media_plane.as_ref(), &old)
            .await
            .map_err(|e| e.to_string())?;
    }

    let producer_id = state
        .core
        .media_plane
        .produce(&channel, &user_id, body.kind, body.media_type, RtpParameters(body.rtp_parameters))
        .await
        .map_err(|e| e.to_string())?;

    {
        let mut room = entry.guard.lock();
        room.install_producer(&user_id, producer_id.clone(), body.kind, body.media_type);
        if body.media_type == MediaType::Screen {
            room.screen_share_producer_id = Some(producer_id.clone());
        }
    }

    if matches!(body.kind, MediaKind::Audio) && state.transcription.is_enabled() {
        let _ = state.transcription.start(&channel, producer_id.clone()).await;
    }

    Ok(json!({"producerId": producer_id}))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsumePayload {
    producer_id: String,
    rtp_capabilities: Value,
}

async fn handle_consume(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_id = current_user_id(conn)?;
    let body: ConsumePayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;

    let info = state
        .core
        .media_plane
        .consume(&channel, &user_id, body.producer_id, &RtpCapabilities(body.rtp_capabilities))
        .await
        .map_err(|e| e.to_string())?;

    if let Some(p) = entry.guard.lock().clients.get_mut(&user_id) {
        p.consumer_count += 1;
    }
    serde_json::to_value(&info).map_err(|e| e.to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProducerIdPayload {
    producer_id: String,
}

async fn handle_close_own_producer(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, _entry) = room_entry(state, conn)?;
    let body: ProducerIdPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let closed = moderation::close_producer_by_id(&state.core.registry, &channel, &state.core.bus, state.core.media_plane.as_ref(), &body.producer_id)
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({"closed": closed.is_some()}))
}

// --- admin:* family ----------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PolicyPayload {
    locked: Option<bool>,
    chat_locked: Option<bool>,
    no_guests: Option<bool>,
    tts_disabled: Option<bool>,
    dm_enabled: Option<bool>,
    requires_meeting_invite_code: Option<bool>,
}

async fn handle_admin_set_policy(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;

    let body: PolicyPayload = serde_json::from_value(payload).unwrap_or_default();
    let update = sfuctl_core::model::PolicyUpdate {
        locked: body.locked,
        chat_locked: body.chat_locked,
        no_guests: body.no_guests,
        tts_disabled: body.tts_disabled,
        dm_enabled: body.dm_enabled,
        requires_meeting_invite_code: body.requires_meeting_invite_code,
    };
    let unlocking = update.locked == Some(false);
    let mutation = entry.guard.lock().set_policy(update);
    crate::routes::emit(&state.core.bus, &channel, mutation.events);

    if unlocking {
        let keys = {
            let room = entry.guard.lock();
            admission::reconcile_unlock(&room)
        };
        for pending in keys {
            crate::ws::admission::admit_pending_entry(state, &channel, &entry, pending).await;
        }
    }
    Ok(json!({"changed": mutation.changed}))
}

#[derive(Deserialize)]
struct NoticePayload {
    message: String,
}

fn handle_admin_notice(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: NoticePayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    state.core.bus.send_to_channel(&channel, &Event::AdminNotice { message: body.message });
    Ok(json!({"sent": true}))
}

#[derive(Deserialize, Default)]
struct ReasonPayload {
    reason: Option<String>,
}

async fn handle_admin_end(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let room_id = entry.guard.lock().id.clone();
    drop(entry);

    let body: ReasonPayload = serde_json::from_value(payload).unwrap_or_default();
    let reason = body.reason.unwrap_or_else(|| "room ended".to_string());
    state.core.bus.send_to_channel(&channel, &Event::RoomEnded { reason });

    let chunks = state.transcription.snapshot(&channel).unwrap_or_default();
    if !chunks.is_empty() {
        let _ = state.minutes.get_or_generate(&channel, room_id, false, TranscriptSource::Stopped(chunks)).await;
    }
    state.transcription.stop(&channel).await;
    state.core.registry.force_close(&channel, state.core.media_plane.as_ref(), &state.core.bus).await;
    Ok(json!({"ended": true}))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdPayload {
    user_id: String,
    #[serde(default)]
    reason: Option<String>,
}

fn handle_admin_kick(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserIdPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    if Some(&body.user_id) == conn.user_id.as_ref() {
        return Err("cannot kick yourself".to_string());
    }
    let reason = body.reason.unwrap_or_else(|| "removed by administrator".to_string());
    moderation::kick(&state.core.registry, &channel, &state.core.bus, &body.user_id, &reason).map_err(|e| e.to_string())?;
    state.core.registry.remove_if_idle(&channel);
    Ok(json!({"kicked": true}))
}

async fn handle_admin_close_producer(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: ProducerIdPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let closed = moderation::close_producer_by_id(&state.core.registry, &channel, &state.core.bus, state.core.media_plane.as_ref(), &body.producer_id)
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({"closed": closed.is_some()}))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SelectorPayload {
    kinds: Option<Vec<MediaKind>>,
    types: Option<Vec<MediaType>>,
    reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloseClientProducersPayload {
    user_id: String,
    #[serde(flatten)]
    selector: SelectorPayload,
}

async fn handle_admin_close_client_producers(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: CloseClientProducersPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let reason = body.selector.reason.clone().unwrap_or_else(|| "media enforced by administrator".to_string());
    let selector = ProducerSelector { kinds: body.selector.kinds, types: body.selector.types };
    let closed = moderation::close_client_producers(&state.core.registry, &channel, &state.core.bus, state.core.media_plane.as_ref(), &body.user_id, &selector, &reason)
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({"closedCount": closed.len()}))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BulkClosePayload {
    #[serde(flatten)]
    selector: SelectorPayload,
    #[serde(default)]
    include_admins: bool,
    #[serde(default)]
    include_ghosts: bool,
    #[serde(default)]
    include_attendees: bool,
}

async fn handle_admin_bulk_close(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: BulkClosePayload = serde_json::from_value(payload).unwrap_or_default();
    let reason = body.selector.reason.clone().unwrap_or_else(|| "media enforced by administrator".to_string());
    let selector = ProducerSelector { kinds: body.selector.kinds, types: body.selector.types };
    let opts = BulkCloseOptions { include_admins: body.include_admins, include_ghosts: body.include_ghosts, include_attendees: body.include_attendees };
    let closed = moderation::bulk_close(&state.core.registry, &channel, &state.core.bus, state.core.media_plane.as_ref(), &selector, &opts, &reason)
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({"closedCount": closed.len()}))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserKeyPayload {
    user_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockUserPayload {
    user_key: String,
    #[serde(default)]
    kick_present: bool,
    #[serde(default)]
    reason: Option<String>,
}

fn handle_admin_block_user(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: BlockUserPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let reason = body.reason.unwrap_or_else(|| "blocked by administrator".to_string());
    let outcome = moderation::block_identity(&state.core.registry, &channel, &state.core.bus, &body.user_key, body.kick_present, &reason)
        .map_err(|e| e.to_string())?;
    Ok(json!({"changed": outcome.changed, "kicked": outcome.kicked}))
}

fn handle_admin_unblock_user(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (_channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserKeyPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let mutation = entry.guard.lock().unblock_user(&body.user_key);
    Ok(json!({"changed": mutation.changed}))
}

async fn handle_admin_allow_user(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserKeyPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;

    let (mutation, locked) = {
        let mut room = entry.guard.lock();
        (room.allow_user(&body.user_key), room.policies.locked)
    };

    if !locked {
        let pending = entry.guard.lock().pending_clients.get(&body.user_key).cloned();
        if let Some(pending) = pending {
            crate::ws::admission::admit_pending_entry(state, &channel, &entry, pending).await;
        }
    }
    Ok(json!({"changed": mutation.changed}))
}

fn handle_admin_revoke_allowed_user(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (_channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserKeyPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let mutation = entry.guard.lock().revoke_allowed_user(&body.user_key);
    Ok(json!({"changed": mutation.changed}))
}

fn handle_admin_allow_locked_user(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (_channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserKeyPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let mutation = entry.guard.lock().allow_locked_user(&body.user_key);
    Ok(json!({"changed": mutation.changed}))
}

fn handle_admin_revoke_locked_allowed_user(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (_channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserKeyPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let mutation = entry.guard.lock().revoke_locked_allowed_user(&body.user_key);
    Ok(json!({"changed": mutation.changed}))
}

fn handle_admin_promote(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserIdPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let mutation = entry.guard.lock().promote_to_admin(&body.user_id).map_err(|e| e.to_string())?;
    crate::routes::emit(&state.core.bus, &channel, mutation.events);
    Ok(json!({"changed": mutation.changed}))
}

fn handle_admin_demote(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserKeyPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let mutation = entry.guard.lock().demote_admin(&body.user_key);
    crate::routes::emit(&state.core.bus, &channel, mutation.events);
    Ok(json!({"changed": mutation.changed}))
}

fn handle_admin_transfer_host(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserIdPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    moderation::transfer_host(&state.core.registry, &channel, &state.core.bus, &body.user_id).map_err(|e| e.to_string())?;
    Ok(json!({"transferred": true}))
}

fn handle_admin_clear_hands(state: &AppState, conn: &Conn) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let mutation = entry.guard.lock().clear_hands();
    crate::routes::emit(&state.core.bus, &channel, mutation.events);
    Ok(json!({"changed": mutation.changed}))
}

async fn handle_admin_pending_admit(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserKeyPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;

    let pending = entry.guard.lock().pending_clients.get(&body.user_key).cloned();
    let Some(pending) = pending else {
        return Ok(json!({"admitted": false}));
    };
    crate::ws::admission::admit_pending_entry(state, &channel, &entry, pending).await;
    Ok(json!({"admitted": true}))
}

fn handle_admin_pending_reject(state: &AppState, conn: &Conn, payload: Value) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let body: UserKeyPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
    let rejected = crate::ws::admission::reject_pending_entry(state, &channel, &entry, &body.user_key, "rejected by administrator");
    Ok(json!({"rejected": rejected}))
}

async fn handle_admin_pending_admit_all(state: &AppState, conn: &Conn) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let all: Vec<_> = entry.guard.lock().pending_clients.values().cloned().collect();
    let count = all.len();
    for pending in all {
        crate::ws::admission::admit_pending_entry(state, &channel, &entry, pending).await;
    }
    Ok(json!({"admittedCount": count}))
}

fn handle_admin_pending_reject_all(state: &AppState, conn: &Conn) -> Result<Value, String> {
    let (channel, entry) = room_entry(state, conn)?;
    let user_key = conn.user_key.clone().ok_or("not joined")?;
    require_admin(&entry, &user_key)?;
    let keys: Vec<String> = entry.guard.lock().pending_clients.keys().cloned().collect();
    let mut count = 0;
    for key in keys {
        if crate::ws::admission::reject_pending_entry(state, &channel, &entry, &key, "rejected by administrator") {
            count += 1;
        }
    }
    Ok(json!({"rejectedCount": count}))
}
