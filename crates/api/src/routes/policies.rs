//! `POST /admin/rooms/{roomId}/policies|notice|end`.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use sfuctl_core::events::Event;
use sfuctl_core::model::PolicyUpdate;
use sfuctl_minutes::TranscriptSource;

use crate::error::ApiError;
use crate::extractors::{RequireSecret, TenantScope};
use crate::routes::emit;
use crate::state::AppState;

#[derive(Serialize)]
pub struct MutationResult {
    changed: bool,
}

pub async fn set_policies(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Json(update): Json<PolicyUpdate>,
) -> Result<Json<MutationResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;

    let unlock_reconcile = update.locked == Some(false);
    let mutation = {
        let mut room = entry.guard.lock();
        room.set_policy(update)
    };
    let changed = mutation.changed;
    emit(&state.core.bus, &channel, mutation.events);

    if unlock_reconcile {
        reconcile_unlock(&state, &channel, &entry).await;
    }

    Ok(Json(MutationResult { changed }))
}

/// Admits every pending entry whose `userKey` is already allow-listed, now
/// that the room has unlocked. Mirrors the same admission path `joinRoom`
/// uses so the admitted participant gets a router and `rtpCapabilities`.
async fn reconcile_unlock(
    state: &AppState,
    channel: &sfuctl_core::identity::ChannelId,
    entry: &sfuctl_core::registry::RoomEntry,
) {
    let keys = {
        let room = entry.guard.lock();
        sfuctl_core::admission::reconcile_unlock(&room)
    };
    for pending in keys {
        crate::ws::admission::admit_pending_entry(state, channel, entry, pending).await;
    }
}

#[derive(Deserialize)]
pub struct NoticeBody {
    message: String,
}

pub async fn notice(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<NoticeBody>,
) -> Result<Json<MutationResult>, ApiError> {
    let (channel, _entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    state.core.bus.send_to_channel(&channel, &Event::AdminNotice { message: body.message });
    Ok(Json(MutationResult { changed: true }))
}

#[derive(Deserialize, Default)]
pub struct EndBody {
    #[serde(default)]
    reason: Option<String>,
}

pub async fn end_room(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<EndBody>,
) -> Result<Json<MutationResult>, ApiError> {
    let (channel, _entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let reason = body.reason.unwrap_or_else(|| "room ended".to_string());
    state.core.bus.send_to_channel(&channel, &Event::RoomEnded { reason });

    let chunks = state.transcription.snapshot(&channel).unwrap_or_default();
    if !chunks.is_empty() {
        let _ = state
            .minutes
            .get_or_generate(&channel, room_id.clone(), false, TranscriptSource::Stopped(chunks))
            .await;
    }
    state.transcription.stop(&channel).await;
    state.core.registry.force_close(&channel, state.core.media_plane.as_ref(), &state.core.bus).await;
    Ok(Json(MutationResult { changed: true }))
}
