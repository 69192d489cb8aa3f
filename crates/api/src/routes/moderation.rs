//! `producers/{producerId}/close`, the `users/{userId}/*` moderation
//! family, and `users/remove-non-admins`. Each resolves the room, then
//! calls straight into `sfuctl_core::moderation`.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use sfuctl_core::media_plane::{MediaKind, MediaType};
use sfuctl_core::model::Role;
use sfuctl_core::moderation::{self, BulkCloseOptions, ProducerSelector};

use crate::error::ApiError;
use crate::extractors::{RequireSecret, TenantScope};
use crate::state::AppState;

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModerationResult {
    closed_count: usize,
}

pub async fn close_producer(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path((room_id, producer_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ModerationResult>, ApiError> {
    let (channel, _entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let closed = moderation::close_producer_by_id(
        &state.core.registry,
        &channel,
        &state.core.bus,
        state.core.media_plane.as_ref(),
        &producer_id,
    )
    .await?;
    Ok(Json(ModerationResult { closed_count: closed.is_some() as usize }))
}

#[derive(Deserialize, Default)]
pub struct ReasonBody {
    #[serde(default)]
    reason: Option<String>,
}

pub async fn kick_user(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path((room_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<ModerationResult>, ApiError> {
    let (channel, _entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let reason = body.reason.unwrap_or_else(|| "removed by operator".to_string());
    moderation::kick(&state.core.registry, &channel, &state.core.bus, &user_id, &reason)?;
    state.core.registry.remove_if_idle(&channel);
    Ok(Json(ModerationResult { closed_count: 1 }))
}

#[derive(Deserialize, Default)]
pub struct MediaEnforceBody {
    #[serde(default)]
    kinds: Option<Vec<MediaKind>>,
    #[serde(default)]
    types: Option<Vec<MediaType>>,
    #[serde(default)]
    reason: Option<String>,
}

pub async fn enforce_media(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path((room_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<MediaEnforceBody>,
) -> Result<Json<ModerationResult>, ApiError> {
    let (channel, _entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let selector = ProducerSelector { kinds: body.kinds, types: body.types };
    let reason = body.reason.unwrap_or_else(|| "media enforced by operator".to_string());
    let closed = moderation::close_client_producers(
        &state.core.registry,
        &channel,
        &state.core.bus,
        state.core.media_plane.as_ref(),
        &user_id,
        &selector,
        &reason,
    )
    .await?;
    Ok(Json(ModerationResult { closed_count: closed.len() }))
}

async fn close_one_kind(
    state: &AppState,
    channel: &sfuctl_core::identity::ChannelId,
    user_id: &str,
    kind: MediaKind,
    media_type: MediaType,
    reason: &str,
) -> Result<ModerationResult, ApiError> {
    let selector = ProducerSelector { kinds: Some(vec![kind]), types: Some(vec![media_type]) };
    let closed = moderation::close_client_producers(
        &state.core.registry,
        channel,
        &state.core.bus,
        state.core.media_plane.as_ref(),
        user_id,
        &selector,
        reason,
    )
    .await?;
    Ok(ModerationResult { closed_count: closed.len() })
}

pub async fn mute_user(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path((room_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ModerationResult>, ApiError> {
    let (channel, _entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let result = close_one_kind(&state, &channel, &user_id, MediaKind::Audio, MediaType::Webcam, "muted by operator").await?;
    Ok(Json(result))
}

pub async fn video_off_user(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path((room_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ModerationResult>, ApiError> {
    let (channel, _entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let result = close_one_kind(&state, &channel, &user_id, MediaKind::Video, MediaType::Webcam, "camera disabled by operator").await?;
    Ok(Json(result))
}

pub async fn stop_screen_user(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path((room_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ModerationResult>, ApiError> {
    let (channel, _entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let result = close_one_kind(&state, &channel, &user_id, MediaKind::Video, MediaType::Screen, "screen share stopped by operator").await?;
    Ok(Json(result))
}

/// `users/{userId}/block`: resolves the currently-connected participant's
/// `userKey` and blocks the identity, kicking every active session for it
/// (the reference repo's "ban + disconnect" combination).
pub async fn block_user(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path((room_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<ModerationResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let user_key = {
        let room = entry.guard.lock();
        room.user_keys_by_id.get(&user_id).cloned().unwrap_or(user_id.clone())
    };
    let reason = body.reason.unwrap_or_else(|| "blocked by operator".to_string());
    let outcome = moderation::block_identity(&state.core.registry, &channel, &state.core.bus, &user_key, true, &reason)?;
    state.core.registry.remove_if_idle(&channel);
    Ok(Json(ModerationResult { closed_count: outcome.kicked.len() }))
}

pub async fn unblock_user(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path((room_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ModerationResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let user_key = {
        let room = entry.guard.lock();
        room.user_keys_by_id.get(&user_id).cloned().unwrap_or(user_id.clone())
    };
    let mutation = entry.guard.lock().unblock_user(&user_key);
    crate::routes::emit(&state.core.bus, &channel, mutation.events);
    Ok(Json(ModerationResult { closed_count: mutation.changed as usize }))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RemoveNonAdminsBody {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    include_ghosts: bool,
    #[serde(default)]
    include_attendees: bool,
}

/// `users/remove-non-admins`: bulk-kicks every participant whose role is
/// neither host nor admin, honoring the same `include_ghosts`/
/// `include_attendees` candidate filter as [`moderation::bulk_close`]'s
/// `BulkCloseOptions` (admins are never swept by this route, so
/// `include_admins` is always `false`).
pub async fn remove_non_admins(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<RemoveNonAdminsBody>,
) -> Result<Json<ModerationResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let reason = body.reason.unwrap_or_else(|| "removed by operator".to_string());
    let opts = BulkCloseOptions {
        include_admins: false,
        include_ghosts: body.include_ghosts,
        include_attendees: body.include_attendees,
    };

    let targets: Vec<String> = {
        let room = entry.guard.lock();
        room.clients
            .values()
            .filter(|p| {
                let role = room.role_of_participant(p);
                if (role == Role::Admin || role == Role::Host) && !opts.include_admins {
                    return false;
                }
                if matches!(p.mode, sfuctl_core::model::ParticipantMode::Ghost) && !opts.include_ghosts {
                    return false;
                }
                if matches!(
                    p.mode,
                    sfuctl_core::model::ParticipantMode::WebinarAttendee | sfuctl_core::model::ParticipantMode::Observer
                ) && !opts.include_attendees
                {
                    return false;
                }
                true
            })
            .map(|p| p.user_id.clone())
            .collect()
    };

    for user_id in &targets {
        moderation::kick(&state.core.registry, &channel, &state.core.bus, user_id, &reason)?;
    }
    state.core.registry.remove_if_idle(&channel);

    Ok(Json(ModerationResult { closed_count: targets.len() }))
}
