//! `GET /admin/rooms/{roomId}/access` and the `allow|revoke|block|unblock`
//! access-list mutations, keyed by `userKey` rather than a live `userId`
//! (unlike the `users/{userId}/*` moderation family, these act on the
//! identity whether or not it currently holds a session).

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extractors::{RequireSecret, TenantScope};
use crate::routes::emit;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListBody {
    allowed_user_keys: Vec<String>,
    locked_allowed_user_keys: Vec<String>,
    blocked_user_keys: Vec<String>,
}

pub async fn list_access(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccessListBody>, ApiError> {
    let (_, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let room = entry.guard.lock();
    Ok(Json(AccessListBody {
        allowed_user_keys: room.allowed_user_keys.iter().cloned().collect(),
        locked_allowed_user_keys: room.locked_allowed_user_keys.iter().cloned().collect(),
        blocked_user_keys: room.blocked_user_keys.iter().cloned().collect(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserKeyBody {
    user_key: String,
}

#[derive(Serialize)]
pub struct MutationResult {
    changed: bool,
}

pub async fn allow(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<UserKeyBody>,
) -> Result<Json<MutationResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let mutation = entry.guard.lock().allow_user(&body.user_key);
    let changed = mutation.changed;
    emit(&state.core.bus, &channel, mutation.events);

    if changed {
        let pending = {
            let room = entry.guard.lock();
            room.pending_clients.get(&body.user_key).cloned()
        };
        if let Some(pending) = pending {
            if !entry.guard.lock().policies.locked {
                crate::ws::admission::admit_pending_entry(&state, &channel, &entry, pending).await;
            }
        }
    }
    Ok(Json(MutationResult { changed }))
}

pub async fn revoke(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<UserKeyBody>,
) -> Result<Json<MutationResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let mutation = entry.guard.lock().revoke_allowed_user(&body.user_key);
    let changed = mutation.changed;
    emit(&state.core.bus, &channel, mutation.events);
    Ok(Json(MutationResult { changed }))
}

/// `POST .../access/block` body per spec.md Scenario 2:
/// `{userKeys:[...], kickPresent:true, reason:"policy"}` — a batch of
/// identities plus caller-controlled kick/reason, not a single hardcoded
/// key.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockBody {
    user_keys: Vec<String>,
    #[serde(default)]
    kick_present: bool,
    #[serde(default = "default_block_reason")]
    reason: String,
}

fn default_block_reason() -> String {
    "blocked by operator".to_string()
}

pub async fn block(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<BlockBody>,
) -> Result<Json<MutationResult>, ApiError> {
    let (channel, _entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let mut changed = false;
    for user_key in &body.user_keys {
        let outcome = sfuctl_core::moderation::block_identity(
            &state.core.registry,
            &channel,
            &state.core.bus,
            user_key,
            body.kick_present,
            &body.reason,
        )?;
        changed |= outcome.changed;
    }
    state.core.registry.remove_if_idle(&channel);
    Ok(Json(MutationResult { changed }))
}

pub async fn unblock(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<UserKeyBody>,
) -> Result<Json<MutationResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let mutation = entry.guard.lock().unblock_user(&body.user_key);
    let changed = mutation.changed;
    emit(&state.core.bus, &channel, mutation.events);
    Ok(Json(MutationResult { changed }))
}
