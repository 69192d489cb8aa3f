//! `pending/{userKey}/admit|reject` and `pending/admit-all|reject-all`.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::error::ApiError;
use crate::extractors::{RequireSecret, TenantScope};
use crate::state::AppState;
use crate::ws::admission::{admit_pending_entry, reject_pending_entry};

#[derive(Serialize)]
pub struct PendingResult {
    affected: usize,
}

pub async fn admit_one(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path((room_id, user_key)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<PendingResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let pending = {
        let room = entry.guard.lock();
        room.pending_clients.get(&user_key).cloned()
    };
    let Some(pending) = pending else {
        return Err(ApiError::NotFound(format!("no pending entry for {user_key}")));
    };
    admit_pending_entry(&state, &channel, &entry, pending).await;
    Ok(Json(PendingResult { affected: 1 }))
}

pub async fn reject_one(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path((room_id, user_key)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<PendingResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let affected = reject_pending_entry(&state, &channel, &entry, &user_key, "rejected by operator");
    Ok(Json(PendingResult { affected: affected as usize }))
}

pub async fn admit_all(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PendingResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let pending: Vec<_> = {
        let room = entry.guard.lock();
        room.pending_ordered().into_iter().cloned().collect()
    };
    let count = pending.len();
    for p in pending {
        admit_pending_entry(&state, &channel, &entry, p).await;
    }
    Ok(Json(PendingResult { affected: count }))
}

pub async fn reject_all(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PendingResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let keys: Vec<String> = {
        let room = entry.guard.lock();
        room.pending_clients.keys().cloned().collect()
    };
    let mut count = 0;
    for key in keys {
        if reject_pending_entry(&state, &channel, &entry, &key, "rejected by operator") {
            count += 1;
        }
    }
    Ok(Json(PendingResult { affected: count }))
}
