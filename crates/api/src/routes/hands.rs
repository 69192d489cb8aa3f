//! `POST /admin/rooms/{roomId}/hands/clear`.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::error::ApiError;
use crate::extractors::{RequireSecret, TenantScope};
use crate::routes::emit;
use crate::state::AppState;

#[derive(Serialize)]
pub struct MutationResult {
    changed: bool,
}

pub async fn clear(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MutationResult>, ApiError> {
    let (channel, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    let mutation = entry.guard.lock().clear_hands();
    let changed = mutation.changed;
    emit(&state.core.bus, &channel, mutation.events);
    Ok(Json(MutationResult { changed }))
}
