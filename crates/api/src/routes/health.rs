//! `GET /health`, `GET /status`, `GET /rooms` — the three unauthenticated-
//! or secret-only read paths an operator polls without touching a specific
//! room. Grounded on the reference repo's health-check handler pattern in
//! `routes/conference.rs`'s list endpoints.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::extractors::{RequireSecret, TenantScope};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthBody {
    status: &'static str,
}

pub async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    instance_id: String,
    draining: bool,
    room_count: usize,
    transcription_enabled: bool,
}

pub async fn status(_secret: RequireSecret, State(state): State<AppState>) -> Json<StatusBody> {
    Json(StatusBody {
        instance_id: state.instance_id.clone(),
        draining: state.core.drain.is_draining(),
        room_count: state.core.registry.all_channel_ids().len(),
        transcription_enabled: state.transcription.is_enabled(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomsListBody {
    channel_ids: Vec<String>,
}

pub async fn list_rooms(
    _secret: RequireSecret,
    TenantScope(client_id): TenantScope,
    State(state): State<AppState>,
) -> Json<RoomsListBody> {
    let channel_ids = match client_id {
        Some(ref client_id) => state.core.registry.list_by_client_id(client_id),
        None => state.core.registry.all_channel_ids(),
    };
    Json(RoomsListBody { channel_ids })
}
