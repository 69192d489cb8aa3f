//! `POST /drain`, `GET /admin/overview|workers|rooms|rooms/{roomId}` — the
//! instance-wide operator surface, not scoped to a single room.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use sfuctl_core::drain::DrainRequest;
use sfuctl_core::snapshot::{self, RoomSnapshot};

use crate::error::ApiError;
use crate::extractors::{RequireSecret, TenantScope};
use crate::state::AppState;

pub async fn drain(
    _secret: RequireSecret,
    State(state): State<AppState>,
    Json(req): Json<DrainRequest>,
) -> Json<sfuctl_core::drain::DrainResponse> {
    let resp = state.core.drain.apply(&state.core.registry, &state.core.bus, req).await;
    Json(resp)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewBody {
    instance_id: String,
    draining: bool,
    room_count: usize,
    participant_count: usize,
    pending_count: usize,
}

pub async fn overview(_secret: RequireSecret, State(state): State<AppState>) -> Json<OverviewBody> {
    let channels = state.core.registry.all_channel_ids();
    let (mut participant_count, mut pending_count) = (0usize, 0usize);
    for ch in &channels {
        if let Some(entry) = state.core.registry.get(ch) {
            let room = entry.guard.lock();
            participant_count += room.clients.len();
            pending_count += room.pending_clients.len();
        }
    }
    Json(OverviewBody {
        instance_id: state.instance_id.clone(),
        draining: state.core.drain.is_draining(),
        room_count: channels.len(),
        participant_count,
        pending_count,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkersBody {
    worker_count: usize,
}

/// Worker-pool visibility is intentionally shallow: the `MediaPlane` trait
/// boundary does not expose per-worker load, only the configured count.
pub async fn workers(_secret: RequireSecret, State(state): State<AppState>) -> Json<WorkersBody> {
    Json(WorkersBody { worker_count: state.settings.mediasoup.worker_count })
}

pub async fn admin_rooms(
    _secret: RequireSecret,
    TenantScope(client_id): TenantScope,
    State(state): State<AppState>,
) -> Json<Vec<RoomSnapshot>> {
    let channels = match client_id {
        Some(ref c) => state.core.registry.list_by_client_id(c),
        None => state.core.registry.all_channel_ids(),
    };
    let snapshots = channels
        .iter()
        .filter_map(|ch| state.core.registry.get(ch))
        .map(|entry| snapshot::snapshot(&entry.guard.lock()))
        .collect();
    Json(snapshots)
}

pub async fn admin_room_detail(
    _secret: RequireSecret,
    tenant: TenantScope,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    let (_, entry) = crate::routes::resolve(&state, &room_id, &tenant)?;
    Ok(Json(snapshot::snapshot(&entry.guard.lock())))
}
