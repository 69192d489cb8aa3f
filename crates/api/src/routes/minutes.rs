//! `POST /minutes`: fetches (or generates, single-flight) the PDF minutes
//! for a room, addressed by body rather than path so a single global route
//! covers every tenant. Served from `sfuctl_minutes`'s cache once the room
//! has ended; computed on demand from the live transcript while the room is
//! still active.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use sfuctl_minutes::TranscriptSource;

use crate::error::ApiError;
use crate::extractors::RequireSecret;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinutesRequestBody {
    room_id: String,
    #[serde(default)]
    client_id: Option<String>,
}

pub async fn get_minutes(
    _secret: RequireSecret,
    State(state): State<AppState>,
    Json(body): Json<MinutesRequestBody>,
) -> Result<Response, ApiError> {
    let (channel, _entry) = state
        .core
        .registry
        .resolve_by_room_id(&body.room_id, body.client_id.as_deref())
        .map_err(Into::<ApiError>::into)?;

    if let Some(cached) = state.minutes.cached(&channel) {
        return Ok(pdf_response(&body.room_id, &cached.pdf_bytes));
    }

    let room_active = state.core.registry.get(&channel).is_some();
    if !room_active {
        return Err(sfuctl_minutes::MinutesError::NoTranscript.into());
    }

    let chunks = state.transcription.snapshot(&channel).unwrap_or_default();
    let result = state
        .minutes
        .get_or_generate(&channel, body.room_id.clone(), true, TranscriptSource::Live(chunks))
        .await?;

    Ok(pdf_response(&body.room_id, &result.pdf_bytes))
}

fn pdf_response(room_id: &str, bytes: &[u8]) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"minutes-{room_id}.pdf\"")),
        ],
        Body::from(bytes.to_vec()),
    )
        .into_response()
}
