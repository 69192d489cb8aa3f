//! `RequireSecret` and `TenantScope`: the two extractors every operator HTTP
//! handler takes, analogous to the reference repo's `AuthUser` extractor but
//! checking a static shared secret instead of a bearer JWT.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

const SECRET_HEADER: &str = "x-sfu-secret";
const CLIENT_HEADER: &str = "x-sfu-client";

/// Proof the caller presented the instance's shared secret. Carries no data
/// — its mere presence in a handler's argument list is the authorization
/// check, same role as the reference repo's `AuthUser` extractor.
pub struct RequireSecret;

impl FromRequestParts<AppState> for RequireSecret {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if provided.is_empty() || provided != state.settings.app.secret {
            return Err(ApiError::Unauthorized("missing or invalid x-sfu-secret".into()));
        }
        Ok(RequireSecret)
    }
}

#[derive(Debug, Deserialize, Default)]
struct ClientIdQuery {
    #[serde(rename = "clientId")]
    client_id: Option<String>,
}

/// Resolves the tenant-disambiguation `clientId`, preferred from the query
/// string, falling back to the `x-sfu-client` header. Absent when neither is
/// supplied — callers then resolve by `roomId` alone, accepting the
/// possibility of an ambiguous-room response.
pub struct TenantScope(pub Option<String>);

impl FromRequestParts<AppState> for TenantScope {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Query(q) = Query::<ClientIdQuery>::from_request_parts(parts, state)
            .await
            .unwrap_or(Query(ClientIdQuery::default()));

        if let Some(client_id) = q.client_id {
            return Ok(TenantScope(Some(client_id)));
        }

        let header = parts
            .headers
            .get(CLIENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok(TenantScope(header))
    }
}
