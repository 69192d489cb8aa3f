pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::Router;
use axum::routing::get;
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Mounts the operator HTTP surface (`routes::router`) and the `/ws`
/// upgrade endpoint participants and browsers connect through.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    routes::router()
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
