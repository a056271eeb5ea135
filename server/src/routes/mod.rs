//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The relay serves one websocket endpoint plus two read-only HTTP endpoints:
//! a health check and a room roster for operators.

pub mod ws;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::services::room;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/api/rooms/{room}/peers", get(room_peers))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn room_peers(State(state): State<AppState>, Path(room_id): Path<String>) -> Json<Vec<String>> {
    Json(room::members(&state, &room_id).await)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
