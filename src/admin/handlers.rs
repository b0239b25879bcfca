use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::compiler::{ConfigDocument, ServerBlock};
use crate::reconcile::LoopState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub generation: u64,
    pub hash: String,
    pub state: LoopState,
    pub servers: Vec<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.live.current();
    let loop_state = *state.loop_state.borrow();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        generation: snapshot.generation,
        hash: snapshot.hash.clone(),
        state: loop_state,
        servers: snapshot
            .document
            .servers()
            .map(|block| block.host.clone())
            .collect(),
    })
}

/// Rendered text of the live document.
pub async fn get_config(State(state): State<AdminState>) -> String {
    state.live.current().rendered.clone()
}

pub async fn get_servers(State(state): State<AdminState>) -> Json<ConfigDocument> {
    Json(state.live.current().document.clone())
}

pub async fn get_server(
    State(state): State<AdminState>,
    Path(host): Path<String>,
) -> Result<Json<ServerBlock>, StatusCode> {
    state
        .live
        .current()
        .document
        .server(&host.to_lowercase())
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
