use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe with server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "gateway": state.pipeline.gateway().name(),
        "channels": state.channels.names(),
        "queue_capacity": state.workers.queue_capacity(),
        "queued": state.workers.queued(),
    }))
}
