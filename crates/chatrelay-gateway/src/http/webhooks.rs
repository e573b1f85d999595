//! IM callback ingress, POST /webhooks/im.
//!
//! Authenticates the callback according to `im.callback_auth`, filters it
//! down to events worth answering and queues them for the worker pool. The
//! platform gets its acknowledgement before any completion work starts.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use chatrelay_core::RelayError;
use chatrelay_im::{forward_events, CallbackAck, ImCallback};

use crate::app::AppState;
use crate::auth::{auth_error, authenticate};

/// Platform ack plus the relay's own receipt fields.
#[derive(Debug, Serialize)]
pub struct Receipt {
    #[serde(flatten)]
    ack: CallbackAck,
    receipt_id: String,
    /// Events queued from this callback.
    forwarded: usize,
}

/// POST /webhooks/im
///
/// Returns the platform ack on success, 401 on auth failure, 400 on a
/// malformed body and 503 when the event queue cannot take more work.
pub async fn im_callback_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Receipt>, (StatusCode, Json<Value>)> {
    let cfg = &state.config.im;

    if !cfg.enabled {
        warn!("IM callback received but the IM channel is disabled");
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "IM channel is disabled"})),
        ));
    }

    authenticate(
        &cfg.callback_auth,
        &headers,
        &body,
        cfg.callback_secret.as_deref(),
    )
    .map_err(auth_error)?;

    let callback = ImCallback::from_slice(&body).map_err(|e| {
        warn!(error = %e, "invalid IM callback body");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid callback body"})),
        )
    })?;

    let receipt_id = uuid::Uuid::new_v4().to_string();
    let events = forward_events(&callback, &cfg.admin_account);
    if events.is_empty() {
        debug!(command = ?callback.command, from = %callback.from_account, "IM callback ignored");
    }

    let forwarded = events.len();
    for event in events {
        let event_id = event.id.clone();
        state.workers.enqueue(event).map_err(queue_error)?;
        debug!(receipt_id = %receipt_id, event = %event_id, "IM event queued");
    }

    if forwarded > 0 {
        info!(receipt_id = %receipt_id, forwarded, "IM callback accepted");
    }
    Ok(Json(Receipt {
        ack: CallbackAck::ok(),
        receipt_id,
        forwarded,
    }))
}

fn queue_error(e: RelayError) -> (StatusCode, Json<Value>) {
    warn!(error = %e, "IM event not queued");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"error": e.to_string(), "code": e.code()})),
    )
}
