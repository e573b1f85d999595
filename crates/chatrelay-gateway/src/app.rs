use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use chatrelay_agent::{Pipeline, WorkerPool};
use chatrelay_channels::ChannelManager;
use chatrelay_core::RelayConfig;

/// Central shared state, passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: RelayConfig,
    pub pipeline: Arc<Pipeline>,
    /// Long-lived reply channels for queued events.
    pub channels: Arc<ChannelManager>,
    pub workers: WorkerPool,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        pipeline: Arc<Pipeline>,
        channels: Arc<ChannelManager>,
        workers: WorkerPool,
    ) -> Self {
        Self {
            config,
            pipeline,
            channels,
            workers,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/client/messages",
            post(crate::http::client::client_message_handler),
        )
        .route(
            "/webhooks/im",
            post(crate::http::webhooks::im_callback_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
