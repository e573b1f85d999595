//! Shared fixtures for handler tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{body::Body, response::Response, Router};
use serde_json::Value;

use chatrelay_agent::{
    ChatResult, CompletionGateway, GatewayError, ImageResult, Pipeline, WorkerPool,
};
use chatrelay_channels::{
    ChannelManager, FetchError, ImageFetcher, ReplyCollector, ReplyDispatcher,
};
use chatrelay_core::config::WorkersConfig;
use chatrelay_core::{RelayConfig, Role, Turn};
use chatrelay_memory::ShardedHistoryStore;

use crate::app::{build_router, AppState};

/// Replies "re: <last turn>"; images get one URL per word of the prompt.
/// "fail" yields an upstream error and "hang" never completes.
pub struct StubGateway;

#[async_trait]
impl CompletionGateway for StubGateway {
    fn name(&self) -> &str {
        "stub"
    }

    async fn chat_complete(&self, window: &[Turn]) -> Result<ChatResult, GatewayError> {
        let last = window.last().map(|t| t.content.as_str()).unwrap_or_default();
        if last == "fail" {
            return Err(GatewayError::Upstream("boom".into()));
        }
        if last == "hang" {
            return std::future::pending().await;
        }
        Ok(ChatResult {
            role: Role::Assistant,
            text: format!("re: {last}"),
        })
    }

    async fn generate_images(&self, prompt: &str) -> Result<ImageResult, GatewayError> {
        Ok(ImageResult {
            urls: prompt
                .split_whitespace()
                .map(|w| format!("https://img/{w}"))
                .collect(),
        })
    }
}

/// Image bytes are the URL's last path segment.
pub struct StubFetcher;

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let name = url.rsplit('/').next().unwrap_or_default();
        Ok(name.as_bytes().to_vec())
    }
}

pub fn config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.openai.api_key = "sk-test".into();
    config.im.enabled = true;
    config.im.admin_account = "admin".into();
    config.workers = WorkersConfig {
        count: 2,
        queue_depth: 4,
    };
    config
}

/// Router over stub dependencies. Replies for queued events land in the
/// returned collector, registered as the "im" channel.
pub fn router(config: RelayConfig) -> (Router, Arc<ReplyCollector>) {
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(ShardedHistoryStore::new(config.history.capacity)),
        Arc::new(StubGateway),
        ReplyDispatcher::new(Arc::new(StubFetcher)),
    ));
    let collector = Arc::new(ReplyCollector::new(chatrelay_im::CHANNEL_NAME));
    let mut channels = ChannelManager::new();
    channels.register(collector.clone());
    let channels = Arc::new(channels);
    let (workers, _handle) =
        WorkerPool::spawn(Arc::clone(&pipeline), Arc::clone(&channels), &config.workers);
    let state = Arc::new(AppState::new(config, pipeline, channels, workers));
    (build_router(state), collector)
}

pub async fn read_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Body of a JSON POST request.
pub fn json_body(value: &Value) -> Body {
    Body::from(serde_json::to_vec(value).unwrap())
}

/// Formatted log output captured by [`capture_logs`].
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route events at `level` and above on this thread into a buffer until
/// the guard drops.
pub fn capture_logs(level: tracing::Level) -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
