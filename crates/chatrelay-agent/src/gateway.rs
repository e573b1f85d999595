use async_trait::async_trait;

use chatrelay_core::{Role, Turn};

/// Assistant reply decoded from a chat completion.
///
/// `text` is empty when the upstream returned no usable choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResult {
    pub role: Role,
    pub text: String,
}

impl ChatResult {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_turn(self) -> Turn {
        Turn::new(self.role, self.text)
    }
}

/// Image URLs decoded from an image generation call, in upstream order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageResult {
    pub urls: Vec<String>,
}

/// The two completion operations the relay depends on.
///
/// Implementations decode the upstream wire format once, at this boundary;
/// the rest of the pipeline only sees the typed results.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Gateway name for logging.
    fn name(&self) -> &str;

    /// Complete a conversation. `window` is the full history, oldest first,
    /// already including the newest user turn.
    async fn chat_complete(&self, window: &[Turn]) -> Result<ChatResult, GatewayError>;

    /// Generate images for `prompt`. Never touches conversation history.
    async fn generate_images(&self, prompt: &str) -> Result<ImageResult, GatewayError>;
}

/// Completion failure. The `Display` output is shown verbatim to the end user.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response; `message` is the upstream `error.message` when present.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// 2xx response carrying an error payload.
    #[error("{0}")]
    Upstream(String),

    #[error("invalid response: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
