use thiserror::Error;

/// Errors that can occur within any channel adapter.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// A message could not be delivered to the remote endpoint.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The channel rejected the supplied credentials or token.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The adapter cannot deliver to this kind of target.
    #[error("Unsupported target for channel {channel}: {target}")]
    UnsupportedTarget { channel: String, target: String },

    /// The adapter has no implementation for this primitive.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Errors raised while downloading generated image bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("empty body fetching {url}")]
    Empty { url: String },
}

/// Why a single dispatched payload was not delivered.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    ChannelSend(#[from] ChannelError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The completion call failed upstream; only the error report was sent.
    #[error("gateway error: {0}")]
    Gateway(String),
}
