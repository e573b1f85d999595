use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Event queue is closed")]
    QueueClosed,
}

impl RelayError {
    /// Short error code string returned to HTTP callers.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::QueueFull { .. } => "QUEUE_FULL",
            RelayError::QueueClosed => "QUEUE_CLOSED",
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
