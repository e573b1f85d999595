/// Errors produced by the IM adapter outside of message delivery.
#[derive(Debug, thiserror::Error)]
pub enum ImError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid callback payload: {0}")]
    InvalidCallback(#[from] serde_json::Error),

    #[error("no admin account configured")]
    NoAdminAccount,
}
