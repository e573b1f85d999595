use chrono::{DateTime, Utc};

use chatrelay_channels::DispatchTarget;
use chatrelay_core::ConversationKey;

/// A message accepted by an ingress adapter, ready for the pipeline.
///
/// Adapters have already applied their own filters (mention required,
/// group-only, admin addressee, …); the pipeline processes every event it
/// receives.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Receipt id for log correlation.
    pub id: String,
    /// Name of the registered channel the reply goes out on.
    pub channel: String,
    pub key: ConversationKey,
    pub text: String,
    /// Mention of the relay inside `text` (e.g. `"@bot"`), stripped before parsing.
    pub mention_token: String,
    pub target: DispatchTarget,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(
        channel: &str,
        key: ConversationKey,
        text: impl Into<String>,
        mention_token: impl Into<String>,
        target: DispatchTarget,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            key,
            text: text.into(),
            mention_token: mention_token.into(),
            target,
            received_at: Utc::now(),
        }
    }
}
