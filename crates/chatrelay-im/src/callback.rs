//! "After message sent" callbacks and the filter that turns them into
//! pipeline events.

use serde::{Deserialize, Serialize};
use tracing::debug;

use chatrelay_agent::InboundEvent;
use chatrelay_channels::DispatchTarget;
use chatrelay_core::ConversationKey;

use crate::error::ImError;
use crate::CHANNEL_NAME;

/// Only plain text bodies are forwarded.
pub const TEXT_ELEM: &str = "TIMTextElem";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackCommand {
    #[serde(rename = "C2C.CallbackAfterSendMsg")]
    AfterPrivateSend,
    #[serde(rename = "Group.CallbackAfterSendMsg")]
    AfterGroupSend,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImCallback {
    #[serde(rename = "CallbackCommand")]
    pub command: CallbackCommand,
    #[serde(rename = "From_Account", default)]
    pub from_account: String,
    #[serde(rename = "To_Account", default)]
    pub to_account: Option<String>,
    #[serde(rename = "GroupId", default)]
    pub group_id: Option<String>,
    #[serde(rename = "MsgBody", default)]
    pub msg_body: Vec<MsgBodyElem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgBodyElem {
    #[serde(rename = "MsgType")]
    pub msg_type: String,
    #[serde(rename = "MsgContent", default)]
    pub msg_content: serde_json::Value,
}

impl MsgBodyElem {
    /// The text of a `TIMTextElem` body; `None` for every other type.
    pub fn text(&self) -> Option<&str> {
        if self.msg_type != TEXT_ELEM {
            return None;
        }
        self.msg_content.get("Text").and_then(|t| t.as_str())
    }
}

impl ImCallback {
    pub fn from_slice(body: &[u8]) -> Result<Self, ImError> {
        Ok(serde_json::from_slice(body)?)
    }

    fn texts(&self) -> impl Iterator<Item = &str> {
        self.msg_body.iter().filter_map(MsgBodyElem::text)
    }
}

/// Body the platform expects back from a callback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackAck {
    #[serde(rename = "ActionStatus")]
    pub action_status: String,
    #[serde(rename = "ErrorCode")]
    pub error_code: i64,
    #[serde(rename = "ErrorInfo")]
    pub error_info: String,
}

impl CallbackAck {
    pub fn ok() -> Self {
        Self {
            action_status: "OK".into(),
            error_code: 0,
            error_info: String::new(),
        }
    }
}

/// Events worth answering in `callback`, one per forwarded text body.
///
/// The platform also fires after-send callbacks for the admin's own
/// replies, so anything sent by `admin` is dropped here.
pub fn forward_events(callback: &ImCallback, admin: &str) -> Vec<InboundEvent> {
    if callback.from_account == admin {
        debug!(from = %callback.from_account, "ignoring callback for own message");
        return Vec::new();
    }
    let mention = format!("@{admin}");

    match callback.command {
        CallbackCommand::AfterPrivateSend => {
            let Some(to) = callback.to_account.as_deref() else {
                return Vec::new();
            };
            if to != admin {
                return Vec::new();
            }
            let key = ConversationKey::pair(&callback.from_account, to);
            callback
                .texts()
                .map(|text| {
                    InboundEvent::new(
                        CHANNEL_NAME,
                        key.clone(),
                        text,
                        mention.as_str(),
                        DispatchTarget::User {
                            sender: admin.to_string(),
                            recipient: callback.from_account.clone(),
                        },
                    )
                })
                .collect()
        }
        CallbackCommand::AfterGroupSend => {
            let Some(group_id) = callback.group_id.as_deref() else {
                return Vec::new();
            };
            callback
                .texts()
                .filter(|text| text.contains(&mention))
                .map(|text| {
                    InboundEvent::new(
                        CHANNEL_NAME,
                        ConversationKey::new(group_id),
                        text,
                        mention.as_str(),
                        DispatchTarget::Group {
                            group_id: group_id.to_string(),
                        },
                    )
                })
                .collect()
        }
        CallbackCommand::Other => Vec::new(),
    }
}
