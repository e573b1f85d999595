use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a reply must be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchTarget {
    /// Reply in place to whoever sent the inbound message; the channel
    /// adapter owns the reply handle.
    Sender { conversation: String },
    /// A named group on the IM platform.
    Group { group_id: String },
    /// A named user on the IM platform, spoken to as `sender`.
    User { sender: String, recipient: String },
}

impl fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchTarget::Sender { conversation } => write!(f, "sender:{}", conversation),
            DispatchTarget::Group { group_id } => write!(f, "group:{}", group_id),
            DispatchTarget::User { sender, recipient } => {
                write!(f, "user:{}->{}", sender, recipient)
            }
        }
    }
}

/// Which send primitive a payload went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Text,
    Image,
}
