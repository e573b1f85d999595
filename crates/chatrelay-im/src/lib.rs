//! IM platform adapter.
//!
//! Inbound: "after message sent" callbacks for private and group chats,
//! filtered down to text addressed to the admin account.
//! Outbound: REST send-to-user and send-to-group.

pub mod callback;
pub mod channel;
pub mod error;

pub use callback::{forward_events, CallbackAck, CallbackCommand, ImCallback};
pub use channel::ImChannel;
pub use error::ImError;

/// Name the IM channel registers under in the channel manager.
pub const CHANNEL_NAME: &str = "im";
