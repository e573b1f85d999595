pub mod channel;
pub mod collector;
pub mod dispatcher;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod types;

pub use channel::Channel;
pub use collector::{CollectedReply, ReplyCollector};
pub use dispatcher::{DispatchOutcome, ReplyDispatcher, GATEWAY_ERROR_PREFIX, NOTHING_TO_REPLY};
pub use error::{ChannelError, DispatchError, FetchError};
pub use fetch::{HttpImageFetcher, ImageFetcher};
pub use manager::ChannelManager;
pub use types::{DispatchTarget, PayloadKind};
