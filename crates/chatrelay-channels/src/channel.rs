use async_trait::async_trait;

use crate::{error::ChannelError, types::DispatchTarget};

/// Common interface implemented by every reply channel (chat client,
/// IM platform, in-process collector, …).
///
/// Both primitives resolve once the remote side accepted or rejected the
/// payload. Implementations must be `Send + Sync` so a single adapter can be
/// shared by concurrent workers.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier (e.g. `"im"`). Used as the key inside
    /// [`ChannelManager`](crate::manager::ChannelManager).
    fn name(&self) -> &str;

    /// Deliver a text message to `target`.
    async fn send_text(&self, target: &DispatchTarget, text: &str) -> Result<(), ChannelError>;

    /// Deliver raw image bytes to `target`.
    async fn send_image(&self, target: &DispatchTarget, image: Vec<u8>) -> Result<(), ChannelError>;
}
