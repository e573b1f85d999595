//! In-process channel that records replies instead of sending them.
//!
//! Used for the synchronous chat-client path: the HTTP handler hands a fresh
//! collector to the pipeline and returns whatever was collected in the
//! response body.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{channel::Channel, error::ChannelError, types::DispatchTarget};

/// One reply captured by a [`ReplyCollector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectedReply {
    Text(String),
    Image(Vec<u8>),
}

pub struct ReplyCollector {
    name: String,
    replies: Mutex<Vec<CollectedReply>>,
}

impl ReplyCollector {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replies: Mutex::new(Vec::new()),
        }
    }

    /// Take every reply collected so far, leaving the collector empty.
    pub fn drain(&self) -> Vec<CollectedReply> {
        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *replies)
    }

    fn push(&self, reply: CollectedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(reply);
    }
}

#[async_trait]
impl Channel for ReplyCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_text(&self, _target: &DispatchTarget, text: &str) -> Result<(), ChannelError> {
        self.push(CollectedReply::Text(text.to_string()));
        Ok(())
    }

    async fn send_image(&self, _target: &DispatchTarget, image: Vec<u8>) -> Result<(), ChannelError> {
        self.push(CollectedReply::Image(image));
        Ok(())
    }
}
