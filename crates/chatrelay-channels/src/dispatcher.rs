//! Turns a completion result into channel sends.
//!
//! Every payload is delivered independently: a failed fetch or send is
//! recorded in that payload's [`DispatchOutcome`] and the remaining payloads
//! are still attempted. Nothing is retried.

use std::fmt::Display;
use std::sync::Arc;

use tracing::{debug, info, warn};

use chatrelay_core::ReplyMode;

use crate::channel::Channel;
use crate::error::DispatchError;
use crate::fetch::ImageFetcher;
use crate::types::{DispatchTarget, PayloadKind};

/// Sent when the completion produced no payloads.
pub const NOTHING_TO_REPLY: &str = "reply nothing.";
/// Prepended to the upstream error message when the completion call failed.
pub const GATEWAY_ERROR_PREFIX: &str = "gtp request error. ";

/// Result of delivering one payload.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub kind: PayloadKind,
    /// Text that was sent, or the image URL that was fetched.
    pub payload: String,
    pub result: Result<(), DispatchError>,
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct ReplyDispatcher {
    fetcher: Arc<dyn ImageFetcher>,
}

impl ReplyDispatcher {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Deliver `reply` to `target` through `channel`.
    ///
    /// - `Err(e)`: sends `"gtp request error. {e}"` once and returns a single
    ///   failed outcome.
    /// - `Ok([])`: sends `"reply nothing."` once.
    /// - otherwise one outcome per payload, in order.
    pub async fn dispatch<E: Display>(
        &self,
        channel: &dyn Channel,
        target: &DispatchTarget,
        mode: ReplyMode,
        reply: Result<Vec<String>, E>,
    ) -> Vec<DispatchOutcome> {
        let payloads = match reply {
            Ok(p) => p,
            Err(e) => return vec![self.report_gateway_error(channel, target, &e.to_string()).await],
        };

        if payloads.is_empty() {
            return vec![self.send_fallback(channel, target).await];
        }

        let mut outcomes = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let outcome = match mode {
                ReplyMode::Image => self.send_image(channel, target, payload).await,
                ReplyMode::Chat => self.send_text(channel, target, payload).await,
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.is_delivered()).count();
        info!(
            channel = %channel.name(),
            target = %target,
            mode = %mode,
            total = outcomes.len(),
            failed,
            "dispatch complete"
        );
        outcomes
    }

    async fn send_text(
        &self,
        channel: &dyn Channel,
        target: &DispatchTarget,
        payload: String,
    ) -> DispatchOutcome {
        let text = payload.trim().to_string();
        let result = channel
            .send_text(target, &text)
            .await
            .map_err(DispatchError::from);
        if let Err(ref e) = result {
            warn!(channel = %channel.name(), target = %target, error = %e, "text reply failed");
        }
        DispatchOutcome {
            kind: PayloadKind::Text,
            payload: text,
            result,
        }
    }

    async fn send_image(
        &self,
        channel: &dyn Channel,
        target: &DispatchTarget,
        url: String,
    ) -> DispatchOutcome {
        let result = match self.fetcher.fetch(&url).await {
            Ok(bytes) => {
                debug!(url = %url, bytes = bytes.len(), "sending image reply");
                channel
                    .send_image(target, bytes)
                    .await
                    .map_err(DispatchError::from)
            }
            Err(e) => Err(DispatchError::from(e)),
        };
        if let Err(ref e) = result {
            warn!(channel = %channel.name(), target = %target, url = %url, error = %e, "image reply failed");
        }
        DispatchOutcome {
            kind: PayloadKind::Image,
            payload: url,
            result,
        }
    }

    async fn send_fallback(&self, channel: &dyn Channel, target: &DispatchTarget) -> DispatchOutcome {
        let result = channel
            .send_text(target, NOTHING_TO_REPLY)
            .await
            .map_err(DispatchError::from);
        if let Err(ref e) = result {
            warn!(channel = %channel.name(), target = %target, error = %e, "fallback reply failed");
        }
        DispatchOutcome {
            kind: PayloadKind::Text,
            payload: NOTHING_TO_REPLY.to_string(),
            result,
        }
    }

    async fn report_gateway_error(
        &self,
        channel: &dyn Channel,
        target: &DispatchTarget,
        message: &str,
    ) -> DispatchOutcome {
        warn!(target = %target, error = %message, "completion request failed");
        let text = format!("{GATEWAY_ERROR_PREFIX}{message}");
        if let Err(e) = channel.send_text(target, &text).await {
            warn!(channel = %channel.name(), target = %target, error = %e, "error report could not be sent");
        }
        DispatchOutcome {
            kind: PayloadKind::Text,
            payload: text,
            result: Err(DispatchError::Gateway(message.to_string())),
        }
    }
}
