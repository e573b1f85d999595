//! Per-event processing shared by every ingress.
//!
//! `Received → Parsed → (HistoryUpdated)? → GatewayCalled → Dispatched`.
//!
//! Chat events append the user turn before the gateway reads the window and
//! append the assistant turn before dispatch starts, so a concurrent reader
//! of the same key always sees a gap-free prefix of the exchange. The store
//! lock is never held across the gateway call.

use std::sync::Arc;

use tracing::{debug, info};

use chatrelay_channels::{Channel, DispatchOutcome, ReplyDispatcher};
use chatrelay_core::{ConversationKey, ReplyMode, Turn};
use chatrelay_memory::HistoryStore;

use crate::directive::{self, Directive};
use crate::event::InboundEvent;
use crate::gateway::{CompletionGateway, GatewayError};

pub struct Pipeline {
    history: Arc<dyn HistoryStore>,
    gateway: Arc<dyn CompletionGateway>,
    dispatcher: ReplyDispatcher,
}

impl Pipeline {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        gateway: Arc<dyn CompletionGateway>,
        dispatcher: ReplyDispatcher,
    ) -> Self {
        Self {
            history,
            gateway,
            dispatcher,
        }
    }

    pub fn gateway(&self) -> &dyn CompletionGateway {
        &*self.gateway
    }

    /// Run one event to completion and deliver its replies on `channel`.
    ///
    /// Never fails: gateway and delivery errors end up in the outcomes.
    pub async fn process(&self, event: &InboundEvent, channel: &dyn Channel) -> Vec<DispatchOutcome> {
        let directive = directive::parse(&event.text, &event.mention_token);
        debug!(
            event = %event.id,
            key = %event.key,
            mode = %directive.mode,
            role = ?directive.role,
            "directive parsed"
        );

        let mode = directive.mode;
        let reply = match mode {
            ReplyMode::Chat => self.complete_chat(&event.key, directive).await,
            ReplyMode::Image => self
                .gateway
                .generate_images(&directive.cleaned_text)
                .await
                .map(|r| r.urls),
        };

        let outcomes = self
            .dispatcher
            .dispatch(channel, &event.target, mode, reply)
            .await;

        let elapsed_ms = (chrono::Utc::now() - event.received_at).num_milliseconds();
        info!(
            event = %event.id,
            key = %event.key,
            channel = %channel.name(),
            gateway = %self.gateway.name(),
            delivered = outcomes.iter().filter(|o| o.is_delivered()).count(),
            outcomes = outcomes.len(),
            elapsed_ms,
            "event handled"
        );
        outcomes
    }

    async fn complete_chat(
        &self,
        key: &ConversationKey,
        directive: Directive,
    ) -> Result<Vec<String>, GatewayError> {
        let turn = Turn::new(directive.role.into(), directive.cleaned_text);
        let window = self.history.append_and_get(key, turn);
        debug!(key = %key, turns = window.len(), "history window ready");

        let result = self.gateway.chat_complete(&window).await?;
        if result.is_empty() {
            return Ok(Vec::new());
        }

        let text = result.text.clone();
        self.history.append_and_get(key, result.into_turn());
        Ok(vec![text])
    }
}
