//! Bounded queue + worker pool for asynchronously answered events.
//!
//! Webhook handlers enqueue an [`InboundEvent`] and return immediately. A
//! single dispatch loop drains the queue and runs each event through the
//! shared [`Pipeline`] in its own task, with at most `workers.count` events
//! in flight.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use chatrelay_channels::ChannelManager;
use chatrelay_core::config::WorkersConfig;
use chatrelay_core::{RelayError, Result};

use crate::event::InboundEvent;
use crate::pipeline::Pipeline;

/// Producer side of the event queue. Dropping every clone stops the pool
/// once the queued events are finished.
#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::Sender<InboundEvent>,
}

impl WorkerPool {
    /// Start the dispatch loop. The returned handle resolves after the pool
    /// is dropped and every in-flight event has completed.
    pub fn spawn(
        pipeline: Arc<Pipeline>,
        channels: Arc<ChannelManager>,
        config: &WorkersConfig,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let handle = tokio::spawn(run_dispatch_loop(
            rx,
            pipeline,
            channels,
            config.count.max(1),
        ));
        info!(
            workers = config.count,
            queue_depth = config.queue_depth,
            "worker pool started"
        );
        (Self { tx }, handle)
    }

    /// Queue `event` without waiting. Fails when the queue is full or the
    /// pool has stopped.
    pub fn enqueue(&self, event: InboundEvent) -> Result<()> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(ev)) => {
                warn!(event = %ev.id, "event queue full, dropping event");
                Err(RelayError::QueueFull {
                    capacity: self.tx.max_capacity(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RelayError::QueueClosed),
        }
    }

    /// Events currently waiting for a worker.
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn queue_capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

async fn run_dispatch_loop(
    mut rx: mpsc::Receiver<InboundEvent>,
    pipeline: Arc<Pipeline>,
    channels: Arc<ChannelManager>,
    max_in_flight: usize,
) {
    let semaphore = Arc::new(Semaphore::new(max_in_flight));
    let mut workers = JoinSet::new();

    while let Some(event) = rx.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let Some(channel) = channels.get(&event.channel) else {
            warn!(event = %event.id, channel = %event.channel, "no channel registered, event dropped");
            continue;
        };

        let pipeline = Arc::clone(&pipeline);
        workers.spawn(async move {
            let _permit = permit;
            debug!(event = %event.id, key = %event.key, "worker picked up event");
            pipeline.process(&event, channel.as_ref()).await;
        });

        // Reap finished tasks so the set does not grow with uptime.
        while workers.try_join_next().is_some() {}
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "worker task panicked");
        }
    }
    info!("worker pool stopped");
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::gateway::{ChatResult, CompletionGateway, GatewayError, ImageResult};
    use chatrelay_channels::{
        CollectedReply, DispatchTarget, FetchError, ImageFetcher, ReplyCollector, ReplyDispatcher,
    };
    use chatrelay_core::{ConversationKey, Role, Turn};
    use chatrelay_memory::ShardedHistoryStore;

    struct UpperGateway;

    #[async_trait]
    impl CompletionGateway for UpperGateway {
        fn name(&self) -> &str {
            "upper"
        }
        async fn chat_complete(&self, window: &[Turn]) -> std::result::Result<ChatResult, GatewayError> {
            Ok(ChatResult {
                role: Role::Assistant,
                text: window.last().map(|t| t.content.to_uppercase()).unwrap_or_default(),
            })
        }
        async fn generate_images(&self, _prompt: &str) -> std::result::Result<ImageResult, GatewayError> {
            Err(GatewayError::InvalidRequest("images disabled".into()))
        }
    }

    struct NoFetch;

    #[async_trait]
    impl ImageFetcher for NoFetch {
        async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
            Err(FetchError::Empty { url: url.to_string() })
        }
    }

    fn setup(collector: Arc<ReplyCollector>, count: usize, depth: usize) -> (WorkerPool, JoinHandle<()>) {
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(ShardedHistoryStore::new(10)),
            Arc::new(UpperGateway),
            ReplyDispatcher::new(Arc::new(NoFetch)),
        ));
        let mut channels = ChannelManager::new();
        channels.register(collector);
        WorkerPool::spawn(
            pipeline,
            Arc::new(channels),
            &WorkersConfig {
                count,
                queue_depth: depth,
            },
        )
    }

    fn group_event(channel: &str, text: &str) -> InboundEvent {
        InboundEvent::new(
            channel,
            ConversationKey::from("g"),
            text,
            "@admin",
            DispatchTarget::Group {
                group_id: "g".into(),
            },
        )
    }

    #[tokio::test]
    async fn processes_queued_events_before_stopping() {
        let collector = Arc::new(ReplyCollector::new("im"));
        let (pool, handle) = setup(collector.clone(), 1, 8);

        pool.enqueue(group_event("im", "@admin hello")).unwrap();
        pool.enqueue(group_event("im", "@admin world")).unwrap();
        drop(pool);
        handle.await.unwrap();

        assert_eq!(
            collector.drain(),
            vec![
                CollectedReply::Text("HELLO".into()),
                CollectedReply::Text("WORLD".into()),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_channel_is_dropped() {
        let collector = Arc::new(ReplyCollector::new("im"));
        let (pool, handle) = setup(collector.clone(), 2, 8);

        pool.enqueue(group_event("discord", "@admin hi")).unwrap();
        drop(pool);
        handle.await.unwrap();

        assert!(collector.drain().is_empty());
    }

    #[tokio::test]
    async fn full_queue_is_reported() {
        let (tx, _rx) = mpsc::channel(1);
        let pool = WorkerPool { tx };

        pool.enqueue(group_event("im", "first")).unwrap();
        let err = pool.enqueue(group_event("im", "second")).unwrap_err();
        assert!(matches!(err, RelayError::QueueFull { capacity: 1 }));
        assert_eq!(pool.queued(), 1);
    }
}
