use std::sync::Arc;

use chatrelay_core::config::{HistoryConfig, HistoryStrategy};
use chatrelay_core::{ConversationKey, Turn};

use crate::{GlobalLockHistoryStore, ShardedHistoryStore};

/// Conversation history owned by the relay for the process lifetime.
///
/// Implementations must make `append_and_get` atomic per key: the eviction,
/// the append and the snapshot happen under one critical section, so a
/// concurrent reader never sees a half-updated window. Windows are created
/// lazily and never removed.
pub trait HistoryStore: Send + Sync {
    /// Append `turn` to the window for `key` and return the resulting
    /// window, oldest first.
    fn append_and_get(&self, key: &ConversationKey, turn: Turn) -> Vec<Turn>;

    /// Current window for `key`, or an empty vec for an unknown key.
    fn snapshot(&self, key: &ConversationKey) -> Vec<Turn>;

    /// Number of conversations with a window.
    fn conversation_count(&self) -> usize;
}

/// Build the store selected by `[history]` config.
pub fn build_store(config: &HistoryConfig) -> Arc<dyn HistoryStore> {
    match config.strategy {
        HistoryStrategy::Sharded => Arc::new(ShardedHistoryStore::new(config.capacity)),
        HistoryStrategy::GlobalLock => Arc::new(GlobalLockHistoryStore::new(config.capacity)),
    }
}
