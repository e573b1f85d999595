use dashmap::DashMap;
use tracing::{debug, instrument};

use chatrelay_core::{ConversationKey, Turn};

use crate::store::HistoryStore;
use crate::window::HistoryWindow;

/// History store partitioned across the shards of a `DashMap`.
///
/// Each key's window lives behind its shard's lock; operations on keys in
/// different shards proceed in parallel.
pub struct ShardedHistoryStore {
    windows: DashMap<ConversationKey, HistoryWindow>,
    capacity: usize,
}

impl ShardedHistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            windows: DashMap::new(),
            capacity,
        }
    }
}

impl HistoryStore for ShardedHistoryStore {
    #[instrument(skip(self, turn), fields(key = %key, role = %turn.role))]
    fn append_and_get(&self, key: &ConversationKey, turn: Turn) -> Vec<Turn> {
        // The entry guard holds the shard write lock until the snapshot is taken.
        let mut window = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| HistoryWindow::new(self.capacity));
        if window.push(turn).is_some() {
            debug!(capacity = self.capacity, "evicted oldest turn");
        }
        window.to_vec()
    }

    fn snapshot(&self, key: &ConversationKey) -> Vec<Turn> {
        self.windows
            .get(key)
            .map(|w| w.to_vec())
            .unwrap_or_default()
    }

    fn conversation_count(&self) -> usize {
        self.windows.len()
    }
}
