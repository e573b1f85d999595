use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, instrument};

use chatrelay_core::{ConversationKey, Turn};

use crate::store::HistoryStore;
use crate::window::HistoryWindow;

/// History store guarded by a single mutex across every conversation.
///
/// Serializes all keys; kept for deployments that want the simplest
/// possible locking model.
pub struct GlobalLockHistoryStore {
    windows: Mutex<HashMap<ConversationKey, HistoryWindow>>,
    capacity: usize,
}

impl GlobalLockHistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationKey, HistoryWindow>> {
        // A panic elsewhere cannot leave a window half-written: every
        // mutation is a single push on an owned VecDeque.
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HistoryStore for GlobalLockHistoryStore {
    #[instrument(skip(self, turn), fields(key = %key, role = %turn.role))]
    fn append_and_get(&self, key: &ConversationKey, turn: Turn) -> Vec<Turn> {
        let mut windows = self.lock();
        let window = windows
            .entry(key.clone())
            .or_insert_with(|| HistoryWindow::new(self.capacity));
        if window.push(turn).is_some() {
            debug!(capacity = self.capacity, "evicted oldest turn");
        }
        window.to_vec()
    }

    fn snapshot(&self, key: &ConversationKey) -> Vec<Turn> {
        self.lock().get(key).map(|w| w.to_vec()).unwrap_or_default()
    }

    fn conversation_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::build_store;
    use chatrelay_core::config::{HistoryConfig, HistoryStrategy};

    #[test]
    fn evicts_fifo_at_capacity() {
        let store = GlobalLockHistoryStore::new(10);
        let key = ConversationKey::from("g");
        for n in 1..=11 {
            store.append_and_get(&key, Turn::user(n.to_string()));
        }
        let window = store.snapshot(&key);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].content, "2");
        assert_eq!(window[9].content, "11");
    }

    #[test]
    fn snapshot_does_not_create_windows() {
        let store = GlobalLockHistoryStore::new(10);
        store.snapshot(&"ghost".into());
        assert_eq!(store.conversation_count(), 0);
    }

    #[test]
    fn build_store_honours_strategy() {
        let config = HistoryConfig {
            capacity: 2,
            strategy: HistoryStrategy::GlobalLock,
        };
        let store = build_store(&config);
        let key = ConversationKey::from("k");
        store.append_and_get(&key, Turn::user("a"));
        store.append_and_get(&key, Turn::user("b"));
        let window = store.append_and_get(&key, Turn::user("c"));
        assert_eq!(window, vec![Turn::user("b"), Turn::user("c")]);
    }

    #[test]
    fn threads_on_distinct_keys_stay_isolated() {
        let store = Arc::new(GlobalLockHistoryStore::new(64));
        let threads: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|key| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let key = ConversationKey::from(key);
                    for n in 0..40 {
                        store.append_and_get(&key, Turn::user(format!("{key}{n}")));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        for key in ["left", "right"] {
            let window = store.snapshot(&key.into());
            assert_eq!(window.len(), 40);
            assert!(window.iter().all(|t| t.content.starts_with(key)));
            assert_eq!(window[39].content, format!("{key}39"));
        }
    }
}
