//! Bounded, per-conversation short-term memory.
//!
//! Every conversation keeps at most `capacity` turns (oldest first). The
//! store owns all windows; callers only ever receive copies.

pub mod global;
pub mod sharded;
pub mod store;
pub mod window;

pub use global::GlobalLockHistoryStore;
pub use sharded::ShardedHistoryStore;
pub use store::{build_store, HistoryStore};
pub use window::HistoryWindow;
