use std::collections::VecDeque;

use chatrelay_core::Turn;

/// Fixed-capacity FIFO of turns for a single conversation.
///
/// Appending to a full window evicts the oldest turn first, so the length
/// never exceeds `capacity`.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `turn`, returning the evicted turn if the window was full.
    pub fn push(&mut self, turn: Turn) -> Option<Turn> {
        let evicted = if self.turns.len() >= self.capacity {
            self.turns.pop_front()
        } else {
            None
        };
        self.turns.push_back(turn);
        evicted
    }

    /// Copy of the window in chronological order.
    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }
}
