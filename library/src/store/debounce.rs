//! Trailing-edge debounce of drag moves, one timer per block.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::{BlockId, Position};

#[derive(Clone, Copy, Debug)]
struct PendingMove {
    position: Position,
    due: Instant,
}

#[derive(Debug)]
pub struct MoveDebouncer {
    delay: Duration,
    pending: HashMap<BlockId, PendingMove>,
}

impl MoveDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record the latest position; restarts this block's timer only.
    pub fn schedule(&mut self, block: &BlockId, position: Position, now: Instant) {
        self.pending.insert(
            block.clone(),
            PendingMove {
                position,
                due: now + self.delay,
            },
        );
    }

    /// Moves whose idle period has elapsed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(BlockId, Position)> {
        let mut due: Vec<(BlockId, PendingMove)> = self
            .pending
            .iter()
            .filter(|(_, m)| m.due <= now)
            .map(|(id, m)| (id.clone(), *m))
            .collect();
        due.sort_by(|a, b| a.1.due.cmp(&b.1.due).then_with(|| a.0.cmp(&b.0)));
        for (id, _) in &due {
            self.pending.remove(id);
        }
        due.into_iter().map(|(id, m)| (id, m.position)).collect()
    }

    pub fn cancel(&mut self, block: &BlockId) -> bool {
        self.pending.remove(block).is_some()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, block: &BlockId) -> bool {
        self.pending.contains_key(block)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|m| m.due).min()
    }
}
