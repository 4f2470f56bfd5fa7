use std::sync::atomic::{AtomicU64, Ordering};

use crate::broker::message::MessageId;

/// Hands out strictly increasing message ids, starting at 1.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Ids are unique until the counter reaches `u64::MAX`; the next call
    /// after that wraps to 0. At one id per nanosecond that is centuries away,
    /// so exhaustion is not handled.
    pub fn next_id(&self) -> MessageId {
        MessageId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
