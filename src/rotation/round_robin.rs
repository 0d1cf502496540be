//! Round-robin selection strategy

use std::sync::atomic::{AtomicUsize, Ordering};

use super::SelectionAlgorithm;

/// Selects items in round-robin order
///
/// The cursor is kept in `[0, len)` of the most recent call. When the eligible
/// set shrinks between calls the cursor simply wraps against the new length.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }

    /// Current cursor position
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl SelectionAlgorithm for RoundRobin {
    fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }

        // Read and advance in one step so concurrent callers never share a slot
        let prev = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some((cur % len + 1) % len)
            })
            .unwrap_or_else(|cur| cur);

        Some(prev % len)
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
