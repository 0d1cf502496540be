//! Selection algorithms
//!
//! Strategies for picking one item out of an eligible set. Used by the proxy
//! pool directly and by the credential pool for its round-robin cursor.

mod first;
mod random;
mod round_robin;

pub use first::First;
pub use random::Random;
pub use round_robin::RoundRobin;

use std::sync::Arc;

/// Strategy types for item selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    #[default]
    RoundRobin,
    Random,
    First,
}

impl SelectionStrategy {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "random" => Self::Random,
            "first" => Self::First,
            _ => Self::RoundRobin,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
            Self::First => "first",
        }
    }
}

/// Trait for selection strategies
///
/// Implementations only decide on an index; applying it to a slice is done by
/// [`select`](trait.SelectionAlgorithm.html#method.select) on the trait object.
pub trait SelectionAlgorithm: Send + Sync {
    /// Pick an index in `0..len`, or `None` when `len` is zero
    fn next_index(&self, len: usize) -> Option<usize>;

    /// Get the strategy name
    fn name(&self) -> &'static str;
}

impl dyn SelectionAlgorithm + '_ {
    /// Select an item from `items`
    ///
    /// Returns `None` for an empty slice; never fails otherwise.
    pub fn select<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        self.next_index(items.len()).and_then(|idx| items.get(idx))
    }
}

/// Create a selection algorithm based on the strategy type
pub fn create_algorithm(strategy: SelectionStrategy) -> Arc<dyn SelectionAlgorithm> {
    match strategy {
        SelectionStrategy::RoundRobin => Arc::new(RoundRobin::new()),
        SelectionStrategy::Random => Arc::new(Random),
        SelectionStrategy::First => Arc::new(First),
    }
}
