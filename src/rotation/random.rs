//! Random selection strategy

use rand::Rng;

use super::SelectionAlgorithm;

/// Selects a uniformly random item from the eligible set
#[derive(Debug, Default, Clone, Copy)]
pub struct Random;

impl SelectionAlgorithm for Random {
    fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }

        Some(rand::thread_rng().gen_range(0..len))
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
