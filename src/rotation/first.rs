//! First-item selection strategy

use super::SelectionAlgorithm;

/// Always selects the first item
#[derive(Debug, Default, Clone, Copy)]
pub struct First;

impl SelectionAlgorithm for First {
    fn next_index(&self, len: usize) -> Option<usize> {
        (len > 0).then_some(0)
    }

    fn name(&self) -> &'static str {
        "first"
    }
}
