//! Reply selection: uniform over the catalog, never the same entry twice in a row.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::catalog::MessageCatalog;

/// Index of the last published catalog entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    last: Option<usize>,
}

impl SelectionState {
    pub fn last(&self) -> Option<usize> {
        self.last
    }

    /// Record a successfully published selection.
    pub fn commit(&mut self, index: usize) {
        self.last = Some(index);
    }
}

pub struct ReplySelector {
    rng: StdRng,
}

impl ReplySelector {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick the next catalog index, excluding `last` when there is a choice.
    ///
    /// Draws from the `len - 1` remaining slots and shifts past `last`, so the
    /// result is uniform over every other index with a single draw. A
    /// one-entry catalog always yields index 0. Returns `None` when empty.
    pub fn next(&mut self, catalog: &MessageCatalog, last: Option<usize>) -> Option<usize> {
        let len = catalog.len();
        match (len, last) {
            (0, _) => None,
            (1, _) => Some(0),
            (_, Some(last)) if last < len => {
                let pick = self.rng.gen_range(0..len - 1);
                Some(if pick >= last { pick + 1 } else { pick })
            }
            _ => Some(self.rng.gen_range(0..len)),
        }
    }
}

impl Default for ReplySelector {
    fn default() -> Self {
        Self::new()
    }
}
