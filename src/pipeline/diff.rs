//! Diff calculation between two observations of the same key.
//!
//! Computes which slots appeared and which disappeared so the dispatcher
//! can decide whether anyone needs to hear about it.

use crate::models::SlotSet;

/// Slots added and removed between two observations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotDiff {
    /// In current but not in previous
    pub added: SlotSet,
    /// In previous but not in current
    pub removed: SlotSet,
}

impl SlotDiff {
    /// Check if there are any changes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn has_additions(&self) -> bool {
        !self.added.is_empty()
    }

    pub fn has_removals(&self) -> bool {
        !self.removed.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// Rebuild the current set from the previous one: `(previous \ removed) ∪ added`.
    pub fn apply(&self, previous: &SlotSet) -> SlotSet {
        previous.difference(&self.removed).union(&self.added)
    }
}

/// Calculate the diff between previous and current observations.
pub fn calculate_diff(previous: &SlotSet, current: &SlotSet) -> SlotDiff {
    SlotDiff {
        added: current.difference(previous),
        removed: previous.difference(current),
    }
}
