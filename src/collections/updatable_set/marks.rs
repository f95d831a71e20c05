//! Identity-keyed bookkeeping of pending removals and updates.

use std::fmt::{self, Debug};

use indexmap::{IndexMap, IndexSet};

use crate::collections::ElementId;

/// Pending marks for an [`UpdatableSet`](super::UpdatableSet).
///
/// An id is never pending both removal and update: removal always wins.
/// Marks are keyed by [`ElementId`], never by the current value of the element,
/// and are kept in the order they were first made.
///
/// # Example
///
/// ```
/// use deferset::collections::{updatable_set::MarkRegistry, SortedSet};
///
/// let mut set = SortedSet::new();
/// let a = set.insert(1);
/// let b = set.insert(2);
///
/// let mut marks = MarkRegistry::new();
/// marks.record_update(a, 10);
/// marks.record_update(b, 20);
/// marks.record_removal(b);
/// assert!(!marks.record_update(b, 30));
///
/// let drained = marks.drain();
/// assert!(marks.is_empty());
/// assert_eq!(drained.removals.len(), 1);
/// assert_eq!(drained.updates.get(&a), Some(&10));
/// assert!(!drained.updates.contains_key(&b));
/// ```
pub struct MarkRegistry<V> {
    removals: IndexSet<ElementId>,
    updates: IndexMap<ElementId, V>,
}

/// Snapshot returned by [`MarkRegistry::drain`].
#[derive(Debug)]
pub struct Drained<V> {
    /// Ids pending removal, in marking order.
    pub removals: IndexSet<ElementId>,
    /// Ids pending update with their new value, in marking order.
    pub updates: IndexMap<ElementId, V>,
}

impl<V> Drained<V> {
    /// Total number of marks in the snapshot.
    pub fn len(&self) -> usize {
        self.removals.len() + self.updates.len()
    }

    /// Is the snapshot empty.
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.updates.is_empty()
    }
}

impl<V> MarkRegistry<V> {
    /// Returns a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            removals: IndexSet::new(),
            updates: IndexMap::new(),
        }
    }

    /// Marks `id` for removal, discarding any pending update for it.
    pub fn record_removal(&mut self, id: ElementId) {
        self.updates.shift_remove(&id);
        self.removals.insert(id);
    }

    /// Marks `id` for update with `value`, replacing any previous pending value.
    ///
    /// Returns `false` and records nothing if `id` is already pending removal.
    pub fn record_update(&mut self, id: ElementId, value: V) -> bool {
        if self.removals.contains(&id) {
            return false;
        }
        self.updates.insert(id, value);
        true
    }

    /// Forgets any mark for `id`, returning whether there was one.
    pub fn cancel(&mut self, id: ElementId) -> bool {
        self.removals.shift_remove(&id) | self.updates.shift_remove(&id).is_some()
    }

    /// Takes every pending mark, leaving the registry empty.
    pub fn drain(&mut self) -> Drained<V> {
        Drained {
            removals: std::mem::take(&mut self.removals),
            updates: std::mem::take(&mut self.updates),
        }
    }

    /// Is `id` pending removal.
    pub fn is_marked_for_removal(&self, id: ElementId) -> bool {
        self.removals.contains(&id)
    }

    /// Is `id` pending update.
    pub fn is_marked_for_update(&self, id: ElementId) -> bool {
        self.updates.contains_key(&id)
    }

    /// The value `id` will be updated with, if any.
    pub fn pending_update(&self, id: ElementId) -> Option<&V> {
        self.updates.get(&id)
    }

    /// Number of pending marks.
    pub fn len(&self) -> usize {
        self.removals.len() + self.updates.len()
    }

    /// Are there no pending marks.
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.updates.is_empty()
    }

    /// Forgets every pending mark.
    pub fn clear(&mut self) {
        self.removals.clear();
        self.updates.clear();
    }
}

impl<V> Default for MarkRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> Clone for MarkRegistry<V> {
    fn clone(&self) -> Self {
        Self {
            removals: self.removals.clone(),
            updates: self.updates.clone(),
        }
    }
}

impl<V: Debug> Debug for MarkRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkRegistry")
            .field("removals", &self.removals)
            .field("updates", &self.updates)
            .finish()
    }
}
