//! [`UpdatableSet`] a sorted set whose elements may be marked for removal or update
//! while it is being iterated.
//!
//! Marking only records intent, so it takes `&self` and can be called from inside
//! a loop over [`UpdatableSet::iter`]. The marks are applied by
//! [`UpdatableSet::update_all_marked`], which takes `&mut self` and so cannot run
//! while any iterator is alive.
//!
//! Marks are keyed by [`ElementId`] rather than by value, because the value being
//! changed may be exactly what the set is ordered by.

use std::cell::RefCell;
use std::error::Error;
use std::fmt::{self, Debug};
use std::ops::RangeBounds;

use tracing::{debug, trace};

use crate::collections::sorted_set::{self, ElementId, SortedSet};
use crate::compare::{Compare, Natural};
use crate::update::Updatable;

mod marks;
pub use marks::{Drained, MarkRegistry};

mod policy;
pub use policy::{BatchPolicy, OnFailure};

/// A sorted set supporting deferred removal and re-keying of elements.
///
/// # Guide to methods
///
/// Set Creation: [`new`], [`with_comparator`], [`with_policy`]
///
/// Marking: [`mark_for_removal`], [`mark_for_update`], [`unmark`],
/// [`is_marked_for_removal`], [`is_marked_for_update`], [`pending_marks`]
///
/// Applying marks: [`update_all_marked`]
///
/// Passthrough: [`insert`], [`remove`], [`get`], [`find`], [`contains`], [`iter`],
/// [`values`], [`range`], [`first`], [`last`], [`len`], [`is_empty`], [`clear`]
///
/// [`new`]: UpdatableSet::new
/// [`with_comparator`]: UpdatableSet::with_comparator
/// [`with_policy`]: UpdatableSet::with_policy
/// [`mark_for_removal`]: UpdatableSet::mark_for_removal
/// [`mark_for_update`]: UpdatableSet::mark_for_update
/// [`unmark`]: UpdatableSet::unmark
/// [`is_marked_for_removal`]: UpdatableSet::is_marked_for_removal
/// [`is_marked_for_update`]: UpdatableSet::is_marked_for_update
/// [`pending_marks`]: UpdatableSet::pending_marks
/// [`update_all_marked`]: UpdatableSet::update_all_marked
/// [`insert`]: UpdatableSet::insert
/// [`remove`]: UpdatableSet::remove
/// [`get`]: UpdatableSet::get
/// [`find`]: UpdatableSet::find
/// [`contains`]: UpdatableSet::contains
/// [`iter`]: UpdatableSet::iter
/// [`values`]: UpdatableSet::values
/// [`range`]: UpdatableSet::range
/// [`first`]: UpdatableSet::first
/// [`last`]: UpdatableSet::last
/// [`len`]: UpdatableSet::len
/// [`is_empty`]: UpdatableSet::is_empty
/// [`clear`]: UpdatableSet::clear
///
/// # Example
///
/// ```
/// use deferset::collections::UpdatableSet;
/// use deferset::Updatable;
/// use std::convert::Infallible;
///
/// #[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
/// struct Item {
///     key: u32,
///     name: char,
/// }
///
/// impl Updatable for Item {
///     type Value = u32;
///     type Error = Infallible;
///
///     fn update(&mut self, key: u32) -> Result<(), Infallible> {
///         self.key = key;
///         Ok(())
///     }
/// }
///
/// let mut set = UpdatableSet::new();
/// set.insert(Item { key: 1, name: 'A' });
/// set.insert(Item { key: 2, name: 'B' });
/// set.insert(Item { key: 3, name: 'C' });
///
/// for (id, item) in set.iter() {
///     match item.name {
///         'A' => {
///             set.mark_for_update(id, 5);
///         }
///         'C' => set.mark_for_removal(id),
///         _ => {}
///     }
/// }
///
/// let report = set.update_all_marked().unwrap();
/// assert_eq!((report.removed, report.updated), (1, 1));
/// let names: String = set.values().map(|i| i.name).collect();
/// assert_eq!(names, "BA");
/// ```
pub struct UpdatableSet<T: Updatable, C = Natural> {
    set: SortedSet<T, C>,
    marks: RefCell<MarkRegistry<T::Value>>,
    policy: BatchPolicy,
}

/// Work done by one call of [`UpdatableSet::update_all_marked`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Elements removed.
    pub removed: usize,
    /// Elements updated and reinserted.
    pub updated: usize,
    /// Marks whose element was no longer in the set.
    pub skipped: usize,
}

impl BatchReport {
    /// Number of marks resolved.
    pub fn total(&self) -> usize {
        self.removed + self.updated + self.skipped
    }

    /// Did the batch resolve nothing.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Error returned by [`UpdatableSet::update_all_marked`] when an element refuses an update.
///
/// The failing element stays in the set, placed by its current state.
/// Changes made before the failure stay applied.
#[derive(Debug)]
pub struct BatchError<E> {
    id: ElementId,
    error: E,
    report: BatchReport,
    unprocessed: usize,
    requeued: bool,
}

impl<E> BatchError<E> {
    /// Id of the element whose update failed.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// The error returned by the element.
    pub fn error(&self) -> &E {
        &self.error
    }

    /// Consumes self, returning the element's error.
    pub fn into_error(self) -> E {
        self.error
    }

    /// Work done before the failure.
    pub fn report(&self) -> BatchReport {
        self.report
    }

    /// Number of update marks not reached when the batch stopped.
    pub fn unprocessed(&self) -> usize {
        self.unprocessed
    }

    /// Were the unprocessed marks put back ( [`OnFailure::Requeue`] ).
    pub fn requeued(&self) -> bool {
        self.requeued
    }
}

impl<E: fmt::Display> fmt::Display for BatchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "update of element {} failed: {}", self.id, self.error)?;
        if self.unprocessed > 0 {
            let what = if self.requeued { "requeued" } else { "discarded" };
            write!(f, " ({} unprocessed marks {})", self.unprocessed, what)?;
        }
        Ok(())
    }
}

impl<E: Error + 'static> Error for BatchError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl<T: Updatable> UpdatableSet<T> {
    /// Returns a new, empty set ordered by [`Ord`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

impl<T: Updatable, C> UpdatableSet<T, C> {
    /// Returns a new, empty set ordered by `cmp`.
    ///
    /// # Example
    ///
    /// ```
    /// use deferset::collections::UpdatableSet;
    /// use deferset::compare::{Natural, Reverse};
    ///
    /// let mut set: UpdatableSet<i32, _> = UpdatableSet::with_comparator(Reverse(Natural));
    /// let low = set.insert(1);
    /// set.insert(5);
    /// set.mark_for_update(low, 9);
    /// set.update_all_marked().unwrap();
    /// assert!(set.values().eq([9, 5].iter()));
    /// ```
    #[must_use]
    pub fn with_comparator(cmp: C) -> Self {
        Self::from(SortedSet::with_comparator(cmp))
    }

    /// Returns self with the given batch policy.
    #[must_use]
    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Changes the batch policy.
    pub fn set_policy(&mut self, policy: BatchPolicy) {
        self.policy = policy;
    }

    /// The batch policy.
    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// The comparator ordering this set.
    pub fn comparator(&self) -> &C {
        self.set.comparator()
    }

    /// The underlying ordered storage.
    pub fn as_sorted_set(&self) -> &SortedSet<T, C> {
        &self.set
    }

    /// Consumes self, returning the ordered storage. Pending marks are dropped.
    pub fn into_sorted_set(self) -> SortedSet<T, C> {
        self.set
    }

    /// Returns number of elements in the set.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Does the set have any elements.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Returns `true` if an element with this id is in the set.
    pub fn contains(&self, id: ElementId) -> bool {
        self.set.contains(id)
    }

    /// Reference to the element with this id.
    pub fn get(&self, id: ElementId) -> Option<&T> {
        self.set.get(id)
    }

    /// Reference to the first element, with its id.
    pub fn first(&self) -> Option<(ElementId, &T)> {
        self.set.first()
    }

    /// Reference to the last element, with its id.
    pub fn last(&self) -> Option<(ElementId, &T)> {
        self.set.last()
    }

    /// Iterator over `(id, element)` in ascending order.
    pub fn iter(&self) -> sorted_set::Iter<'_, T> {
        self.set.iter()
    }

    /// Iterator over elements in ascending order.
    pub fn values(&self) -> sorted_set::Values<'_, T> {
        self.set.values()
    }

    /// Removes the element with this id immediately, returning it.
    ///
    /// Marks already made for the id stay and are skipped by the next batch.
    pub fn remove(&mut self, id: ElementId) -> Option<T> {
        self.set.remove(id)
    }

    /// Removes the first element, returning it with its id.
    pub fn pop_first(&mut self) -> Option<(ElementId, T)> {
        self.set.pop_first()
    }

    /// Removes the last element, returning it with its id.
    pub fn pop_last(&mut self) -> Option<(ElementId, T)> {
        self.set.pop_last()
    }

    /// Retains only the elements specified by the predicate.
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(ElementId, &T) -> bool,
    {
        self.set.retain(f);
    }

    /// Removes every element and every pending mark.
    pub fn clear(&mut self) {
        self.set.clear();
        self.marks.get_mut().clear();
    }

    /// Marks the element with this id for removal by the next batch.
    ///
    /// Overrides any pending update for the same id. The set is not changed, so
    /// this is safe to call while iterating.
    pub fn mark_for_removal(&self, id: ElementId) {
        self.marks.borrow_mut().record_removal(id);
    }

    /// Marks the element with this id to be updated with `value` by the next batch.
    ///
    /// Marking the same id again replaces the value. Returns `false`, recording
    /// nothing, if the id is already marked for removal. The set is not changed,
    /// so this is safe to call while iterating.
    pub fn mark_for_update(&self, id: ElementId, value: T::Value) -> bool {
        self.marks.borrow_mut().record_update(id, value)
    }

    /// Forgets any pending mark for this id, returning whether there was one.
    pub fn unmark(&self, id: ElementId) -> bool {
        self.marks.borrow_mut().cancel(id)
    }

    /// Is this id pending removal.
    pub fn is_marked_for_removal(&self, id: ElementId) -> bool {
        self.marks.borrow().is_marked_for_removal(id)
    }

    /// Is this id pending update.
    pub fn is_marked_for_update(&self, id: ElementId) -> bool {
        self.marks.borrow().is_marked_for_update(id)
    }

    /// Number of pending marks.
    pub fn pending_marks(&self) -> usize {
        self.marks.borrow().len()
    }
}

impl<T: Updatable, C: Compare<T>> UpdatableSet<T, C> {
    /// Adds a value to the set, returning its id.
    pub fn insert(&mut self, value: T) -> ElementId {
        self.set.insert(value)
    }

    /// Returns the first element comparing equal to `key`, with its id.
    pub fn find(&self, key: &T) -> Option<(ElementId, &T)> {
        self.set.find(key)
    }

    /// Returns `true` if some element compares equal to `key`.
    pub fn contains_value(&self, key: &T) -> bool {
        self.set.contains_value(key)
    }

    /// Iterator over the elements within `range`, in ascending order.
    pub fn range<R>(&self, range: R) -> sorted_set::Iter<'_, T>
    where
        R: RangeBounds<T>,
    {
        self.set.range(range)
    }

    /// Checks that the elements are in comparator order.
    pub fn is_ordered(&self) -> bool {
        self.set.is_ordered()
    }

    /// Applies every pending mark, removals first, then updates.
    ///
    /// Every marked element is taken out of the set by id in one pass. Removed
    /// elements are dropped; the others are updated and placed again by comparator,
    /// each after any remaining element comparing equal to it. Marks for ids no
    /// longer in the set are skipped. The registry is empty afterwards, except when a
    /// failure occurs under [`OnFailure::Requeue`].
    ///
    /// A batch over `k` marks of an `n` element set costs `O(n + k log k)`
    /// comparisons and moves.
    ///
    /// # Errors
    ///
    /// Stops at the first element whose [`Updatable::update`] fails. That element
    /// stays in the set and its mark is consumed; earlier changes are kept; the
    /// remaining update marks are discarded or requeued according to the
    /// [`BatchPolicy`].
    ///
    /// # Panics
    ///
    /// If an update panics, every element taken out for update is placed back before
    /// the panic propagates and the drained marks are lost. A comparator that panics
    /// while elements are being placed back leaves the set short of those elements.
    ///
    /// # Example
    ///
    /// ```
    /// use deferset::collections::UpdatableSet;
    ///
    /// let mut set: UpdatableSet<i32> = [10, 20, 30].into_iter().collect();
    /// let ids: Vec<_> = set.iter().map(|(id, _)| id).collect();
    /// set.mark_for_update(ids[0], 40);
    /// set.mark_for_removal(ids[1]);
    ///
    /// let report = set.update_all_marked().unwrap();
    /// assert_eq!(report.total(), 2);
    /// assert!(set.values().eq([30, 40].iter()));
    /// // Nothing left to do.
    /// assert!(set.update_all_marked().unwrap().is_empty());
    /// ```
    pub fn update_all_marked(&mut self) -> Result<BatchReport, BatchError<T::Error>> {
        let Drained { removals, updates } = self.marks.get_mut().drain();
        let mut report = BatchReport::default();
        if removals.is_empty() && updates.is_empty() {
            return Ok(report);
        }

        let taken = self
            .set
            .take_where(|id| removals.contains(&id) || updates.contains_key(&id));
        let mut restore = Restore {
            set: &mut self.set,
            placed: Vec::with_capacity(updates.len()),
        };
        // Index into `restore.placed` for each update mark, `None` when absent.
        let mut slots = vec![None; updates.len()];
        for (id, element) in taken {
            match updates.get_index_of(&id) {
                Some(ix) => {
                    slots[ix] = Some(restore.placed.len());
                    restore.placed.push((id, element));
                }
                None => {
                    trace!(%id, "removed marked element");
                    report.removed += 1;
                }
            }
        }
        report.skipped = removals.len() - report.removed;

        let mut pending = updates.into_iter().zip(slots);
        while let Some(((id, value), slot)) = pending.next() {
            let Some(ix) = slot else {
                report.skipped += 1;
                continue;
            };
            match restore.placed[ix].1.update(value) {
                Ok(()) => {
                    trace!(%id, "updated marked element");
                    report.updated += 1;
                }
                Err(error) => {
                    let unprocessed = pending.len();
                    let requeued = match self.policy.on_failure() {
                        OnFailure::Halt => false,
                        OnFailure::Requeue => {
                            let marks = self.marks.get_mut();
                            for ((rest, value), _) in pending {
                                marks.record_update(rest, value);
                            }
                            true
                        }
                    };
                    drop(restore);
                    debug!(
                        %id,
                        removed = report.removed,
                        updated = report.updated,
                        unprocessed,
                        requeued,
                        "marked batch stopped by failed update"
                    );
                    return Err(BatchError {
                        id,
                        error,
                        report,
                        unprocessed,
                        requeued,
                    });
                }
            }
        }
        drop(restore);

        debug!(
            removed = report.removed,
            updated = report.updated,
            skipped = report.skipped,
            "applied marked batch"
        );
        Ok(report)
    }
}

/// Places the elements taken out by a batch back into the set when dropped,
/// including while unwinding from a panicking update.
struct Restore<'a, T, C: Compare<T>> {
    set: &'a mut SortedSet<T, C>,
    placed: Vec<(ElementId, T)>,
}

impl<T, C: Compare<T>> Drop for Restore<'_, T, C> {
    fn drop(&mut self) {
        let placed = std::mem::take(&mut self.placed);
        self.set.place_all(placed);
    }
}

impl<T: Updatable, C> From<SortedSet<T, C>> for UpdatableSet<T, C> {
    fn from(set: SortedSet<T, C>) -> Self {
        Self {
            set,
            marks: RefCell::new(MarkRegistry::new()),
            policy: BatchPolicy::new(),
        }
    }
}

impl<T: Updatable, C: Default> Default for UpdatableSet<T, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<T: Updatable + Clone, C: Clone> Clone for UpdatableSet<T, C>
where
    T::Value: Clone,
{
    fn clone(&self) -> Self {
        Self {
            set: self.set.clone(),
            marks: RefCell::new(self.marks.borrow().clone()),
            policy: self.policy,
        }
    }
}

impl<T: Updatable + Debug, C> Debug for UpdatableSet<T, C>
where
    T::Value: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatableSet")
            .field("elements", &self.set)
            .field("marks", &*self.marks.borrow())
            .finish()
    }
}

impl<T: Updatable, C: Compare<T> + Default> FromIterator<T> for UpdatableSet<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<SortedSet<T, C>>())
    }
}

impl<T: Updatable, C: Compare<T>> Extend<T> for UpdatableSet<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.set.extend(iter);
    }
}

impl<'a, T: Updatable, C> IntoIterator for &'a UpdatableSet<T, C> {
    type Item = (ElementId, &'a T);
    type IntoIter = sorted_set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Updatable, C> IntoIterator for UpdatableSet<T, C> {
    type Item = (ElementId, T);
    type IntoIter = sorted_set::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.set.into_iter()
    }
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[cfg(feature = "serde")]
impl<T: Updatable + Serialize, C> Serialize for UpdatableSet<T, C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.set.serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, T, C> Deserialize<'de> for UpdatableSet<T, C>
where
    T: Updatable + Deserialize<'de>,
    C: Compare<T> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        SortedSet::<T, C>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod mytests;
