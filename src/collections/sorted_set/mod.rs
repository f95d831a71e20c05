//! [`SortedSet`] an ordered set with identity handles and an injected comparator.
//!
//! Unlike [`std::collections::BTreeSet`], elements are addressed by the
//! [`ElementId`] returned from [`SortedSet::insert`]. Removal by id never consults
//! the comparator, so an element whose sort key has drifted ( through interior
//! mutability ) can still be found and taken out. Being out of order is a logic
//! error, not a safety issue: nothing in this module relies on order for soundness.

use std::cmp::Ordering;
use std::fmt::{self, Debug};
use std::iter::FusedIterator;
use std::ops::{Bound, RangeBounds};
use std::slice;

use crate::compare::{Compare, Natural};

/// Stable identity of an element within one [`SortedSet`].
///
/// Ids are issued in increasing order and never reused by the set that issued them.
///
/// An id only means something to the set that issued it. Every set starts counting
/// from zero and a clone carries on from the original's counter, so an id taken from
/// one set can match an unrelated element of a sibling set or of a clone.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(u64);

impl ElementId {
    /// Raw value of the id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({})", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone)]
struct Node<T> {
    id: ElementId,
    value: T,
}

/// An ordered set kept in comparator order, with elements addressed by [`ElementId`].
///
/// Elements comparing equal may coexist since they have distinct ids, they are
/// kept in arrival order.
///
/// # Guide to methods
///
/// Set Creation: [`new`], [`with_comparator`]
///
/// Properties: [`len`], [`is_empty`], [`contains`], [`contains_value`], [`is_ordered`]
///
/// Insertion: [`insert`]
///
/// Retrieve: [`get`], [`find`], [`position`], [`first`], [`last`]
///
/// Removal: [`remove`], [`pop_first`], [`pop_last`], [`retain`], [`clear`]
///
/// Iterators: [`iter`], [`values`], [`range`]
///
/// [`new`]: SortedSet::new
/// [`with_comparator`]: SortedSet::with_comparator
/// [`len`]: SortedSet::len
/// [`is_empty`]: SortedSet::is_empty
/// [`contains`]: SortedSet::contains
/// [`contains_value`]: SortedSet::contains_value
/// [`is_ordered`]: SortedSet::is_ordered
/// [`insert`]: SortedSet::insert
/// [`get`]: SortedSet::get
/// [`find`]: SortedSet::find
/// [`position`]: SortedSet::position
/// [`first`]: SortedSet::first
/// [`last`]: SortedSet::last
/// [`remove`]: SortedSet::remove
/// [`pop_first`]: SortedSet::pop_first
/// [`pop_last`]: SortedSet::pop_last
/// [`retain`]: SortedSet::retain
/// [`clear`]: SortedSet::clear
/// [`iter`]: SortedSet::iter
/// [`values`]: SortedSet::values
/// [`range`]: SortedSet::range
///
/// # Example
///
/// ```
/// use deferset::collections::SortedSet;
///
/// let mut cities = SortedSet::new();
/// let paris = cities.insert("Paris");
/// cities.insert("London");
/// cities.insert("Berlin");
///
/// assert!(cities.values().eq(["Berlin", "London", "Paris"].iter()));
/// assert_eq!(cities.remove(paris), Some("Paris"));
/// assert_eq!(cities.len(), 2);
/// ```
pub struct SortedSet<T, C = Natural> {
    nodes: Vec<Node<T>>,
    cmp: C,
    next_id: u64,
}

impl<T> SortedSet<T> {
    /// Returns a new, empty set ordered by [`Ord`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

impl<T, C> SortedSet<T, C> {
    /// Returns a new, empty set ordered by `cmp`.
    ///
    /// # Example
    ///
    /// ```
    /// use deferset::collections::SortedSet;
    ///
    /// let mut set = SortedSet::with_comparator(|a: &i32, b: &i32| b.cmp(a));
    /// set.insert(1);
    /// set.insert(3);
    /// set.insert(2);
    /// assert!(set.values().eq([3, 2, 1].iter()));
    /// ```
    #[must_use]
    pub const fn with_comparator(cmp: C) -> Self {
        Self {
            nodes: Vec::new(),
            cmp,
            next_id: 0,
        }
    }

    /// The comparator ordering this set.
    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    /// Returns number of elements in the set.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Does the set have any elements.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Clears the set, removing all elements. Ids already issued are not reused.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Index of the element with the given id in iteration order.
    ///
    /// This is a linear scan by identity, it never calls the comparator.
    pub fn position(&self, id: ElementId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    /// Returns `true` if an element with this id is in the set.
    pub fn contains(&self, id: ElementId) -> bool {
        self.position(id).is_some()
    }

    /// Reference to the element with this id.
    pub fn get(&self, id: ElementId) -> Option<&T> {
        self.nodes.iter().find(|n| n.id == id).map(|n| &n.value)
    }

    /// Removes the element with this id, returning it.
    ///
    /// Works whatever the current sort key of the element is.
    ///
    /// # Example
    ///
    /// ```
    /// use deferset::collections::SortedSet;
    ///
    /// let mut set = SortedSet::from([1, 2, 3]);
    /// let (two, _) = set.find(&2).unwrap();
    /// assert_eq!(set.remove(two), Some(2));
    /// assert_eq!(set.remove(two), None);
    /// ```
    pub fn remove(&mut self, id: ElementId) -> Option<T> {
        let ix = self.position(id)?;
        Some(self.nodes.remove(ix).value)
    }

    /// Removes the first element, returning it with its id.
    pub fn pop_first(&mut self) -> Option<(ElementId, T)> {
        if self.nodes.is_empty() {
            None
        } else {
            let n = self.nodes.remove(0);
            Some((n.id, n.value))
        }
    }

    /// Removes the last element, returning it with its id.
    pub fn pop_last(&mut self) -> Option<(ElementId, T)> {
        self.nodes.pop().map(|n| (n.id, n.value))
    }

    /// Reference to the first element, with its id.
    pub fn first(&self) -> Option<(ElementId, &T)> {
        self.nodes.first().map(|n| (n.id, &n.value))
    }

    /// Reference to the last element, with its id.
    pub fn last(&self) -> Option<(ElementId, &T)> {
        self.nodes.last().map(|n| (n.id, &n.value))
    }

    /// Retains only the elements specified by the predicate.
    ///
    /// # Example
    ///
    /// ```
    /// use deferset::collections::SortedSet;
    ///
    /// let mut set = SortedSet::from([1, 2, 3, 4, 5, 6]);
    /// set.retain(|_id, &k| k % 2 == 0);
    /// assert!(set.values().eq([2, 4, 6].iter()));
    /// ```
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(ElementId, &T) -> bool,
    {
        self.nodes.retain(|n| f(n.id, &n.value));
    }

    /// Iterator over `(id, element)` in ascending order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            iter: self.nodes.iter(),
        }
    }

    /// Iterator over elements in ascending order.
    pub fn values(&self) -> Values<'_, T> {
        Values {
            iter: self.nodes.iter(),
        }
    }

    fn next_id(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl<T, C: Compare<T>> SortedSet<T, C> {
    /// Number of leading elements for which `pred` holds ( assumes order ).
    fn partition_point<P>(&self, mut pred: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        self.nodes.partition_point(|n| pred(&n.value))
    }

    /// Adds a value to the set, returning its newly issued id.
    ///
    /// The value is placed after any elements comparing equal to it.
    pub fn insert(&mut self, value: T) -> ElementId {
        let id = self.next_id();
        self.place(id, value);
        id
    }

    /// Places an element with an already issued id at its comparator position.
    fn place(&mut self, id: ElementId, value: T) {
        let ix = self.partition_point(|x| self.cmp.compare(x, &value) != Ordering::Greater);
        self.nodes.insert(ix, Node { id, value });
    }

    /// Takes out, in a single pass, every element whose id satisfies `pick`.
    ///
    /// The taken elements are returned in iteration order; the comparator is not used.
    pub(crate) fn take_where<F>(&mut self, mut pick: F) -> Vec<(ElementId, T)>
    where
        F: FnMut(ElementId) -> bool,
    {
        let nodes = std::mem::take(&mut self.nodes);
        self.nodes.reserve(nodes.len());
        let mut taken = Vec::new();
        for n in nodes {
            if pick(n.id) {
                taken.push((n.id, n.value));
            } else {
                self.nodes.push(n);
            }
        }
        taken
    }

    /// Places elements with already issued ids, each after any resident elements
    /// comparing equal to it.
    ///
    /// The batch is stably sorted then merged with the resident elements in one pass.
    pub(crate) fn place_all(&mut self, mut batch: Vec<(ElementId, T)>) {
        match batch.len() {
            0 => return,
            1 => {
                if let Some((id, value)) = batch.pop() {
                    self.place(id, value);
                }
                return;
            }
            _ => {}
        }
        batch.sort_by(|a, b| self.cmp.compare(&a.1, &b.1));
        let resident = std::mem::take(&mut self.nodes);
        self.nodes.reserve(resident.len() + batch.len());
        let mut resident = resident.into_iter().peekable();
        for (id, value) in batch {
            while let Some(n) = resident.next_if(|n| self.cmp.compare(&n.value, &value) != Ordering::Greater) {
                self.nodes.push(n);
            }
            self.nodes.push(Node { id, value });
        }
        self.nodes.extend(resident);
    }

    /// Returns the first element comparing equal to `key`, with its id.
    ///
    /// # Example
    ///
    /// ```
    /// use deferset::collections::SortedSet;
    ///
    /// let set = SortedSet::from(["ash", "elm", "oak"]);
    /// assert_eq!(set.find(&"elm").map(|(_, v)| *v), Some("elm"));
    /// assert!(set.find(&"yew").is_none());
    /// ```
    pub fn find(&self, key: &T) -> Option<(ElementId, &T)> {
        let ix = self.partition_point(|x| self.cmp.compare(x, key) == Ordering::Less);
        let n = self.nodes.get(ix)?;
        if self.cmp.compare(&n.value, key) == Ordering::Equal {
            Some((n.id, &n.value))
        } else {
            None
        }
    }

    /// Returns `true` if some element compares equal to `key`.
    pub fn contains_value(&self, key: &T) -> bool {
        self.find(key).is_some()
    }

    /// Iterator over the elements within `range`, in ascending order.
    ///
    /// An empty iterator is returned if the start bound lies after the end bound.
    ///
    /// # Example
    ///
    /// ```
    /// use deferset::collections::SortedSet;
    /// use std::ops::Bound::{Excluded, Included};
    ///
    /// let set: SortedSet<i32> = (1..=10).collect();
    /// assert!(set.range(3..6).map(|(_, v)| v).eq([3, 4, 5].iter()));
    /// assert!(set.range((Excluded(8), Included(10))).map(|(_, v)| v).eq([9, 10].iter()));
    /// ```
    pub fn range<R>(&self, range: R) -> Iter<'_, T>
    where
        R: RangeBounds<T>,
    {
        let start = match range.start_bound() {
            Bound::Included(b) => {
                self.partition_point(|x| self.cmp.compare(x, b) == Ordering::Less)
            }
            Bound::Excluded(b) => {
                self.partition_point(|x| self.cmp.compare(x, b) != Ordering::Greater)
            }
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(b) => {
                self.partition_point(|x| self.cmp.compare(x, b) != Ordering::Greater)
            }
            Bound::Excluded(b) => {
                self.partition_point(|x| self.cmp.compare(x, b) == Ordering::Less)
            }
            Bound::Unbounded => self.nodes.len(),
        };
        let end = end.max(start);
        Iter {
            iter: self.nodes[start..end].iter(),
        }
    }

    /// Checks that every adjacent pair of elements is in comparator order.
    ///
    /// Always `true` unless an element's sort key was changed through interior
    /// mutability while resident.
    pub fn is_ordered(&self) -> bool {
        self.nodes
            .windows(2)
            .all(|w| self.cmp.compare(&w[0].value, &w[1].value) != Ordering::Greater)
    }
}

impl<T: Ord, const N: usize> From<[T; N]> for SortedSet<T> {
    fn from(arr: [T; N]) -> Self {
        arr.into_iter().collect()
    }
}

impl<T, C: Default> Default for SortedSet<T, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<T: Clone, C: Clone> Clone for SortedSet<T, C> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            cmp: self.cmp.clone(),
            next_id: self.next_id,
        }
    }
}

impl<T: Debug, C> Debug for SortedSet<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values()).finish()
    }
}

impl<T, C: Compare<T> + Default> FromIterator<T> for SortedSet<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<T, C: Compare<T>> Extend<T> for SortedSet<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<'a, T, C> IntoIterator for &'a SortedSet<T, C> {
    type Item = (ElementId, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T, C> IntoIterator for SortedSet<T, C> {
    type Item = (ElementId, T);
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter {
            iter: self.nodes.into_iter(),
        }
    }
}

/// An iterator over `(id, element)` pairs of a [`SortedSet`].
///
/// This `struct` is created by the [`iter`] and [`range`] methods on [`SortedSet`].
///
/// [`iter`]: SortedSet::iter
/// [`range`]: SortedSet::range
pub struct Iter<'a, T> {
    iter: slice::Iter<'a, Node<T>>,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            iter: self.iter.clone(),
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (ElementId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|n| (n.id, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}
impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.iter.next_back().map(|n| (n.id, &n.value))
    }
}
impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

impl<T: Debug> Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

/// An iterator over the elements of a [`SortedSet`], created by [`SortedSet::values`].
pub struct Values<'a, T> {
    iter: slice::Iter<'a, Node<T>>,
}

impl<T> Clone for Values<'_, T> {
    fn clone(&self) -> Self {
        Self {
            iter: self.iter.clone(),
        }
    }
}

impl<'a, T> Iterator for Values<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.iter.next().map(|n| &n.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}
impl<'a, T> DoubleEndedIterator for Values<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        self.iter.next_back().map(|n| &n.value)
    }
}
impl<T> ExactSizeIterator for Values<'_, T> {}
impl<T> FusedIterator for Values<'_, T> {}

/// An owning iterator over the `(id, element)` pairs of a [`SortedSet`].
pub struct IntoIter<T> {
    iter: std::vec::IntoIter<Node<T>>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = (ElementId, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|n| (n.id, n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}
impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.iter.next_back().map(|n| (n.id, n.value))
    }
}
impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}

#[cfg(feature = "serde")]
use serde::{
    de::{SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};

#[cfg(feature = "serde")]
impl<T: Serialize, C> Serialize for SortedSet<T, C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for v in self.values() {
            seq.serialize_element(v)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct SortedSetVisitor<T, C> {
    marker: std::marker::PhantomData<fn() -> SortedSet<T, C>>,
}

#[cfg(feature = "serde")]
impl<'de, T, C> Visitor<'de> for SortedSetVisitor<T, C>
where
    T: Deserialize<'de>,
    C: Compare<T> + Default,
{
    type Value = SortedSet<T, C>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence of set elements")
    }

    fn visit_seq<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: SeqAccess<'de>,
    {
        let mut set = SortedSet::default();
        if let Some(n) = access.size_hint() {
            set.nodes.reserve(n.min(4096));
        }
        while let Some(v) = access.next_element()? {
            set.insert(v);
        }
        Ok(set)
    }
}

#[cfg(feature = "serde")]
impl<'de, T, C> Deserialize<'de> for SortedSet<T, C>
where
    T: Deserialize<'de>,
    C: Compare<T> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(SortedSetVisitor {
            marker: std::marker::PhantomData,
        })
    }
}
