//! Comparators used to order elements of a [`SortedSet`](crate::collections::SortedSet).
//!
//! Any `Fn(&T, &T) -> Ordering` closure is a comparator, so most callers never
//! need the types in this module beyond [`Natural`], which is the default.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

/// A total order over `T` that can be injected into a set.
pub trait Compare<T: ?Sized> {
    /// Compare two elements.
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Orders elements by their [`Ord`] implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Natural;

impl<T: Ord + ?Sized> Compare<T> for Natural {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Orders elements by their [`PartialOrd`] implementation.
///
/// Incomparable pairs (for example a NaN against anything) are treated as equal,
/// so they keep their arrival order in the set.
///
/// # Example
///
/// ```
/// use deferset::collections::SortedSet;
/// use deferset::compare::Partial;
///
/// let mut set = SortedSet::with_comparator(Partial);
/// set.insert(2.5);
/// set.insert(-1.0);
/// assert!(set.values().eq([-1.0, 2.5].iter()));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Partial;

impl<T: PartialOrd + ?Sized> Compare<T> for Partial {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.partial_cmp(b).unwrap_or(Ordering::Equal)
    }
}

/// Reverses another comparator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reverse<C>(pub C);

impl<T: ?Sized, C: Compare<T>> Compare<T> for Reverse<C> {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.0.compare(b, a)
    }
}

/// Orders elements by a key extracted with a function, see [`by_key`].
pub struct ByKey<F, K> {
    f: F,
    key: PhantomData<fn() -> K>,
}

/// Returns a comparator ordering elements by the key `f` extracts.
///
/// # Example
///
/// ```
/// use deferset::collections::SortedSet;
/// use deferset::compare::by_key;
///
/// let mut set = SortedSet::with_comparator(by_key(|s: &&str| s.len()));
/// set.insert("harbour");
/// set.insert("ox");
/// set.insert("lamp");
/// assert!(set.values().eq(["ox", "lamp", "harbour"].iter()));
/// ```
pub fn by_key<T, K, F>(f: F) -> ByKey<F, K>
where
    F: Fn(&T) -> K,
    K: Ord,
{
    ByKey {
        f,
        key: PhantomData,
    }
}

impl<T, K: Ord, F: Fn(&T) -> K> Compare<T> for ByKey<F, K> {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.f)(a).cmp(&(self.f)(b))
    }
}

impl<F: Clone, K> Clone for ByKey<F, K> {
    fn clone(&self) -> Self {
        Self {
            f: self.f.clone(),
            key: PhantomData,
        }
    }
}

impl<F, K> fmt::Debug for ByKey<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ByKey")
    }
}

impl<T: ?Sized, F> Compare<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}
