#![deny(missing_docs)]

//! Sorted sets whose elements can be re-keyed or removed while iterating, in particular [`collections::UpdatableSet`].
//!
//! Changing the sort key of an element that sits in an ordered collection breaks the
//! collection, and removing elements mid-iteration is not possible at all. Instead,
//! elements are *marked* during iteration and every mark is applied in one batch
//! afterwards by [`collections::UpdatableSet::update_all_marked`].
//!
//!# Features
//!
//! This crate supports the following cargo features:
//! - `serde` : enables serialisation of [`collections::SortedSet`] and [`collections::UpdatableSet`] via serde crate.

/// Element ordering.
pub mod compare;

/// Containers.
pub mod collections;

mod update;
pub use update::Updatable;
