pub mod sorted_set;

pub use sorted_set::{ElementId, SortedSet};

pub mod updatable_set;

pub use updatable_set::{BatchError, BatchReport, UpdatableSet};
