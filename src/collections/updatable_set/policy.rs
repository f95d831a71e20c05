/// What [`update_all_marked`](super::UpdatableSet::update_all_marked) does with the
/// update marks it has not reached yet when an element's update fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnFailure {
    /// Stop and discard the unprocessed marks.
    #[default]
    Halt,
    /// Stop and put the unprocessed marks back into the registry, in their original order.
    Requeue,
}

/// Batch configuration for an [`UpdatableSet`](super::UpdatableSet).
///
/// Changes already applied when a batch fails are never rolled back.
///
/// # Example
///
/// ```
/// use deferset::collections::updatable_set::{BatchPolicy, OnFailure};
///
/// let policy = BatchPolicy::new().with_on_failure(OnFailure::Requeue);
/// assert_eq!(policy.on_failure(), OnFailure::Requeue);
/// assert_eq!(BatchPolicy::default().on_failure(), OnFailure::Halt);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchPolicy {
    on_failure: OnFailure,
}

impl BatchPolicy {
    /// Default policy: halt on failure.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            on_failure: OnFailure::Halt,
        }
    }

    /// Returns the policy with the given failure behaviour.
    #[must_use]
    pub const fn with_on_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure = on_failure;
        self
    }

    /// The failure behaviour.
    pub const fn on_failure(&self) -> OnFailure {
        self.on_failure
    }
}
