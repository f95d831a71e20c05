use std::convert::Infallible;

/// An element that can change its own sort-relevant state.
///
/// [`UpdatableSet`](crate::collections::UpdatableSet) calls [`update`](Updatable::update)
/// only while the element is out of the ordered storage, then places it again by
/// comparator.
///
/// # Example
///
/// ```
/// use deferset::Updatable;
///
/// struct Job {
///     priority: u8,
/// }
///
/// #[derive(Debug)]
/// struct TooHigh;
///
/// impl Updatable for Job {
///     type Value = u8;
///     type Error = TooHigh;
///
///     fn update(&mut self, priority: u8) -> Result<(), TooHigh> {
///         if priority > 9 {
///             return Err(TooHigh);
///         }
///         self.priority = priority;
///         Ok(())
///     }
/// }
///
/// let mut job = Job { priority: 1 };
/// assert!(job.update(4).is_ok());
/// assert!(job.update(12).is_err());
/// assert_eq!(job.priority, 4);
/// ```
pub trait Updatable {
    /// The new value handed to [`update`](Updatable::update).
    type Value;
    /// Error returned when the update is refused.
    type Error;

    /// Apply `value` to self.
    fn update(&mut self, value: Self::Value) -> Result<(), Self::Error>;
}

macro_rules! replace_updatable_impl {
    ( $( $t:ty ),* ) => {$(
        impl Updatable for $t {
            type Value = $t;
            type Error = Infallible;

            #[inline]
            fn update(&mut self, value: $t) -> Result<(), Infallible> {
                *self = value;
                Ok(())
            }
        }
    )*}
}

replace_updatable_impl!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, String
);
