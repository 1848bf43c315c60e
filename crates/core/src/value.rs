//! Values a collection can hold
//!
//! A collection is parametric over a single value type. Sequence-aware
//! operations (iteration, predicated reads, filtering) need to know whether a
//! stored value is a sequence and what its elements are; [`CacheValue`]
//! answers both without any runtime type inspection.
//!
//! `serde_json::Value` is the closed tagged value to use when one collection
//! must hold heterogeneous shapes: JSON arrays are sequences, everything else
//! is a scalar.

use serde_json::Value;

/// A value that can be stored in a [`Collection`](crate::Collection)
pub trait CacheValue: Clone + Send + Sync + 'static {
    /// Element type exposed when the value is a sequence
    type Item: Clone + Send + Sync + 'static;

    /// The value's elements in order, or `None` if it is not a sequence
    fn items(&self) -> Option<&[Self::Item]>;
}

impl CacheValue for Value {
    type Item = Value;

    fn items(&self) -> Option<&[Value]> {
        self.as_array().map(Vec::as_slice)
    }
}

impl<T> CacheValue for Vec<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn items(&self) -> Option<&[T]> {
        Some(self.as_slice())
    }
}

macro_rules! impl_scalar_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CacheValue for $ty {
                type Item = $ty;

                fn items(&self) -> Option<&[$ty]> {
                    None
                }
            }
        )*
    };
}

impl_scalar_value!(String, bool, i32, i64, u32, u64, usize, f32, f64);
