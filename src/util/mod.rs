//! Utilities used by the inspector.

/// Address type in the inspected process.
pub mod address;
/// Constants used in the inspector.
pub mod constants;
/// Calculation, conversion and rounding for memory related numbers.
pub mod conversions;
/// Errors raised while reading a foreign heap.
pub mod error;
/// Immutable address ranges.
pub mod heap_range;
/// Wrapper functions for the `log` crate.
pub mod logger;
/// Mark bitmap and bit range visiting.
pub mod metadata;
/// Inspector options.
pub mod options;

#[cfg(test)]
pub(crate) mod test_util;

pub use self::address::Address;
pub use self::heap_range::HeapRange;
