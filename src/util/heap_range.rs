use std::fmt;

use crate::util::error::{InspectError, Result};
use crate::util::Address;

/// An immutable, byte-addressed range `[start, end)` in the inspected heap.
///
/// A `HeapRange` describes a space, a chunk, or a live region. It is never
/// updated: a scan produces new ranges as it advances. Empty ranges are valid
/// and contain nothing.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRange {
    start: Address,
    end: Address,
}

impl HeapRange {
    /// Create a range. Fails if `end` is below `start`.
    pub fn new(start: Address, end: Address) -> Result<Self> {
        if start > end {
            return Err(InspectError::InvalidRange { start, end });
        }
        Ok(HeapRange { start, end })
    }

    /// Create a range from a start and a size in bytes.
    pub fn with_size(start: Address, bytes: usize) -> Result<Self> {
        match start.checked_add(bytes) {
            Some(end) => Ok(HeapRange { start, end }),
            None => Err(InspectError::InvalidRange {
                start,
                end: Address::MAX,
            }),
        }
    }

    pub const fn start(&self) -> Address {
        self.start
    }

    pub const fn end(&self) -> Address {
        self.end
    }

    pub const fn byte_size(&self) -> usize {
        self.end.get_extent(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.start <= addr && addr < self.end
    }

    /// Returns the intersection of the two ranges. The returned range could
    /// be empty if there is no intersection between the ranges.
    pub fn intersection(&self, other: &HeapRange) -> HeapRange {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        HeapRange {
            start,
            end: end.max(start),
        }
    }
}

impl fmt::Debug for HeapRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl fmt::Display for HeapRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {}) {} bytes", self.start, self.end, self.byte_size())
    }
}
