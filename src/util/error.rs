//! Errors raised while reading a foreign heap.
//!
//! "No data" outcomes (an object without Printezis bits, a cancelled scan) are
//! not errors and are reported through their own types, see
//! [`crate::policy::cms::printezis::PrintezisSize`] and
//! [`crate::policy::cms::live_regions::ScanOutcome`].

use std::fmt;

use crate::util::Address;

/// An error from one of the inspection components.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InspectError {
    /// A bitmap or address-space query fell outside its valid window `[start, end)`.
    /// This is a precondition violation by the caller.
    OutOfRangeQuery {
        addr: Address,
        start: Address,
        end: Address,
    },
    /// A block decoded as a free chunk has a size of zero words.
    CorruptFreeChunk { addr: Address, size: usize },
    /// The two Printezis bits are set at `addr` but no terminating bit exists
    /// before the end of the mark bitmap.
    PrintezisTruncated { addr: Address },
    /// The memory collaborator could not supply `len` bytes at `addr`.
    UnreadableMemory { addr: Address, len: usize },
    /// A range whose end is below its start.
    InvalidRange { start: Address, end: Address },
    /// The large-block dictionary could not be walked (too deep or cyclic).
    CorruptDictionary { addr: Address },
    /// A layout or configuration value is unusable.
    InvalidLayout(&'static str),
}

impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectError::OutOfRangeQuery { addr, start, end } => {
                write!(f, "query at {} outside of [{}, {})", addr, start, end)
            }
            InspectError::CorruptFreeChunk { addr, size } => {
                write!(f, "free chunk at {} has invalid size {}", addr, size)
            }
            InspectError::PrintezisTruncated { addr } => write!(
                f,
                "Printezis bits at {} have no terminating mark before the bitmap end",
                addr
            ),
            InspectError::UnreadableMemory { addr, len } => {
                write!(f, "cannot read {} bytes at {}", len, addr)
            }
            InspectError::InvalidRange { start, end } => {
                write!(f, "invalid range [{}, {})", start, end)
            }
            InspectError::CorruptDictionary { addr } => {
                write!(f, "large-block dictionary at {} cannot be walked", addr)
            }
            InspectError::InvalidLayout(what) => write!(f, "invalid layout: {}", what),
        }
    }
}

impl std::error::Error for InspectError {}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, InspectError>;
