//! Sizes of objects that are allocated but not yet parsable.
//!
//! While CMS marks concurrently, an allocating thread may publish an object
//! before its klass word is installed. To let the marker step over it, the
//! allocator marks the object's first two words and its last word in the
//! mark bitmap. Two consecutive marks at the start of a block cannot come
//! from ordinary marking (objects are at least two words), so they identify
//! the encoding.

use crate::util::error::{InspectError, Result};
use crate::util::metadata::{MarkBitmap, NextMark};
use crate::util::Address;
use crate::vm::MemoryAccess;

/// The result of looking for Printezis marks at a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrintezisSize {
    /// The block is encoded, and this is its size in bytes.
    Resolved(usize),
    /// The block does not carry the encoding.
    NotPresent,
}

pub struct PrintezisSizeResolver<'a, M: MemoryAccess> {
    memory: &'a M,
    bitmap: &'a MarkBitmap,
}

impl<'a, M: MemoryAccess> PrintezisSizeResolver<'a, M> {
    pub fn new(memory: &'a M, bitmap: &'a MarkBitmap) -> Self {
        PrintezisSizeResolver { memory, bitmap }
    }

    pub fn bitmap(&self) -> &MarkBitmap {
        self.bitmap
    }

    /// Recover the size of the block at `addr` from the mark bitmap.
    pub fn resolve_size(&self, addr: Address) -> Result<PrintezisSize> {
        let word = self.bitmap.address_size();
        let second = addr + word;
        if !self.bitmap.is_marked(self.memory, addr)? {
            return Ok(PrintezisSize::NotPresent);
        }
        // A mark on the last covered word cannot be the start of a pair.
        if !self.bitmap.covered_range().contains(second)
            || !self.bitmap.is_marked(self.memory, second)?
        {
            return Ok(PrintezisSize::NotPresent);
        }

        match self
            .bitmap
            .next_marked_word_after(self.memory, addr + 2 * word)?
        {
            NextMark::Found(last) => {
                let size = (last + word) - addr;
                trace!("Printezis block at {}: {} bytes", addr, size);
                Ok(PrintezisSize::Resolved(size))
            }
            NextMark::NotFound { .. } => Err(InspectError::PrintezisTruncated { addr }),
        }
    }
}
