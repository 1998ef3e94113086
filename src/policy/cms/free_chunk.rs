use crate::policy::cms::layout::{FreeChunkLayout, MarkWordLayout};
use crate::util::constants::{FREE_CHUNK_FREE_BIT, FREE_CHUNK_PREV_FLAG_MASK};
use crate::util::error::{InspectError, Result};
use crate::util::Address;
use crate::vm::MemoryAccess;

/// Where a free chunk carries its "I am free" tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeaderMode {
    /// In the low bit of the `prev` link, which overlaps an object's klass word.
    Wide,
    /// In the mark word, together with the chunk size. Used with compressed class pointers,
    /// where the klass slot is too narrow to hold a link.
    Narrow,
}

/// A block decoded as a free chunk, or not.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FreeChunkView {
    Free {
        size_words: usize,
        next: Address,
        /// With the flag bits cleared.
        prev: Address,
    },
    NotFree,
}

impl FreeChunkView {
    pub fn is_free(&self) -> bool {
        matches!(self, FreeChunkView::Free { .. })
    }

    pub fn size_words(&self) -> Option<usize> {
        match self {
            FreeChunkView::Free { size_words, .. } => Some(*size_words),
            FreeChunkView::NotFree => None,
        }
    }
}

/// Decides whether the block at an address is a free chunk.
///
/// Nothing is cached: every query reads the block again.
pub struct FreeChunkDetector<'a, M: MemoryAccess> {
    memory: &'a M,
    chunk: FreeChunkLayout,
    mark_word: MarkWordLayout,
    mode: HeaderMode,
}

impl<'a, M: MemoryAccess> FreeChunkDetector<'a, M> {
    pub fn new(
        memory: &'a M,
        chunk: FreeChunkLayout,
        mark_word: MarkWordLayout,
        mode: HeaderMode,
    ) -> Self {
        FreeChunkDetector {
            memory,
            chunk,
            mark_word,
            mode,
        }
    }

    pub fn header_mode(&self) -> HeaderMode {
        self.mode
    }

    /// Check the free tag only. A tagged block with a bad size still reports true.
    pub fn indicates_free_chunk(&self, addr: Address) -> Result<bool> {
        match self.mode {
            HeaderMode::Wide => {
                let prev = self.memory.read_word(addr + self.chunk.prev_offset)?;
                Ok(prev & FREE_CHUNK_FREE_BIT != 0)
            }
            HeaderMode::Narrow => {
                let mark = self.memory.read_word(addr + self.chunk.size_offset)?;
                Ok(self.is_cms_free_mark(mark))
            }
        }
    }

    /// Decode the block at `addr`.
    pub fn classify(&self, addr: Address) -> Result<FreeChunkView> {
        if !self.indicates_free_chunk(addr)? {
            return Ok(FreeChunkView::NotFree);
        }

        let size_words = match self.mode {
            HeaderMode::Wide => self.memory.read_word(addr + self.chunk.size_offset)?,
            HeaderMode::Narrow => {
                self.memory.read_word(addr + self.chunk.size_offset)? >> self.mark_word.cms_size_shift
            }
        };
        if size_words == 0 {
            return Err(InspectError::CorruptFreeChunk {
                addr,
                size: size_words,
            });
        }

        let prev = self.memory.read_word(addr + self.chunk.prev_offset)? & !FREE_CHUNK_PREV_FLAG_MASK;
        let next = self.memory.read_address(addr + self.chunk.next_offset)?;
        Ok(FreeChunkView::Free {
            size_words,
            next,
            prev: Address::from_usize(prev),
        })
    }

    fn is_cms_free_mark(&self, mark: usize) -> bool {
        let layout = &self.mark_word;
        let unlocked = mark & layout.lock_mask == layout.unlocked_value;
        unlocked && (mark >> layout.cms_free_shift) & 1 == 1
    }
}
