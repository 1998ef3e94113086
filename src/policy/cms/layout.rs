//! Field offsets of the collector data structures in the inspected process.
//!
//! The inspected VM publishes these offsets in its type database. The host
//! looks them up once per session and hands a [`TypeLayout`] to the views in
//! this module; nothing here is global or lazily initialized.
//!
//! All offsets are in bytes from the start of the enclosing structure.

use crate::util::constants::{BYTES_IN_ADDRESS_32, BYTES_IN_ADDRESS_64};
use crate::util::conversions::bits_in_word;
use crate::util::error::{InspectError, Result};

/// Layout of a free chunk: `{ size, prev, next }`, one word each.
///
/// The `prev` slot overlaps the klass word of an object. Its low bit tags the chunk as free when
/// object headers are wide.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FreeChunkLayout {
    pub size_offset: usize,
    pub prev_offset: usize,
    pub next_offset: usize,
    /// `sizeof(FreeChunk)`
    pub header_bytes: usize,
}

impl FreeChunkLayout {
    /// The free chunk layout of a HotSpot VM whose pointers are `address_size` bytes.
    pub const fn hotspot(address_size: usize) -> Self {
        FreeChunkLayout {
            size_offset: 0,
            prev_offset: address_size,
            next_offset: 2 * address_size,
            header_bytes: 3 * address_size,
        }
    }
}

/// Bit fields of the mark word that matter for free chunks in narrow header mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MarkWordLayout {
    /// Mask of the lock and biased-lock bits.
    pub lock_mask: usize,
    /// The value of the masked bits in an unlocked (neutral) mark word.
    pub unlocked_value: usize,
    /// Position of the CMS free-chunk bit.
    pub cms_free_shift: usize,
    /// Position of the chunk size (in heap words) in a free chunk's mark word.
    pub cms_size_shift: usize,
}

impl Default for MarkWordLayout {
    fn default() -> Self {
        MarkWordLayout {
            lock_mask: 0b111,
            unlocked_value: 0b001,
            cms_free_shift: 7,
            cms_size_shift: 8,
        }
    }
}

/// Layout of the indexed free lists embedded in a compactible free-list space.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FreeListLayout {
    /// Offset of the first indexed free list (list 0) in the space.
    pub indexed_free_list_offset: usize,
    /// `sizeof` one free list, the distance between consecutive lists.
    pub free_list_stride: usize,
    /// Offset of the list's head chunk pointer.
    pub head_offset: usize,
    /// Offset of the list's chunk count.
    pub count_offset: usize,
}

/// Layout of the binary tree dictionary holding the large free chunks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DictionaryLayout {
    /// Total free words in the dictionary.
    pub total_size_offset: usize,
    /// Number of free chunks in the dictionary.
    pub total_free_blocks_offset: usize,
    /// Pointer to the root tree list.
    pub root_offset: usize,
    /// Chunk size (in words) of a tree list node.
    pub tree_list_size_offset: usize,
    /// Right child of a tree list node.
    pub tree_list_right_offset: usize,
}

/// Layout of the small linear allocation block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinearAllocBlockLayout {
    pub ptr_offset: usize,
    pub word_size_offset: usize,
}

/// Layout of a compactible free-list space.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpaceLayout {
    pub bottom_offset: usize,
    pub end_offset: usize,
    /// Pointer to the owning collector.
    pub collector_offset: usize,
    /// Pointer to the large-block dictionary.
    pub dictionary_offset: usize,
    /// Offset of the embedded small linear allocation block.
    pub lin_ab_offset: usize,
    pub lin_ab: LinearAllocBlockLayout,
    pub free_lists: FreeListLayout,
    pub dictionary: DictionaryLayout,
}

/// Layout of the mark bitmap embedded in the collector.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CollectorLayout {
    /// Offset of the embedded mark bitmap in the collector.
    pub mark_bit_map_offset: usize,
    pub bm_start_word_offset: usize,
    pub bm_word_size_offset: usize,
    /// A 32-bit field.
    pub shifter_offset: usize,
    /// Low address of the bitmap's virtual space.
    pub virtual_space_low_offset: usize,
}

/// How to tell heap kinds apart, and where the old generation hangs off the heap.
///
/// A kind tag is a word read from the structure (typically its vtable pointer) and compared
/// against the tag values the host resolved for each known type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeapLayout {
    pub kind_tag_offset: usize,
    pub gen_collected_tag: usize,
    pub parallel_scavenge_tag: usize,
    /// Pointer to the old generation of a generational heap.
    pub old_gen_offset: usize,
}

/// How to recognize a concurrent mark-sweep generation, and where its space is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GenerationLayout {
    pub kind_tag_offset: usize,
    pub concurrent_mark_sweep_tag: usize,
    /// Pointer to the generation's compactible free-list space.
    pub cms_space_offset: usize,
}

/// Everything the inspector needs to know about the inspected VM's data structures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeLayout {
    pub address_size: usize,
    pub free_chunk: FreeChunkLayout,
    pub mark_word: MarkWordLayout,
    pub space: SpaceLayout,
    pub collector: CollectorLayout,
    pub heap: HeapLayout,
    pub generation: GenerationLayout,
}

impl TypeLayout {
    /// Check the layout for values that cannot be right. This does not (and cannot) check the
    /// offsets against the target.
    pub fn validate(&self) -> Result<()> {
        let word = self.address_size;
        if word != BYTES_IN_ADDRESS_32 && word != BYTES_IN_ADDRESS_64 {
            return Err(InspectError::InvalidLayout("address size must be 4 or 8"));
        }

        let chunk = &self.free_chunk;
        let chunk_slots = [chunk.size_offset, chunk.prev_offset, chunk.next_offset];
        if chunk_slots
            .iter()
            .any(|offset| offset % word != 0 || offset + word > chunk.header_bytes)
        {
            return Err(InspectError::InvalidLayout(
                "free chunk fields must be word aligned and inside the chunk header",
            ));
        }
        if chunk.size_offset == chunk.prev_offset
            || chunk.size_offset == chunk.next_offset
            || chunk.prev_offset == chunk.next_offset
        {
            return Err(InspectError::InvalidLayout("free chunk fields overlap"));
        }

        let bits = bits_in_word(word);
        let mark = &self.mark_word;
        if mark.cms_free_shift >= bits || mark.cms_size_shift >= bits {
            return Err(InspectError::InvalidLayout("mark word shift out of range"));
        }
        if mark.unlocked_value & !mark.lock_mask != 0 {
            return Err(InspectError::InvalidLayout(
                "unlocked mark value has bits outside the lock mask",
            ));
        }

        if self.space.free_lists.free_list_stride == 0 {
            return Err(InspectError::InvalidLayout("free list stride is zero"));
        }
        Ok(())
    }
}
