use crate::policy::cms::layout::SpaceLayout;
use crate::policy::cms::live_regions::{LiveRegionScan, LiveRegionScanner};
use crate::util::constants::{INDEX_SET_SIZE, MAX_DICTIONARY_DEPTH, SMALL_FOR_LINEAR_ALLOC};
use crate::util::error::{InspectError, Result};
use crate::util::heap_range::HeapRange;
use crate::util::Address;
use crate::vm::{MemoryAccess, ObjectModel};

/// The small linear allocation block of a space. Small requests are carved from it by bumping
/// `ptr`; its remaining `word_size` words are free.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinearAllocBlock {
    pub ptr: Address,
    pub word_size: usize,
}

/// Byte totals of a space.
///
/// `used` is `capacity - free`. When the live regions were scanned as well, `used_by_regions`
/// holds their sum. The two are not reconciled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpaceAccounting {
    pub capacity: usize,
    pub used: usize,
    pub free: usize,
    pub used_by_regions: Option<usize>,
}

impl SpaceAccounting {
    /// The difference between the two used-bytes estimates, if both are known.
    pub fn discrepancy(&self) -> Option<usize> {
        self.used_by_regions
            .map(|by_regions| by_regions.abs_diff(self.used))
    }
}

/// Computes free and used space from the free-list structures of a compactible free-list space:
/// the indexed free lists for small chunks, the binary tree dictionary for large chunks, and the
/// small linear allocation block.
pub struct SpaceAccountant<'a, M: MemoryAccess> {
    memory: &'a M,
    /// The space structure (not its heap range).
    space: Address,
    layout: &'a SpaceLayout,
    range: HeapRange,
    discrepancy_warn_bytes: usize,
}

impl<'a, M: MemoryAccess> SpaceAccountant<'a, M> {
    pub fn new(
        memory: &'a M,
        space: Address,
        layout: &'a SpaceLayout,
        range: HeapRange,
        discrepancy_warn_bytes: usize,
    ) -> Self {
        SpaceAccountant {
            memory,
            space,
            layout,
            range,
            discrepancy_warn_bytes,
        }
    }

    pub fn capacity(&self) -> usize {
        self.range.byte_size()
    }

    /// Free bytes in the indexed lists, the dictionary and the linear allocation block.
    pub fn free_bytes(&self) -> Result<usize> {
        let mut words = 0usize;
        self.for_each_indexed_list(|size, list| {
            let count = self.list_count(list)?;
            words = words.saturating_add(size.saturating_mul(count));
            Ok(())
        })?;
        if let Some(dictionary) = self.dictionary()? {
            words = words.saturating_add(
                self.memory
                    .read_word(dictionary + self.layout.dictionary.total_size_offset)?,
            );
        }
        words = words.saturating_add(self.linear_alloc_block()?.word_size);
        Ok(words.saturating_mul(self.memory.heap_word_size()))
    }

    /// `capacity - free`. A free total above the capacity means the structures changed while we
    /// read them; the result is then clamped at zero.
    pub fn used_bytes(&self) -> Result<usize> {
        let free = self.free_bytes()?;
        let capacity = self.capacity();
        if free > capacity {
            warn!(
                "Free bytes ({}) exceed the capacity ({}) of {}",
                free, capacity, self.range
            );
        }
        Ok(capacity.saturating_sub(free))
    }

    /// Scan the live regions of the space. The sum is `LiveRegionScan::live_bytes`.
    pub fn used_bytes_by_regions<O: ObjectModel>(
        &self,
        scanner: &LiveRegionScanner<'_, M, O>,
    ) -> LiveRegionScan {
        scanner.scan(self.range)
    }

    pub fn accounting(&self) -> Result<SpaceAccounting> {
        let capacity = self.capacity();
        let free = self.free_bytes()?;
        if free > capacity {
            warn!(
                "Free bytes ({}) exceed the capacity ({}) of {}",
                free, capacity, self.range
            );
        }
        Ok(SpaceAccounting {
            capacity,
            used: capacity.saturating_sub(free),
            free,
            used_by_regions: None,
        })
    }

    /// Like [`Self::accounting`], but also scan the live regions and report their sum.
    pub fn accounting_with_regions<O: ObjectModel>(
        &self,
        scanner: &LiveRegionScanner<'_, M, O>,
    ) -> Result<(SpaceAccounting, LiveRegionScan)> {
        let mut accounting = self.accounting()?;
        let scan = self.used_bytes_by_regions(scanner);
        accounting.used_by_regions = Some(scan.live_bytes());
        if let Some(diff) = accounting.discrepancy() {
            if diff > self.discrepancy_warn_bytes {
                warn!(
                    "Used bytes of {} disagree by {}: {} from free lists, {} from live regions ({:?})",
                    self.range,
                    diff,
                    accounting.used,
                    scan.live_bytes(),
                    scan.outcome
                );
            }
        }
        Ok((accounting, scan))
    }

    /// The number of free chunks, counting a non-empty linear allocation block as one.
    pub fn total_free_chunk_count(&self) -> Result<usize> {
        let mut count = 0usize;
        self.for_each_indexed_list(|_, list| {
            count = count.saturating_add(self.list_count(list)?);
            Ok(())
        })?;
        if let Some(dictionary) = self.dictionary()? {
            count = count.saturating_add(
                self.memory
                    .read_word(dictionary + self.layout.dictionary.total_free_blocks_offset)?,
            );
        }
        if self.linear_alloc_block()?.word_size != 0 {
            count += 1;
        }
        Ok(count)
    }

    /// The largest request (in heap words) the space could satisfy without expanding.
    pub fn max_alloc_in_words(&self) -> Result<usize> {
        let mut res = self.dictionary_max_chunk_words()?;
        res = res.max(
            self.linear_alloc_block()?
                .word_size
                .min(SMALL_FOR_LINEAR_ALLOC - 1),
        );

        let stride = self.index_set_stride();
        let mut size = INDEX_SET_SIZE - 1;
        while size >= res + stride {
            let head = self
                .memory
                .read_address(self.indexed_list(size) + self.layout.free_lists.head_offset)?;
            if !head.is_zero() {
                return Ok(size);
            }
            size -= stride;
        }
        Ok(res)
    }

    pub fn linear_alloc_block(&self) -> Result<LinearAllocBlock> {
        let block = self.space + self.layout.lin_ab_offset;
        Ok(LinearAllocBlock {
            ptr: self
                .memory
                .read_address(block + self.layout.lin_ab.ptr_offset)?,
            word_size: self
                .memory
                .read_word(block + self.layout.lin_ab.word_size_offset)?,
        })
    }

    /// Only lists whose size is a multiple of the object alignment (in words) are ever used.
    fn index_set_stride(&self) -> usize {
        (self.memory.min_object_alignment_bytes() / self.memory.heap_word_size()).max(1)
    }

    fn indexed_list(&self, size: usize) -> Address {
        let lists = &self.layout.free_lists;
        self.space + lists.indexed_free_list_offset + size * lists.free_list_stride
    }

    fn list_count(&self, list: Address) -> Result<usize> {
        self.memory
            .read_word(list + self.layout.free_lists.count_offset)
    }

    fn for_each_indexed_list<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(usize, Address) -> Result<()>,
    {
        let stride = self.index_set_stride();
        for size in (stride..INDEX_SET_SIZE).step_by(stride) {
            f(size, self.indexed_list(size))?;
        }
        Ok(())
    }

    fn dictionary(&self) -> Result<Option<Address>> {
        let dictionary = self
            .memory
            .read_address(self.space + self.layout.dictionary_offset)?;
        Ok((!dictionary.is_zero()).then_some(dictionary))
    }

    /// The size of the largest chunk in the dictionary: the rightmost node of the tree.
    fn dictionary_max_chunk_words(&self) -> Result<usize> {
        let Some(dictionary) = self.dictionary()? else {
            return Ok(0);
        };
        let layout = &self.layout.dictionary;
        let mut node = self.memory.read_address(dictionary + layout.root_offset)?;
        if node.is_zero() {
            return Ok(0);
        }
        for _ in 0..MAX_DICTIONARY_DEPTH {
            let right = self
                .memory
                .read_address(node + layout.tree_list_right_offset)?;
            if right.is_zero() {
                return self.memory.read_word(node + layout.tree_list_size_offset);
            }
            node = right;
        }
        Err(InspectError::CorruptDictionary { addr: dictionary })
    }
}
