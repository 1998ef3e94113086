use crate::policy::cms::accounting::{LinearAllocBlock, SpaceAccountant, SpaceAccounting};
use crate::policy::cms::collector::CmsCollector;
use crate::policy::cms::free_chunk::FreeChunkDetector;
use crate::policy::cms::layout::TypeLayout;
use crate::policy::cms::live_regions::{
    BlockSize, LiveRegionScan, LiveRegionScanner, ScanCancellation,
};
use crate::util::error::Result;
use crate::util::heap_range::HeapRange;
use crate::util::metadata::MarkBitmap;
use crate::util::options::Options;
use crate::util::Address;
use crate::vm::{MemoryAccess, ObjectModel};

/// A view of a compactible free-list space, the space of a CMS old generation.
///
/// `bottom` and `end` are read once, when the view is created. Everything else is read on
/// demand.
pub struct CompactibleFreeListSpace<'a, M: MemoryAccess> {
    memory: &'a M,
    addr: Address,
    layout: &'a TypeLayout,
    options: &'a Options,
    range: HeapRange,
}

impl<'a, M: MemoryAccess> CompactibleFreeListSpace<'a, M> {
    pub fn new(
        memory: &'a M,
        addr: Address,
        layout: &'a TypeLayout,
        options: &'a Options,
    ) -> Result<Self> {
        layout.validate()?;
        let bottom = memory.read_address(addr + layout.space.bottom_offset)?;
        let end = memory.read_address(addr + layout.space.end_offset)?;
        let range = HeapRange::new(bottom, end)?;
        debug!("Compactible free-list space at {}: {}", addr, range);
        Ok(CompactibleFreeListSpace {
            memory,
            addr,
            layout,
            options,
            range,
        })
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn bottom(&self) -> Address {
        self.range.start()
    }

    pub fn end(&self) -> Address {
        self.range.end()
    }

    pub fn range(&self) -> HeapRange {
        self.range
    }

    pub fn capacity(&self) -> usize {
        self.range.byte_size()
    }

    pub fn collector(&self) -> Result<CmsCollector<'a, M>> {
        let collector = self
            .memory
            .read_address(self.addr + self.layout.space.collector_offset)?;
        Ok(CmsCollector::new(
            self.memory,
            collector,
            &self.layout.collector,
        ))
    }

    pub fn mark_bitmap(&self) -> Result<MarkBitmap> {
        self.collector()?.mark_bitmap()
    }

    pub fn accountant(&self) -> SpaceAccountant<'a, M> {
        SpaceAccountant::new(
            self.memory,
            self.addr,
            &self.layout.space,
            self.range,
            self.options.discrepancy_warn_bytes,
        )
    }

    /// A scanner over this space, using `bitmap` for Printezis sizes.
    pub fn scanner<'b, O: ObjectModel>(
        &'b self,
        bitmap: &'b MarkBitmap,
        object_model: &'b O,
    ) -> Result<LiveRegionScanner<'b, M, O>> {
        LiveRegionScanner::new(
            self.memory,
            object_model,
            bitmap,
            self.layout,
            self.options,
        )
    }

    pub fn free(&self) -> Result<usize> {
        self.accountant().free_bytes()
    }

    pub fn used(&self) -> Result<usize> {
        self.accountant().used_bytes()
    }

    /// Used bytes as the sum of the live regions. Slow: walks the whole space.
    pub fn used_by_regions<O: ObjectModel>(&self, object_model: &O) -> Result<LiveRegionScan> {
        self.live_regions(object_model)
    }

    pub fn live_regions<O: ObjectModel>(&self, object_model: &O) -> Result<LiveRegionScan> {
        let bitmap = self.mark_bitmap()?;
        Ok(self.scanner(&bitmap, object_model)?.scan(self.range))
    }

    pub fn live_regions_with_cancel<O: ObjectModel, C: ScanCancellation + ?Sized>(
        &self,
        object_model: &O,
        cancel: &C,
    ) -> Result<LiveRegionScan> {
        let bitmap = self.mark_bitmap()?;
        Ok(self
            .scanner(&bitmap, object_model)?
            .scan_with_cancel(self.range, cancel))
    }

    pub fn accounting(&self) -> Result<SpaceAccounting> {
        self.accountant().accounting()
    }

    /// Accounting from the free lists, checked against a scan of the live regions.
    pub fn accounting_with_regions<O: ObjectModel>(
        &self,
        object_model: &O,
    ) -> Result<(SpaceAccounting, LiveRegionScan)> {
        let bitmap = self.mark_bitmap()?;
        let scanner = self.scanner(&bitmap, object_model)?;
        self.accountant().accounting_with_regions(&scanner)
    }

    pub fn total_free_chunk_count(&self) -> Result<usize> {
        self.accountant().total_free_chunk_count()
    }

    pub fn max_alloc_in_words(&self) -> Result<usize> {
        self.accountant().max_alloc_in_words()
    }

    pub fn linear_alloc_block(&self) -> Result<LinearAllocBlock> {
        self.accountant().linear_alloc_block()
    }

    /// Is the block at `addr` tagged as a free chunk?
    pub fn is_free_block(&self, addr: Address) -> Result<bool> {
        let mode = self
            .options
            .header_mode
            .resolve(self.memory.is_compressed_header_mode());
        FreeChunkDetector::new(
            self.memory,
            self.layout.free_chunk,
            self.layout.mark_word,
            mode,
        )
        .indicates_free_chunk(addr)
    }

    pub fn block_size<O: ObjectModel>(&self, addr: Address, object_model: &O) -> Result<BlockSize> {
        let bitmap = self.mark_bitmap()?;
        self.scanner(&bitmap, object_model)?.block_size(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::cms::layout::tests::synthetic;
    use crate::util::error::InspectError;
    use crate::vm::{KlassWordObjectModel, SnapshotMemory};

    const WORD: usize = 8;
    const SPACE: Address = Address::from_usize(0x1_0000);
    const COLLECTOR: Address = Address::from_usize(0x1_8000);
    const BOTTOM: Address = Address::from_usize(0x2_0000);
    const MAP: Address = Address::from_usize(0x3_0000);
    const IMAGE_BYTES: usize = 0x2_1000;
    const KLASS: usize = 0x7f00_0000;

    fn image(layout: &TypeLayout, heap_words: usize) -> SnapshotMemory {
        let mut memory = SnapshotMemory::zeroed(SPACE, IMAGE_BYTES, WORD).unwrap();
        let space = &layout.space;
        memory
            .write_word(SPACE + space.bottom_offset, BOTTOM.as_usize())
            .unwrap();
        memory
            .write_word(SPACE + space.end_offset, (BOTTOM + heap_words * WORD).as_usize())
            .unwrap();
        memory
            .write_word(SPACE + space.collector_offset, COLLECTOR.as_usize())
            .unwrap();

        let c = &layout.collector;
        let bm = COLLECTOR + c.mark_bit_map_offset;
        memory
            .write_word(bm + c.bm_start_word_offset, BOTTOM.as_usize())
            .unwrap();
        memory
            .write_word(bm + c.bm_word_size_offset, heap_words)
            .unwrap();
        memory
            .write_word(bm + c.virtual_space_low_offset, MAP.as_usize())
            .unwrap();
        memory
    }

    #[test]
    fn space_bounds_and_bitmap() {
        let layout = synthetic(WORD);
        let options = Options::default();
        let memory = image(&layout, 64);
        let space = CompactibleFreeListSpace::new(&memory, SPACE, &layout, &options).unwrap();

        assert_eq!(space.bottom(), BOTTOM);
        assert_eq!(space.capacity(), 64 * WORD);
        let bitmap = space.mark_bitmap().unwrap();
        assert_eq!(bitmap.covered_range(), space.range());
        assert_eq!(bitmap.map_base(), MAP);
    }

    #[test]
    fn walk_and_account() {
        let layout = synthetic(WORD);
        let options = Options::default();
        let mut memory = image(&layout, 64);
        // [obj 4w][free 60w], with the free chunk in the linear allocation block
        memory.write_word(BOTTOM + WORD, KLASS).unwrap();
        memory.write_word(BOTTOM + 4 * WORD, 60).unwrap();
        memory.write_word(BOTTOM + 5 * WORD, 0x1).unwrap();
        let lin_ab = SPACE + layout.space.lin_ab_offset;
        memory
            .write_word(lin_ab + layout.space.lin_ab.ptr_offset, (BOTTOM + 4 * WORD).as_usize())
            .unwrap();
        memory
            .write_word(lin_ab + layout.space.lin_ab.word_size_offset, 60)
            .unwrap();

        let space = CompactibleFreeListSpace::new(&memory, SPACE, &layout, &options).unwrap();
        let model = KlassWordObjectModel::new(WORD, |_, _| Some(4 * WORD));

        assert!(space.is_free_block(BOTTOM + 4 * WORD).unwrap());
        assert!(!space.is_free_block(BOTTOM).unwrap());
        assert_eq!(
            space.block_size(BOTTOM, &model).unwrap(),
            BlockSize::Object(4 * WORD)
        );
        assert_eq!(space.free().unwrap(), 60 * WORD);
        assert_eq!(space.used().unwrap(), 4 * WORD);
        assert_eq!(space.total_free_chunk_count().unwrap(), 1);

        let (accounting, scan) = space.accounting_with_regions(&model).unwrap();
        assert!(scan.is_complete());
        assert_eq!(scan.regions, vec![HeapRange::with_size(BOTTOM, 4 * WORD).unwrap()]);
        assert_eq!(accounting.used_by_regions, Some(4 * WORD));
        assert_eq!(accounting.discrepancy(), Some(0));
        assert_eq!(
            space.used_by_regions(&model).unwrap().live_bytes(),
            accounting.used
        );
    }

    #[test]
    fn inverted_bounds() {
        let layout = synthetic(WORD);
        let options = Options::default();
        let mut memory = image(&layout, 64);
        memory
            .write_word(SPACE + layout.space.end_offset, 0x1000)
            .unwrap();
        assert!(matches!(
            CompactibleFreeListSpace::new(&memory, SPACE, &layout, &options),
            Err(InspectError::InvalidRange { .. })
        ));
    }
}
