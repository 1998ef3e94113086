use crate::policy::cms::layout::CollectorLayout;
use crate::util::error::Result;
use crate::util::metadata::MarkBitmap;
use crate::util::Address;
use crate::vm::MemoryAccess;

/// A view of the CMS collector structure of the inspected process.
pub struct CmsCollector<'a, M: MemoryAccess> {
    memory: &'a M,
    addr: Address,
    layout: &'a CollectorLayout,
}

impl<'a, M: MemoryAccess> CmsCollector<'a, M> {
    pub fn new(memory: &'a M, addr: Address, layout: &'a CollectorLayout) -> Self {
        CmsCollector {
            memory,
            addr,
            layout,
        }
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    /// Read the descriptor of the collector's mark bitmap.
    pub fn mark_bitmap(&self) -> Result<MarkBitmap> {
        let bm = self.addr + self.layout.mark_bit_map_offset;
        let bm_start_word = self
            .memory
            .read_address(bm + self.layout.bm_start_word_offset)?;
        let bm_word_size = self.memory.read_word(bm + self.layout.bm_word_size_offset)?;
        let shifter = self.memory.read_u32(bm + self.layout.shifter_offset)? as usize;
        let map_base = self
            .memory
            .read_address(bm + self.layout.virtual_space_low_offset)?;
        debug!(
            "Mark bitmap of {}: {} words from {}, shifter {}, map at {}",
            self.addr, bm_word_size, bm_start_word, shifter, map_base
        );
        MarkBitmap::new(
            bm_start_word,
            bm_word_size,
            shifter,
            map_base,
            self.memory.address_size(),
        )
    }
}
