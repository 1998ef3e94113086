//! Finding the CMS space from the heap.
//!
//! The inspected VM's heap and generation objects are polymorphic. Their
//! kind is decided once, by reading a type tag, instead of matching on the
//! dynamic type every time.

use crate::policy::cms::layout::{GenerationLayout, HeapLayout, TypeLayout};
use crate::policy::cms::space::CompactibleFreeListSpace;
use crate::util::error::Result;
use crate::util::options::Options;
use crate::util::Address;
use crate::vm::MemoryAccess;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeapKind {
    /// A generational heap. Its old generation may be concurrent mark-sweep.
    GenCollected,
    ParallelScavenge,
    /// Any other heap, with the tag we read.
    Other(usize),
}

impl HeapKind {
    pub fn resolve<M: MemoryAccess>(memory: &M, heap: Address, layout: &HeapLayout) -> Result<Self> {
        let tag = memory.read_word(heap + layout.kind_tag_offset)?;
        Ok(if tag == layout.gen_collected_tag {
            HeapKind::GenCollected
        } else if tag == layout.parallel_scavenge_tag {
            HeapKind::ParallelScavenge
        } else {
            HeapKind::Other(tag)
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GenerationKind {
    ConcurrentMarkSweep,
    Other(usize),
}

impl GenerationKind {
    pub fn resolve<M: MemoryAccess>(
        memory: &M,
        generation: Address,
        layout: &GenerationLayout,
    ) -> Result<Self> {
        let tag = memory.read_word(generation + layout.kind_tag_offset)?;
        Ok(if tag == layout.concurrent_mark_sweep_tag {
            GenerationKind::ConcurrentMarkSweep
        } else {
            GenerationKind::Other(tag)
        })
    }
}

/// A concurrent mark-sweep generation of the inspected heap.
pub struct ConcurrentMarkSweepGeneration<'a, M: MemoryAccess> {
    memory: &'a M,
    addr: Address,
    layout: &'a TypeLayout,
}

impl<'a, M: MemoryAccess> ConcurrentMarkSweepGeneration<'a, M> {
    /// The generation at `addr`, or `None` if it is of another kind.
    pub fn resolve(memory: &'a M, addr: Address, layout: &'a TypeLayout) -> Result<Option<Self>> {
        Ok(
            match GenerationKind::resolve(memory, addr, &layout.generation)? {
                GenerationKind::ConcurrentMarkSweep => Some(ConcurrentMarkSweepGeneration {
                    memory,
                    addr,
                    layout,
                }),
                GenerationKind::Other(tag) => {
                    debug!("Generation at {} has tag {:#x}, not CMS", addr, tag);
                    None
                }
            },
        )
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn cms_space(&self, options: &'a Options) -> Result<CompactibleFreeListSpace<'a, M>> {
        let space = self
            .memory
            .read_address(self.addr + self.layout.generation.cms_space_offset)?;
        CompactibleFreeListSpace::new(self.memory, space, self.layout, options)
    }
}

/// Locate the CMS space of the heap at `heap`. Returns `None` unless the heap is generational
/// with a concurrent mark-sweep old generation.
pub fn find_cms_space<'a, M: MemoryAccess>(
    memory: &'a M,
    heap: Address,
    layout: &'a TypeLayout,
    options: &'a Options,
) -> Result<Option<CompactibleFreeListSpace<'a, M>>> {
    match HeapKind::resolve(memory, heap, &layout.heap)? {
        HeapKind::GenCollected => {}
        kind => {
            debug!("Heap at {} is {:?}, no CMS space", heap, kind);
            return Ok(None);
        }
    }
    let old_gen = memory.read_address(heap + layout.heap.old_gen_offset)?;
    match ConcurrentMarkSweepGeneration::resolve(memory, old_gen, layout)? {
        Some(generation) => generation.cms_space(options).map(Some),
        None => Ok(None),
    }
}
