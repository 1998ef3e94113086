#![allow(dead_code)]

use cms_inspect::policy::cms::layout::{
    CollectorLayout, DictionaryLayout, FreeChunkLayout, FreeListLayout, GenerationLayout,
    HeapLayout, LinearAllocBlockLayout, MarkWordLayout, SpaceLayout,
};
use cms_inspect::policy::cms::{CompactibleFreeListSpace, TypeLayout};
use cms_inspect::vm::{KlassWordObjectModel, MemoryAccess, SnapshotMemory};
use cms_inspect::{Address, HeapRange, MarkBitmap, Options};

pub const IMAGE_BASE: Address = Address::from_usize(0x10_0000);
pub const SPACE: Address = IMAGE_BASE;
pub const COLLECTOR: Address = Address::from_usize(0x10_3000);
pub const DICTIONARY: Address = Address::from_usize(0x10_3800);
pub const HEAP_BASE: Address = Address::from_usize(0x10_4000);

/// Klass words encode the instance size: `KLASS_BASE + (bytes << 4)`.
pub const KLASS_BASE: usize = 0x0e00_0000;

pub fn klass_for(bytes: usize) -> usize {
    KLASS_BASE + (bytes << 4)
}

pub type SyntheticModel = KlassWordObjectModel<fn(Address, Address) -> Option<usize>>;

fn size_from_klass(klass: Address, _object: Address) -> Option<usize> {
    klass
        .as_usize()
        .checked_sub(KLASS_BASE)
        .map(|bits| bits >> 4)
}

/// A layout where every structure is laid out one word per field.
pub fn layout(address_size: usize) -> TypeLayout {
    let w = address_size;
    TypeLayout {
        address_size,
        free_chunk: FreeChunkLayout::hotspot(address_size),
        mark_word: MarkWordLayout::default(),
        space: SpaceLayout {
            bottom_offset: 0,
            end_offset: w,
            collector_offset: 2 * w,
            dictionary_offset: 3 * w,
            lin_ab_offset: 4 * w,
            lin_ab: LinearAllocBlockLayout {
                ptr_offset: 0,
                word_size_offset: w,
            },
            free_lists: FreeListLayout {
                indexed_free_list_offset: 6 * w,
                free_list_stride: 4 * w,
                head_offset: w,
                count_offset: 3 * w,
            },
            dictionary: DictionaryLayout {
                total_size_offset: 0,
                total_free_blocks_offset: w,
                root_offset: 2 * w,
                tree_list_size_offset: 0,
                tree_list_right_offset: 6 * w,
            },
        },
        collector: CollectorLayout {
            mark_bit_map_offset: 0,
            bm_start_word_offset: 0,
            bm_word_size_offset: w,
            shifter_offset: 2 * w,
            virtual_space_low_offset: 3 * w,
        },
        heap: HeapLayout {
            kind_tag_offset: 0,
            gen_collected_tag: 0x100,
            parallel_scavenge_tag: 0x200,
            old_gen_offset: w,
        },
        generation: GenerationLayout {
            kind_tag_offset: 0,
            concurrent_mark_sweep_tag: 0x300,
            cms_space_offset: w,
        },
    }
}

/// An image holding a compactible free-list space, its collector, and a heap of `heap_words`
/// followed by its mark bitmap.
pub struct SyntheticHeap {
    pub memory: SnapshotMemory,
    pub layout: TypeLayout,
    pub heap: HeapRange,
    pub bitmap: MarkBitmap,
}

impl SyntheticHeap {
    pub fn new(address_size: usize, min_object_alignment: usize, heap_words: usize) -> Self {
        let w = address_size;
        let layout = layout(address_size);
        let heap = HeapRange::with_size(HEAP_BASE, heap_words * w).unwrap();
        let map_base = heap.end().align_up(64);
        let map_bytes = (heap_words / 8).next_multiple_of(w) + w;
        let image_bytes = (map_base + map_bytes) - IMAGE_BASE;

        let mut memory = SnapshotMemory::zeroed(IMAGE_BASE, image_bytes, address_size)
            .unwrap()
            .with_min_object_alignment(min_object_alignment)
            .unwrap();

        let space = &layout.space;
        memory
            .write_word(SPACE + space.bottom_offset, heap.start().as_usize())
            .unwrap();
        memory
            .write_word(SPACE + space.end_offset, heap.end().as_usize())
            .unwrap();
        memory
            .write_word(SPACE + space.collector_offset, COLLECTOR.as_usize())
            .unwrap();

        let c = &layout.collector;
        let bm = COLLECTOR + c.mark_bit_map_offset;
        memory
            .write_word(bm + c.bm_start_word_offset, heap.start().as_usize())
            .unwrap();
        memory
            .write_word(bm + c.bm_word_size_offset, heap_words)
            .unwrap();
        memory
            .write_word(bm + c.virtual_space_low_offset, map_base.as_usize())
            .unwrap();

        let bitmap = MarkBitmap::new(heap.start(), heap_words, 0, map_base, address_size).unwrap();
        SyntheticHeap {
            memory,
            layout,
            heap,
            bitmap,
        }
    }

    pub fn with_compressed_headers(mut self) -> Self {
        self.memory = self.memory.with_compressed_headers(true);
        self
    }

    pub fn word(&self) -> usize {
        self.layout.address_size
    }

    /// The heap address `words` words from the bottom.
    pub fn at(&self, words: usize) -> Address {
        self.heap.start() + words * self.word()
    }

    /// A parsable object: neutral mark word and a klass encoding its size.
    pub fn put_object(&mut self, addr: Address, bytes: usize) {
        let w = self.word();
        self.memory.write_word(addr, 0b001).unwrap();
        self.memory.write_word(addr + w, klass_for(bytes)).unwrap();
    }

    /// An object whose klass is not installed yet, with Printezis marks for `bytes`.
    pub fn put_printezis_object(&mut self, addr: Address, bytes: usize) {
        let w = self.word();
        self.memory.write_word(addr, 0b001).unwrap();
        self.memory.write_word(addr + w, 0).unwrap();
        self.mark(addr);
        self.mark(addr + w);
        self.mark(addr + bytes - w);
    }

    pub fn put_free(&mut self, addr: Address, words: usize) {
        let w = self.word();
        if self.memory.is_compressed_header_mode() {
            self.memory
                .write_word(addr, (words << 8) | (1 << 7) | 0b001)
                .unwrap();
            self.memory.write_word(addr + w, 0).unwrap();
        } else {
            self.memory.write_word(addr, words).unwrap();
            self.memory.write_word(addr + w, 0x1).unwrap();
        }
        self.memory.write_word(addr + 2 * w, 0).unwrap();
    }

    pub fn mark(&mut self, addr: Address) {
        let (word_addr, bit) = self.bitmap.mark_word_location(addr).unwrap();
        let word = self.memory.read_word(word_addr).unwrap();
        self.memory.write_word(word_addr, word | (1 << bit)).unwrap();
    }

    pub fn set_list_count(&mut self, size: usize, count: usize) {
        let lists = self.layout.space.free_lists;
        let list = SPACE + lists.indexed_free_list_offset + size * lists.free_list_stride;
        self.memory
            .write_word(list + lists.count_offset, count)
            .unwrap();
        let head = if count == 0 { 0 } else { HEAP_BASE.as_usize() };
        self.memory.write_word(list + lists.head_offset, head).unwrap();
    }

    pub fn set_dictionary_total(&mut self, words: usize, blocks: usize) {
        let d = self.layout.space.dictionary;
        self.memory
            .write_word(
                SPACE + self.layout.space.dictionary_offset,
                DICTIONARY.as_usize(),
            )
            .unwrap();
        self.memory
            .write_word(DICTIONARY + d.total_size_offset, words)
            .unwrap();
        self.memory
            .write_word(DICTIONARY + d.total_free_blocks_offset, blocks)
            .unwrap();
    }

    pub fn set_lin_ab(&mut self, ptr: Address, words: usize) {
        let block = SPACE + self.layout.space.lin_ab_offset;
        let lin_ab = self.layout.space.lin_ab;
        self.memory
            .write_word(block + lin_ab.ptr_offset, ptr.as_usize())
            .unwrap();
        self.memory
            .write_word(block + lin_ab.word_size_offset, words)
            .unwrap();
    }

    pub fn space<'a>(&'a self, options: &'a Options) -> CompactibleFreeListSpace<'a, SnapshotMemory> {
        CompactibleFreeListSpace::new(&self.memory, SPACE, &self.layout, options).unwrap()
    }

    pub fn object_model(&self) -> SyntheticModel {
        KlassWordObjectModel::new(self.word(), size_from_klass as fn(Address, Address) -> Option<usize>)
    }
}
