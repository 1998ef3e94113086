use crate::util::constants::{BYTES_IN_ADDRESS_32, BYTES_IN_ADDRESS_64};
use crate::util::conversions::bits_in_word;
use crate::util::error::{InspectError, Result};
use crate::util::heap_range::HeapRange;
use crate::util::metadata::ranges::{break_bit_range, BitWordRange};
use crate::util::Address;
use crate::vm::MemoryAccess;

/// The result of searching the bitmap for the next mark.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NextMark {
    /// The heap address of the first marked granule at or after the search start.
    Found(Address),
    /// No mark before the end of the bitmap. `limit` is the address one granule past the last
    /// examined bit, i.e. the end of the covered range.
    NotFound { limit: Address },
}

/// A read-only view of the CMS mark bitmap of the inspected process.
///
/// One bit covers `1 << shifter` heap words, starting from `bm_start_word` for bit 0. The bits
/// live in a separately reserved virtual space whose low address is `map_base`. Bit `i` is bit
/// `i % W` of the `i / W`-th bitmap word, where `W` is the number of bits in a target word.
///
/// Every query must fall in the covered heap range; anything else is an `OutOfRangeQuery`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkBitmap {
    bm_start_word: Address,
    /// Covered heap size, in heap words.
    bm_word_size: usize,
    covered: HeapRange,
    shifter: usize,
    map_base: Address,
    address_size: usize,
}

impl MarkBitmap {
    pub fn new(
        bm_start_word: Address,
        bm_word_size: usize,
        shifter: usize,
        map_base: Address,
        address_size: usize,
    ) -> Result<Self> {
        if address_size != BYTES_IN_ADDRESS_32 && address_size != BYTES_IN_ADDRESS_64 {
            return Err(InspectError::InvalidLayout("address size must be 4 or 8"));
        }
        if shifter >= bits_in_word(address_size) {
            return Err(InspectError::InvalidLayout("bitmap shifter is too large"));
        }
        if !bm_start_word.is_aligned_to(address_size) || !map_base.is_aligned_to(address_size) {
            return Err(InspectError::InvalidLayout(
                "bitmap start and backing store must be word aligned",
            ));
        }
        if bm_word_size & ((1 << shifter) - 1) != 0 {
            return Err(InspectError::InvalidLayout(
                "bitmap word size must be a multiple of its granule",
            ));
        }
        let covered_bytes = bm_word_size
            .checked_mul(address_size)
            .ok_or(InspectError::InvalidLayout("bitmap covers too much"))?;
        let covered = HeapRange::with_size(bm_start_word, covered_bytes)?;
        Ok(MarkBitmap {
            bm_start_word,
            bm_word_size,
            covered,
            shifter,
            map_base,
            address_size,
        })
    }

    /// The heap word that bit 0 maps to.
    pub fn start(&self) -> Address {
        self.bm_start_word
    }

    pub fn shifter(&self) -> usize {
        self.shifter
    }

    /// The low address of the bitmap's backing store.
    pub fn map_base(&self) -> Address {
        self.map_base
    }

    pub fn address_size(&self) -> usize {
        self.address_size
    }

    /// The heap range covered by this bitmap.
    pub fn covered_range(&self) -> HeapRange {
        self.covered
    }

    /// The number of bits in the map.
    pub fn bits_in_map(&self) -> usize {
        self.bm_word_size >> self.shifter
    }

    /// Bytes of heap covered by one bit.
    pub fn granule_bytes(&self) -> usize {
        self.address_size << self.shifter
    }

    /// Translate a heap address into a bit index.
    pub fn address_to_index(&self, addr: Address) -> Result<usize> {
        if !self.covered_range().contains(addr) {
            return Err(self.out_of_range(addr));
        }
        Ok(self.raw_index(addr))
    }

    /// Translate a bit index back into the heap address of the granule it covers.
    pub fn index_to_address(&self, index: usize) -> Address {
        self.bm_start_word + ((index << self.shifter) * self.address_size)
    }

    /// The bitmap word holding the bit for `addr`, and the bit's position in that word.
    pub fn mark_word_location(&self, addr: Address) -> Result<(Address, usize)> {
        self.address_to_index(addr)
            .map(|index| self.bit_location(index))
    }

    /// Is the granule containing `addr` marked?
    pub fn is_marked<M: MemoryAccess>(&self, memory: &M, addr: Address) -> Result<bool> {
        let (word_addr, bit) = self.mark_word_location(addr)?;
        let word = memory.read_word(word_addr)?;
        Ok((word >> bit) & 1 == 1)
    }

    /// Find the first marked granule at or after `addr`, before the end of the bitmap.
    /// `addr` may be the end of the covered range, in which case nothing is found.
    pub fn next_marked_word_after<M: MemoryAccess>(
        &self,
        memory: &M,
        addr: Address,
    ) -> Result<NextMark> {
        let lo = self.limit_index(addr)?;
        let hi = self.bits_in_map();
        let mut found = None;
        self.scan_bits(memory, lo, hi, |base_index, bits| {
            if bits != 0 {
                found = Some(base_index + bits.trailing_zeros() as usize);
                true
            } else {
                false
            }
        })?;
        trace!(
            "next_marked_word_after({}) -> {:?} (bits {}..{})",
            addr,
            found,
            lo,
            hi
        );
        Ok(match found {
            Some(index) => NextMark::Found(self.index_to_address(index)),
            None => NextMark::NotFound {
                limit: self.index_to_address(hi),
            },
        })
    }

    /// Count the marked granules whose start lies in `range`.
    pub fn marked_words_in<M: MemoryAccess>(&self, memory: &M, range: HeapRange) -> Result<usize> {
        let lo = self.limit_index(range.start())?;
        let hi = self.limit_index(range.end())?;
        // A granule that starts before `range.end()` counts.
        let hi = if self.index_to_address(hi) < range.end() {
            hi + 1
        } else {
            hi
        };
        let mut count = 0;
        self.scan_bits(memory, lo, hi, |_, bits| {
            count += bits.count_ones() as usize;
            false
        })?;
        Ok(count)
    }

    fn raw_index(&self, addr: Address) -> usize {
        ((addr - self.bm_start_word) / self.address_size) >> self.shifter
    }

    /// Like `address_to_index`, but also accepts the end of the covered range.
    fn limit_index(&self, addr: Address) -> Result<usize> {
        let covered = self.covered_range();
        if addr < covered.start() || addr > covered.end() {
            return Err(self.out_of_range(addr));
        }
        Ok(self.raw_index(addr))
    }

    fn bit_location(&self, index: usize) -> (Address, usize) {
        let word_bits = bits_in_word(self.address_size);
        (
            self.map_base + (index / word_bits) * self.address_size,
            index % word_bits,
        )
    }

    fn out_of_range(&self, addr: Address) -> InspectError {
        let covered = self.covered_range();
        InspectError::OutOfRangeQuery {
            addr,
            start: covered.start(),
            end: covered.end(),
        }
    }

    /// Visit the bitmap words that hold bits `[lo, hi)`. `visit` gets the bit index of bit 0 of
    /// the word, and the word with the bits outside `[lo, hi)` cleared. It returns true to stop.
    fn scan_bits<M, F>(&self, memory: &M, lo: usize, hi: usize, mut visit: F) -> Result<()>
    where
        M: MemoryAccess,
        F: FnMut(usize, usize) -> bool,
    {
        if lo >= hi {
            return Ok(());
        }
        let word_bits = bits_in_word(self.address_size);
        let (start_addr, start_bit) = self.bit_location(lo);
        let (end_addr, end_bit) = self.bit_location(hi);
        let mut error = None;

        break_bit_range(
            start_addr,
            start_bit,
            end_addr,
            end_bit,
            self.address_size,
            &mut |range| {
                let mut visit_word = |word_addr: Address, mask: usize| match memory
                    .read_word(word_addr)
                {
                    Ok(word) => {
                        let base_index = (word_addr - self.map_base) / self.address_size * word_bits;
                        visit(base_index, word & mask)
                    }
                    Err(e) => {
                        error = Some(e);
                        true
                    }
                };
                match range {
                    BitWordRange::Words { start, end } => {
                        let mut cursor = start;
                        while cursor < end {
                            if visit_word(cursor, usize::MAX) {
                                return true;
                            }
                            cursor += self.address_size;
                        }
                        false
                    }
                    BitWordRange::BitsInWord {
                        addr,
                        bit_start,
                        bit_end,
                    } => visit_word(addr, BitWordRange::mask(bit_start, bit_end)),
                }
            },
        );

        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
