//! Data types for visiting bitmap ranges at different granularities

use crate::util::conversions::{bits_in_word, low_bits_mask};
use crate::util::Address;

/// The type for bit offset in a bitmap word.
pub type BitOffset = usize;

/// A range of bitmap words or bits within a word.  It is the unit of visiting a contiguous bit
/// range of a bitmap that lives in the inspected process.
///
/// Bitmap words have the width of a target word, so a bit range generally starts with some bits
/// in the first word, followed by many whole words, and ends with some bits in the last word.
///
/// A range is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitWordRange {
    /// A range of whole words.
    Words {
        /// The address (inclusive) of the first word.
        start: Address,
        /// The address (exclusive) one past the last word.
        end: Address,
    },
    /// A range of bits within a word.
    BitsInWord {
        /// The address of the word.
        addr: Address,
        /// The starting bit index (inclusive), starting with zero from the low-order bit.
        bit_start: BitOffset,
        /// The ending bit index (exclusive), starting with zero from the low-order bit.  This may
        /// be the number of bits in a word, which means the range includes the highest bit.
        bit_end: BitOffset,
    },
}

impl BitWordRange {
    /// The mask selecting the bits of a `BitsInWord` range.
    pub fn mask(bit_start: BitOffset, bit_end: BitOffset) -> usize {
        low_bits_mask(bit_end) & !low_bits_mask(bit_start)
    }
}

/// Break a bit range into sub-ranges of whole words and in-word bits, and visit them from the low
/// address to the high address.
///
/// The bit range starts at the bit at index `start_bit` in the word at address `start_addr`, and
/// ends at (but does not include) the bit at index `end_bit` in the word at address `end_addr`.
/// `word_bytes` is the width of a bitmap word of the target.
///
/// `visitor` returns whether the iteration is early terminated.
///
/// Returns true if the visitor terminated the iteration early.
pub fn break_bit_range<V>(
    start_addr: Address,
    start_bit: BitOffset,
    end_addr: Address,
    end_bit: BitOffset,
    word_bytes: usize,
    visitor: &mut V,
) -> bool
where
    V: FnMut(BitWordRange) -> bool,
{
    trace!(
        "break_bit_range: {} {}, {} {}",
        start_addr,
        start_bit,
        end_addr,
        end_bit
    );
    let word_bits = bits_in_word(word_bytes);
    debug_assert!(start_bit < word_bits && end_bit < word_bits);

    // The start and the end are the same, we don't need to do anything.
    if start_addr == end_addr && start_bit == end_bit {
        return false;
    }

    // If the range is already word-aligned, visit whole words.
    if start_bit == 0 && end_bit == 0 {
        return visitor(BitWordRange::Words {
            start: start_addr,
            end: end_addr,
        });
    }

    // If the start and the end are within the same word,
    // visit the bit range within the word.
    if start_addr == end_addr {
        return visitor(BitWordRange::BitsInWord {
            addr: start_addr,
            bit_start: start_bit,
            bit_end: end_bit,
        });
    }

    // If the end is the 0th bit of the next word of the start,
    // visit the bit range from the start to the end of the same word.
    if start_addr + word_bytes == end_addr && end_bit == 0 {
        return visitor(BitWordRange::BitsInWord {
            addr: start_addr,
            bit_start: start_bit,
            bit_end: word_bits,
        });
    }

    // Otherwise, the range spans over multiple words, and is bit-unaligned at either the start
    // or the end.  Break it into (at most) three sub-ranges.

    // bits in the first word
    let first = BitWordRange::BitsInWord {
        addr: start_addr,
        bit_start: start_bit,
        bit_end: word_bits,
    };
    if visitor(first) {
        return true;
    }

    // words in the middle
    let middle_start = start_addr + word_bytes;
    if middle_start < end_addr
        && visitor(BitWordRange::Words {
            start: middle_start,
            end: end_addr,
        })
    {
        return true;
    }

    // bits in the last word
    end_bit != 0
        && visitor(BitWordRange::BitsInWord {
            addr: end_addr,
            bit_start: 0,
            bit_end: end_bit,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: usize = 8;

    fn collect(
        start_addr: Address,
        start_bit: usize,
        end_addr: Address,
        end_bit: usize,
    ) -> Vec<BitWordRange> {
        let mut ranges = vec![];
        break_bit_range(start_addr, start_bit, end_addr, end_bit, W, &mut |r| {
            ranges.push(r);
            false
        });
        ranges
    }

    #[test]
    fn test_empty_range() {
        let base = Address::from_usize(0x1000);
        assert!(collect(base, 3, base, 3).is_empty());
    }

    #[test]
    fn test_aligned_words() {
        let base = Address::from_usize(0x1000);
        assert_eq!(
            collect(base, 0, base + 3 * W, 0),
            vec![BitWordRange::Words {
                start: base,
                end: base + 3 * W
            }]
        );
    }

    #[test]
    fn test_within_one_word() {
        let base = Address::from_usize(0x1000);
        assert_eq!(
            collect(base, 5, base, 9),
            vec![BitWordRange::BitsInWord {
                addr: base,
                bit_start: 5,
                bit_end: 9
            }]
        );
    }

    #[test]
    fn test_to_end_of_word() {
        let base = Address::from_usize(0x1000);
        assert_eq!(
            collect(base, 5, base + W, 0),
            vec![BitWordRange::BitsInWord {
                addr: base,
                bit_start: 5,
                bit_end: 64
            }]
        );
    }

    #[test]
    fn test_three_parts() {
        let base = Address::from_usize(0x1000);
        assert_eq!(
            collect(base, 5, base + 3 * W, 7),
            vec![
                BitWordRange::BitsInWord {
                    addr: base,
                    bit_start: 5,
                    bit_end: 64
                },
                BitWordRange::Words {
                    start: base + W,
                    end: base + 3 * W
                },
                BitWordRange::BitsInWord {
                    addr: base + 3 * W,
                    bit_start: 0,
                    bit_end: 7
                },
            ]
        );
    }

    #[test]
    fn test_early_termination() {
        let base = Address::from_usize(0x1000);
        let mut visited = 0;
        let terminated = break_bit_range(base, 5, base + 3 * W, 7, W, &mut |_| {
            visited += 1;
            true
        });
        assert!(terminated);
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_mask() {
        assert_eq!(BitWordRange::mask(0, 3), 0b111);
        assert_eq!(BitWordRange::mask(2, 4), 0b1100);
        assert_eq!(BitWordRange::mask(60, 64), 0xf << 60);
    }
}
