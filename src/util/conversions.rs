use crate::util::constants::LOG_BITS_IN_BYTE;

/* Alignment */

pub const fn raw_align_up(val: usize, align: usize) -> usize {
    // See https://github.com/rust-lang/rust/blob/e620d0f337d0643c757bab791fc7d88d63217704/src/libcore/alloc.rs#L192
    val.wrapping_add(align).wrapping_sub(1) & !align.wrapping_sub(1)
}

/// Like [`raw_align_up`], but `None` if the result does not fit in a `usize`.
pub const fn checked_align_up(val: usize, align: usize) -> Option<usize> {
    match val.checked_add(align.wrapping_sub(1)) {
        Some(v) => Some(v & !align.wrapping_sub(1)),
        None => None,
    }
}

pub const fn raw_is_aligned(val: usize, align: usize) -> bool {
    val & align.wrapping_sub(1) == 0
}

/* Conversion */

/// Heap words to bytes, for a target whose heap word is `word_bytes` wide. `None` on overflow.
pub const fn words_to_bytes(words: usize, word_bytes: usize) -> Option<usize> {
    words.checked_mul(word_bytes)
}

/// Number of bits in a target word of `word_bytes` bytes.
pub const fn bits_in_word(word_bytes: usize) -> usize {
    word_bytes << LOG_BITS_IN_BYTE
}

/// A mask with the lowest `bits` bits set. `bits` may equal the width of `usize`.
pub const fn low_bits_mask(bits: usize) -> usize {
    if bits >= usize::BITS as usize {
        usize::MAX
    } else {
        (1usize << bits) - 1
    }
}
