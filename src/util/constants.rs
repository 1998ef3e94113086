/// log2 of the number of bits in a byte
pub const LOG_BITS_IN_BYTE: u8 = 3;

/// log2 of the number of bytes in a megabyte
pub const LOG_BYTES_IN_MBYTE: u8 = 20;

// Target pointer widths we know how to read. The inspected process need not match the host.
/// A 32-bit target
pub const BYTES_IN_ADDRESS_32: usize = 4;
/// A 64-bit target
pub const BYTES_IN_ADDRESS_64: usize = 8;

/// Number of indexed free lists in a compactible free-list space. Lists exist
/// for chunk sizes (in heap words) below this value; larger chunks go to the dictionary.
pub const INDEX_SET_SIZE: usize = 257;

/// Upper bound (in heap words) of the requests served from the small linear allocation block.
pub const SMALL_FOR_LINEAR_ALLOC: usize = 16;

/// Number of low bits of a free chunk's `prev` link that are used as flags.
pub const FREE_CHUNK_PREV_FLAG_BITS: usize = 2;
/// Mask of the flag bits in a free chunk's `prev` link.
pub const FREE_CHUNK_PREV_FLAG_MASK: usize = (1 << FREE_CHUNK_PREV_FLAG_BITS) - 1;
/// The bit in a free chunk's `prev` link that marks the chunk as free (wide header mode).
pub const FREE_CHUNK_FREE_BIT: usize = 0x1;

/// Upper bound on the depth of the large-block dictionary we are willing to walk.
/// A foreign tree deeper than this is treated as corrupt (or a cycle).
pub const MAX_DICTIONARY_DEPTH: usize = 1 << 16;
