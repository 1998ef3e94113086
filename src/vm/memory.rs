use crate::util::error::{InspectError, Result};
use crate::util::Address;

/// Read-only access to the memory of the inspected process.
///
/// All address arithmetic in this crate is parameterized on
/// [`MemoryAccess::address_size`]. The inspected process may have a different
/// pointer width from the host, as long as the host's `usize` can hold the
/// target's addresses.
///
/// Implementations are responsible for any pausing of a live target. Reads
/// against a target that keeps running give best-effort results only.
pub trait MemoryAccess {
    /// Read one target word (of `address_size()` bytes) at `addr`.
    fn read_word(&self, addr: Address) -> Result<usize>;

    /// Read `len` raw bytes starting at `addr`.
    fn read_byte_range(&self, addr: Address, len: usize) -> Result<Vec<u8>>;

    /// The pointer width of the target in bytes: 4 or 8.
    fn address_size(&self) -> usize;

    /// The minimum object alignment of the target in bytes.
    fn min_object_alignment_bytes(&self) -> usize;

    /// Whether the target uses compact ("narrow") object headers. In that mode
    /// free chunks are tagged in the mark word rather than in the `prev` link.
    fn is_compressed_header_mode(&self) -> bool;

    /// The size of a heap word in bytes. HotSpot's heap word is pointer sized.
    fn heap_word_size(&self) -> usize {
        self.address_size()
    }

    /// Read a target word and interpret it as an address.
    fn read_address(&self, addr: Address) -> Result<Address> {
        self.read_word(addr).map(Address::from_usize)
    }

    /// Read a 32-bit integer field (e.g. a C `int`). The default assumes a little endian target.
    fn read_u32(&self, addr: Address) -> Result<u32> {
        let bytes = self.read_byte_range(addr, 4)?;
        if bytes.len() != 4 {
            return Err(InspectError::UnreadableMemory { addr, len: 4 });
        }
        Ok(u32::from_le(bytemuck::pod_read_unaligned(&bytes)))
    }
}

impl<M: MemoryAccess + ?Sized> MemoryAccess for &M {
    fn read_word(&self, addr: Address) -> Result<usize> {
        (**self).read_word(addr)
    }

    fn read_byte_range(&self, addr: Address, len: usize) -> Result<Vec<u8>> {
        (**self).read_byte_range(addr, len)
    }

    fn address_size(&self) -> usize {
        (**self).address_size()
    }

    fn min_object_alignment_bytes(&self) -> usize {
        (**self).min_object_alignment_bytes()
    }

    fn is_compressed_header_mode(&self) -> bool {
        (**self).is_compressed_header_mode()
    }

    fn heap_word_size(&self) -> usize {
        (**self).heap_word_size()
    }

    fn read_u32(&self, addr: Address) -> Result<u32> {
        (**self).read_u32(addr)
    }
}
