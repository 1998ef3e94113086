//! A point-in-time image of a piece of the inspected address space.
//!
//! Scanning a snapshot instead of a live process is the usual way to get a
//! consistent view: the image cannot change under the scanner.

use crate::util::constants::{BYTES_IN_ADDRESS_32, BYTES_IN_ADDRESS_64};
use crate::util::error::{InspectError, Result};
use crate::util::heap_range::HeapRange;
use crate::util::Address;
use crate::vm::MemoryAccess;

/// Byte order of the inspected process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// An owned byte image covering `[base, base + bytes.len())` of a target.
#[derive(Clone, Debug)]
pub struct SnapshotMemory {
    range: HeapRange,
    bytes: Vec<u8>,
    address_size: usize,
    min_object_alignment: usize,
    compressed_headers: bool,
    endian: Endian,
}

impl SnapshotMemory {
    /// Wrap a captured image. The object alignment defaults to the word size,
    /// headers default to wide mode and the byte order to little endian.
    pub fn new(base: Address, bytes: Vec<u8>, address_size: usize) -> Result<Self> {
        if address_size != BYTES_IN_ADDRESS_32 && address_size != BYTES_IN_ADDRESS_64 {
            return Err(InspectError::InvalidLayout("address size must be 4 or 8"));
        }
        if address_size > std::mem::size_of::<usize>() {
            return Err(InspectError::InvalidLayout(
                "target addresses do not fit in a host usize",
            ));
        }
        let range = HeapRange::with_size(base, bytes.len())?;
        Ok(SnapshotMemory {
            range,
            bytes,
            address_size,
            min_object_alignment: address_size,
            compressed_headers: false,
            endian: Endian::Little,
        })
    }

    /// An all-zero image of `len` bytes.
    pub fn zeroed(base: Address, len: usize, address_size: usize) -> Result<Self> {
        Self::new(base, vec![0u8; len], address_size)
    }

    pub fn with_min_object_alignment(mut self, bytes: usize) -> Result<Self> {
        if !bytes.is_power_of_two() || bytes < self.address_size {
            return Err(InspectError::InvalidLayout(
                "object alignment must be a power of two no smaller than a word",
            ));
        }
        self.min_object_alignment = bytes;
        Ok(self)
    }

    pub fn with_compressed_headers(mut self, compressed: bool) -> Self {
        self.compressed_headers = compressed;
        self
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// The address range covered by this image.
    pub fn range(&self) -> HeapRange {
        self.range
    }

    pub fn base(&self) -> Address {
        self.range.start()
    }

    /// Store a target word into the image. This modifies our copy only, and
    /// exists for building images (e.g. synthetic heaps in tests).
    pub fn write_word(&mut self, addr: Address, value: usize) -> Result<()> {
        let size = self.address_size;
        let endian = self.endian;
        let slot = self.slice_mut(addr, size)?;
        match (size, endian) {
            (BYTES_IN_ADDRESS_64, Endian::Little) => {
                slot.copy_from_slice(bytemuck::bytes_of(&(value as u64).to_le()))
            }
            (BYTES_IN_ADDRESS_64, Endian::Big) => {
                slot.copy_from_slice(bytemuck::bytes_of(&(value as u64).to_be()))
            }
            (_, Endian::Little) => {
                slot.copy_from_slice(bytemuck::bytes_of(&(value as u32).to_le()))
            }
            (_, Endian::Big) => slot.copy_from_slice(bytemuck::bytes_of(&(value as u32).to_be())),
        }
        Ok(())
    }

    /// Copy raw bytes into the image.
    pub fn write_bytes(&mut self, addr: Address, data: &[u8]) -> Result<()> {
        self.slice_mut(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    fn offset_of(&self, addr: Address, len: usize) -> Result<usize> {
        let (start, end) = (self.range.start(), self.range.end());
        match addr.checked_add(len) {
            Some(last) if addr >= start && last <= end => Ok(addr - start),
            _ => Err(InspectError::OutOfRangeQuery { addr, start, end }),
        }
    }

    fn slice(&self, addr: Address, len: usize) -> Result<&[u8]> {
        let offset = self.offset_of(addr, len)?;
        Ok(&self.bytes[offset..offset + len])
    }

    fn slice_mut(&mut self, addr: Address, len: usize) -> Result<&mut [u8]> {
        let offset = self.offset_of(addr, len)?;
        Ok(&mut self.bytes[offset..offset + len])
    }
}

impl MemoryAccess for SnapshotMemory {
    fn read_word(&self, addr: Address) -> Result<usize> {
        let bytes = self.slice(addr, self.address_size)?;
        let value = if self.address_size == BYTES_IN_ADDRESS_64 {
            let raw: u64 = bytemuck::pod_read_unaligned(bytes);
            (match self.endian {
                Endian::Little => u64::from_le(raw),
                Endian::Big => u64::from_be(raw),
            }) as usize
        } else {
            let raw: u32 = bytemuck::pod_read_unaligned(bytes);
            (match self.endian {
                Endian::Little => u32::from_le(raw),
                Endian::Big => u32::from_be(raw),
            }) as usize
        };
        Ok(value)
    }

    fn read_byte_range(&self, addr: Address, len: usize) -> Result<Vec<u8>> {
        self.slice(addr, len).map(<[u8]>::to_vec)
    }

    fn address_size(&self) -> usize {
        self.address_size
    }

    fn min_object_alignment_bytes(&self) -> usize {
        self.min_object_alignment
    }

    fn is_compressed_header_mode(&self) -> bool {
        self.compressed_headers
    }

    fn read_u32(&self, addr: Address) -> Result<u32> {
        let raw: u32 = bytemuck::pod_read_unaligned(self.slice(addr, 4)?);
        Ok(match self.endian {
            Endian::Little => u32::from_le(raw),
            Endian::Big => u32::from_be(raw),
        })
    }
}
