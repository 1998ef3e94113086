use crate::util::error::Result;
use crate::util::Address;
use crate::vm::MemoryAccess;

/// Object metadata of the inspected process.
///
/// The inspector only needs an object's extent. It treats this trait as
/// opaque and never interprets class metadata itself.
pub trait ObjectModel {
    /// Return the size in bytes of the fully formed object at `addr`, or
    /// `None` if the address does not (yet) hold a parsable object, e.g. an
    /// object whose klass word has not been installed by its allocator.
    fn try_read_object_size<M: MemoryAccess>(
        &self,
        memory: &M,
        addr: Address,
    ) -> Result<Option<usize>>;
}

/// An [`ObjectModel`] that reads the klass word of an object, and asks a
/// caller-supplied function for the instance size of that klass.
///
/// A null klass word means the object is still being allocated, so its size
/// is unavailable. This matches how HotSpot publishes objects: the klass is
/// stored last.
pub struct KlassWordObjectModel<F>
where
    F: Fn(Address, Address) -> Option<usize>,
{
    /// Offset of the klass word from the object start, in bytes.
    klass_offset: usize,
    /// `(klass, object) -> size in bytes`
    size_of: F,
}

impl<F> KlassWordObjectModel<F>
where
    F: Fn(Address, Address) -> Option<usize>,
{
    pub fn new(klass_offset: usize, size_of: F) -> Self {
        Self {
            klass_offset,
            size_of,
        }
    }
}

impl<F> ObjectModel for KlassWordObjectModel<F>
where
    F: Fn(Address, Address) -> Option<usize>,
{
    fn try_read_object_size<M: MemoryAccess>(
        &self,
        memory: &M,
        addr: Address,
    ) -> Result<Option<usize>> {
        let klass = memory.read_address(addr + self.klass_offset)?;
        if klass.is_zero() {
            return Ok(None);
        }
        Ok((self.size_of)(klass, addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::SnapshotMemory;

    #[test]
    fn null_klass_has_no_size() {
        let base = Address::from_usize(0x1000);
        let mut memory = SnapshotMemory::zeroed(base, 64, 8).unwrap();
        memory.write_word(base + 40usize, 0xabc0).unwrap();
        let model = KlassWordObjectModel::new(8, |klass, _| {
            (klass == Address::from_usize(0xabc0)).then_some(24)
        });

        assert_eq!(model.try_read_object_size(&memory, base).unwrap(), None);
        assert_eq!(
            model
                .try_read_object_size(&memory, base + 32usize)
                .unwrap(),
            Some(24)
        );
    }
}
