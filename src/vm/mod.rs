//! The interfaces the inspector requires from its host.
//!
//! The inspector never touches the inspected process directly. A host (a
//! debugger back end, a core-file reader, a test) implements these traits:
//!
//! * [`MemoryAccess`]: raw reads from the foreign address space, plus the
//!   target's pointer width and object alignment.
//! * [`ObjectModel`]: the size of a fully formed object at an address.
//!
//! [`SnapshotMemory`] is a ready-made `MemoryAccess` over an owned byte image.

mod memory;
mod object_model;
pub mod snapshot;

pub use self::memory::MemoryAccess;
pub use self::object_model::KlassWordObjectModel;
pub use self::object_model::ObjectModel;
pub use self::snapshot::Endian;
pub use self::snapshot::SnapshotMemory;
