//! Read-only inspection of a concurrent mark-sweep (CMS) old generation in a
//! foreign process or memory snapshot.
//!
//! The inspector walks raw memory without any cooperation from the
//! inspected allocator. It can
//!
//! * find the live regions of a compactible free-list space,
//! * recover the size of objects that are still being allocated from the
//!   CMS mark bitmap (the "Printezis" encoding), and
//! * compute free and used bytes from the free-list structures.
//!
//! The inspector never writes to the inspected heap. All reads go through a
//! [`vm::MemoryAccess`] implementation supplied by the host, and the
//! locations of the VM's fields are given by a [`policy::cms::TypeLayout`].
//!
//! A typical session:
//!
//! ```ignore
//! let options = Options::default();
//! let space = CompactibleFreeListSpace::new(&memory, space_addr, &layout, &options)?;
//! let accounting = space.accounting()?;
//! let scan = space.live_regions(&object_model)?;
//! ```

#[macro_use]
extern crate log;
#[cfg(test)]
#[macro_use]
extern crate lazy_static;

/// Collector policies.
pub mod policy;
/// Various utilities.
pub mod util;
/// Interfaces the host implements.
pub mod vm;

pub use crate::policy::cms::{
    CompactibleFreeListSpace, LiveRegionScan, LiveRegionScanner, ScanOutcome, SpaceAccounting,
    TypeLayout,
};
pub use crate::util::error::{InspectError, Result};
pub use crate::util::metadata::MarkBitmap;
pub use crate::util::options::Options;
pub use crate::util::{Address, HeapRange};
