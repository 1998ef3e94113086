//! Read-only views of a concurrent mark-sweep old generation.
//!
//! [`space::CompactibleFreeListSpace`] is the usual entry point. It reads
//! the space bounds, finds the collector's mark bitmap, and hands out a
//! [`live_regions::LiveRegionScanner`] and an [`accounting::SpaceAccountant`].
//! The pieces can also be used directly with a [`layout::TypeLayout`] and a
//! [`crate::util::metadata::MarkBitmap`] built by the caller.

pub mod accounting;
pub mod collector;
pub mod free_chunk;
pub mod generation;
pub mod layout;
pub mod live_regions;
pub mod printezis;
pub mod space;

pub use accounting::{LinearAllocBlock, SpaceAccountant, SpaceAccounting};
pub use collector::CmsCollector;
pub use free_chunk::{FreeChunkDetector, FreeChunkView, HeaderMode};
pub use generation::{find_cms_space, ConcurrentMarkSweepGeneration, GenerationKind, HeapKind};
pub use layout::TypeLayout;
pub use live_regions::{
    BlockSize, CancelFlag, LiveRegionScan, LiveRegionScanner, ScanCancellation, ScanOutcome,
    ScanStats, StopReason,
};
pub use printezis::{PrintezisSize, PrintezisSizeResolver};
pub use space::CompactibleFreeListSpace;
