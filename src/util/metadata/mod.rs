//! Metadata kept by the inspected collector outside of object headers.
//!
//! The only such metadata we read is the CMS mark bitmap: one bit per
//! granule of the old generation, in a separately reserved virtual space.

pub mod mark_bitmap;
pub mod ranges;

pub use mark_bitmap::MarkBitmap;
pub use mark_bitmap::NextMark;
