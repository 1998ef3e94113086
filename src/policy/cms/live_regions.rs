//! Walking a compactible free-list space block by block.
//!
//! A space is tiled by free chunks and objects. The walk starts at the
//! bottom and steps over one block at a time, using whichever source can
//! tell the block's size:
//!
//! 1. a free chunk records its own size;
//! 2. a fully formed object has a size according to the [`ObjectModel`];
//! 3. an object still being allocated has Printezis marks in the bitmap.
//!
//! If none applies, the walk cannot continue. Consecutive objects are merged
//! into live regions, and free chunks separate them.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::policy::cms::free_chunk::{FreeChunkDetector, FreeChunkView, HeaderMode};
use crate::policy::cms::layout::TypeLayout;
use crate::policy::cms::printezis::{PrintezisSize, PrintezisSizeResolver};
use crate::util::conversions::{checked_align_up, raw_align_up, words_to_bytes};
use crate::util::error::{InspectError, Result};
use crate::util::heap_range::HeapRange;
use crate::util::metadata::MarkBitmap;
use crate::util::options::Options;
use crate::util::Address;
use crate::vm::{MemoryAccess, ObjectModel};

/// Something a scan polls to learn whether it should stop early.
pub trait ScanCancellation {
    fn is_cancelled(&self) -> bool;
}

impl<F: Fn() -> bool> ScanCancellation for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// A cancellation flag that another thread can raise.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl ScanCancellation for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.is_set()
    }
}

/// The size of one block, and how it was learned. Sizes are in bytes and not yet adjusted to the
/// allocation granularity.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockSize {
    Free(usize),
    Object(usize),
    Printezis(usize),
    /// None of the sources knows the size.
    Unparsable,
}

/// Why a scan stopped before reaching the end of its range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A block is neither free nor parsable, and carries no Printezis marks.
    PrintezisNotPresent,
    /// The scan visited `max_scan_steps` blocks.
    StepLimitExceeded,
    Error(InspectError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    Complete,
    Incomplete { at: Address, reason: StopReason },
    Cancelled { at: Address },
}

impl ScanOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, ScanOutcome::Complete)
    }
}

/// Counters collected during one scan.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub steps: usize,
    pub free_chunks: usize,
    pub free_bytes: usize,
    pub objects: usize,
    pub printezis_objects: usize,
}

/// The regions found by a scan, and how far it got. If the scan did not complete, `regions`
/// covers the part of the range before the stop address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveRegionScan {
    pub regions: Vec<HeapRange>,
    pub outcome: ScanOutcome,
    pub stats: ScanStats,
}

impl LiveRegionScan {
    pub fn is_complete(&self) -> bool {
        self.outcome.is_complete()
    }

    /// Total bytes in the live regions.
    pub fn live_bytes(&self) -> usize {
        self.regions.iter().map(HeapRange::byte_size).sum()
    }
}

pub struct LiveRegionScanner<'a, M: MemoryAccess, O: ObjectModel> {
    memory: &'a M,
    object_model: &'a O,
    detector: FreeChunkDetector<'a, M>,
    printezis: PrintezisSizeResolver<'a, M>,
    alignment: usize,
    min_chunk_bytes: usize,
    max_steps: Option<usize>,
    cancel_poll_interval: usize,
}

impl<'a, M: MemoryAccess, O: ObjectModel> LiveRegionScanner<'a, M, O> {
    pub fn new(
        memory: &'a M,
        object_model: &'a O,
        bitmap: &'a MarkBitmap,
        layout: &TypeLayout,
        options: &Options,
    ) -> Result<Self> {
        layout.validate()?;
        if memory.address_size() != layout.address_size {
            return Err(InspectError::InvalidLayout(
                "layout and target disagree on the address size",
            ));
        }
        let alignment = memory.min_object_alignment_bytes();
        if !alignment.is_power_of_two() {
            return Err(InspectError::InvalidLayout(
                "object alignment must be a power of two",
            ));
        }
        let mode = options
            .header_mode
            .resolve(memory.is_compressed_header_mode());
        Ok(LiveRegionScanner {
            memory,
            object_model,
            detector: FreeChunkDetector::new(memory, layout.free_chunk, layout.mark_word, mode),
            printezis: PrintezisSizeResolver::new(memory, bitmap),
            alignment,
            min_chunk_bytes: raw_align_up(layout.free_chunk.header_bytes, alignment),
            max_steps: options.scan_step_limit(),
            cancel_poll_interval: options.cancel_poll_interval.max(1),
        })
    }

    pub fn header_mode(&self) -> HeaderMode {
        self.detector.header_mode()
    }

    /// The smallest block the space can hold.
    pub fn min_chunk_bytes(&self) -> usize {
        self.min_chunk_bytes
    }

    /// Round a block size the way the allocator does. `None` if the rounded size overflows.
    pub fn adjust_block_size(&self, bytes: usize) -> Option<usize> {
        checked_align_up(bytes.max(self.min_chunk_bytes), self.alignment)
    }

    /// Find the size of the block at `addr`.
    pub fn block_size(&self, addr: Address) -> Result<BlockSize> {
        if let FreeChunkView::Free { size_words, .. } = self.detector.classify(addr)? {
            return words_to_bytes(size_words, self.memory.heap_word_size())
                .map(BlockSize::Free)
                .ok_or(InspectError::CorruptFreeChunk {
                    addr,
                    size: size_words,
                });
        }
        if let Some(bytes) = self.object_model.try_read_object_size(self.memory, addr)? {
            return Ok(BlockSize::Object(bytes));
        }
        Ok(match self.printezis.resolve_size(addr)? {
            PrintezisSize::Resolved(bytes) => BlockSize::Printezis(bytes),
            PrintezisSize::NotPresent => BlockSize::Unparsable,
        })
    }

    /// Find the live regions of `range`.
    pub fn scan(&self, range: HeapRange) -> LiveRegionScan {
        self.scan_with_cancel(range, &|| false)
    }

    /// Find the live regions of `range`, polling `cancel` as the scan goes.
    pub fn scan_with_cancel<C: ScanCancellation + ?Sized>(
        &self,
        range: HeapRange,
        cancel: &C,
    ) -> LiveRegionScan {
        let end = range.end();
        let mut regions = vec![];
        let mut stats = ScanStats::default();
        let mut region_start = range.start();
        let mut cur = range.start();

        let close = |regions: &mut Vec<HeapRange>, start: Address, stop: Address| {
            match HeapRange::new(start, stop) {
                Ok(region) if !region.is_empty() => regions.push(region),
                _ => {}
            }
        };

        let outcome = loop {
            if cur >= end {
                if cur > end {
                    warn!("Last block before {} ends at {}", end, cur);
                }
                close(&mut regions, region_start, end);
                break ScanOutcome::Complete;
            }
            if stats.steps % self.cancel_poll_interval == 0 && cancel.is_cancelled() {
                close(&mut regions, region_start, cur);
                break ScanOutcome::Cancelled { at: cur };
            }
            if self.max_steps.is_some_and(|max| stats.steps >= max) {
                close(&mut regions, region_start, cur);
                break ScanOutcome::Incomplete {
                    at: cur,
                    reason: StopReason::StepLimitExceeded,
                };
            }
            stats.steps += 1;

            let block = match self.block_size(cur) {
                Ok(block) => block,
                Err(e) => {
                    close(&mut regions, region_start, cur);
                    break ScanOutcome::Incomplete {
                        at: cur,
                        reason: StopReason::Error(e),
                    };
                }
            };
            trace!("{}: {:?}", cur, block);

            let bytes = match block {
                BlockSize::Free(bytes) => {
                    close(&mut regions, region_start, cur);
                    stats.free_chunks += 1;
                    stats.free_bytes = stats.free_bytes.saturating_add(bytes);
                    bytes
                }
                BlockSize::Object(bytes) => {
                    stats.objects += 1;
                    bytes
                }
                BlockSize::Printezis(bytes) => {
                    stats.printezis_objects += 1;
                    bytes
                }
                BlockSize::Unparsable => {
                    close(&mut regions, region_start, cur);
                    break ScanOutcome::Incomplete {
                        at: cur,
                        reason: StopReason::PrintezisNotPresent,
                    };
                }
            };

            let next = match self
                .adjust_block_size(bytes)
                .and_then(|size| cur.checked_add(size))
            {
                Some(next) => next,
                None => {
                    close(&mut regions, region_start, cur);
                    let error = match block {
                        BlockSize::Free(bytes) => InspectError::CorruptFreeChunk {
                            addr: cur,
                            size: bytes / self.memory.heap_word_size(),
                        },
                        _ => InspectError::OutOfRangeQuery {
                            addr: cur,
                            start: range.start(),
                            end,
                        },
                    };
                    break ScanOutcome::Incomplete {
                        at: cur,
                        reason: StopReason::Error(error),
                    };
                }
            };
            if matches!(block, BlockSize::Free(_)) {
                region_start = next;
            }
            cur = next;
        };

        debug!(
            "Scanned {}: {} regions, {:?}, {:?}",
            range,
            regions.len(),
            stats,
            outcome
        );
        if let ScanOutcome::Incomplete { at, reason } = outcome {
            warn!("Live region scan of {} stopped at {}: {:?}", range, at, reason);
        }

        LiveRegionScan {
            regions,
            outcome,
            stats,
        }
    }
}
