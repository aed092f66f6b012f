//! Allocator engine: allocate, free, read and write against the two registries

use super::allocated::AllocatedBlockRegistry;
use super::block::Block;
use super::capacity_class::CapacityClassRegistry;
use super::stats::{AllocatedSnapshot, FreeListSnapshot, HeapSnapshot, SessionStats};
use crate::error::{Error, Result};
use std::ops::Range;
use tracing::{debug, info, warn};

/// Segregated free list allocator over a virtual address range
///
/// Owns the free lists, the allocated blocks and the session counters.
/// Every operation runs to completion; callers that share an engine across
/// threads must put the whole engine behind one lock.
#[derive(Debug, Clone)]
pub struct AllocatorEngine {
    free_lists: CapacityClassRegistry,
    allocated: AllocatedBlockRegistry,
    stats: SessionStats,
    base: usize,
    heap_type: i64,
}

impl AllocatorEngine {
    /// Create a heap of `class_count` classes, `bytes_per_class` bytes each,
    /// starting at `base`
    ///
    /// `heap_type` is recorded and reported but has no effect on allocation.
    pub fn init(
        base: usize,
        class_count: usize,
        bytes_per_class: usize,
        heap_type: i64,
    ) -> Result<Self> {
        let free_lists = CapacityClassRegistry::initialize(base, class_count, bytes_per_class)?;
        let total_memory = class_count * bytes_per_class;

        info!(
            class_count,
            bytes_per_class,
            heap_type,
            "Initialized heap of {} bytes at 0x{:x}",
            total_memory,
            base
        );

        Ok(Self {
            free_lists,
            allocated: AllocatedBlockRegistry::new(),
            stats: SessionStats::new(total_memory),
            base,
            heap_type,
        })
    }

    /// Allocate `size` bytes and return the block address
    ///
    /// Takes the lowest-address block of the first class that fits. If that
    /// block is larger than `size`, the tail becomes a new free block in the
    /// class of its own size and a fragmentation is counted.
    pub fn allocate(&mut self, size: usize) -> Result<usize> {
        if size == 0 {
            return Err(Error::InvalidArgument(
                "cannot allocate 0 bytes".to_string(),
            ));
        }

        let index = match self.free_lists.find_fitting_class(size) {
            Some((index, _)) => index,
            None => {
                warn!("Out of memory for {} bytes", size);
                return Err(Error::OutOfMemory { requested: size });
            }
        };
        let block = self
            .free_lists
            .take_first(index)
            .ok_or(Error::OutOfMemory { requested: size })?;

        let address = block.address;
        let leftover = block.size - size;
        if leftover > 0 {
            self.stats.fragmentations += 1;
            self.free_lists
                .insert_or_create_class(leftover, Block::new(address + size, leftover))?;
            debug!(
                "Split {} byte block at 0x{:x}, {} bytes left at 0x{:x}",
                block.size,
                address,
                leftover,
                address + size
            );
        }

        self.allocated.insert_sorted(Block::new(address, size))?;
        self.stats.malloc_calls += 1;

        debug!("Allocated {} bytes at 0x{:x}", size, address);
        Ok(address)
    }

    /// Return the block starting at `address` to its capacity class
    ///
    /// The block keeps its size; it is never merged with free neighbours.
    pub fn free(&mut self, address: usize) -> Result<()> {
        let pos = match self.allocated.find_by_address(address) {
            Some((_, pos)) => pos,
            None => {
                warn!("Invalid free of 0x{:x}", address);
                return Err(Error::InvalidFree { address });
            }
        };

        let mut block = self.allocated.remove_at(pos);
        block.release_payload();
        let size = block.size;
        self.free_lists.insert_or_create_class(size, block)?;
        self.stats.free_calls += 1;

        debug!("Freed {} bytes at 0x{:x}", size, address);
        Ok(())
    }

    /// Write `data` starting at `address`
    ///
    /// At most `declared_length` bytes are written, fewer if `data` is
    /// shorter. The range may cross into following blocks as long as they are
    /// allocated and address-adjacent. Returns the number of bytes written.
    pub fn write(&mut self, address: usize, data: &[u8], declared_length: usize) -> Result<usize> {
        let length = declared_length.min(data.len());
        let run = self.covering_run(address, length)?;
        let end = address + length;

        for block in self.allocated.blocks_mut(run) {
            let span = overlap(block, address, end);
            if span.is_empty() {
                continue;
            }
            let offset = span.start - block.address;
            let payload = block.payload_mut();
            payload[offset..offset + span.len()]
                .copy_from_slice(&data[span.start - address..span.end - address]);
        }

        debug!("Wrote {} bytes at 0x{:x}", length, address);
        Ok(length)
    }

    /// Read `length` bytes starting at `address`
    ///
    /// Every block the range touches must have been written before.
    pub fn read(&self, address: usize, length: usize) -> Result<Vec<u8>> {
        let run = self.covering_run(address, length)?;
        let end = address + length;

        let mut bytes = Vec::with_capacity(length);
        for block in &self.allocated.blocks()[run] {
            let span = overlap(block, address, end);
            if span.is_empty() {
                continue;
            }
            let payload = block.payload().ok_or(Error::UninitializedRead {
                address: block.address,
            })?;
            let offset = span.start - block.address;
            bytes.extend_from_slice(&payload[offset..offset + span.len()]);
        }

        debug!("Read {} bytes at 0x{:x}", length, address);
        Ok(bytes)
    }

    fn covering_run(&self, address: usize, length: usize) -> Result<Range<usize>> {
        self.allocated
            .find_covering_sequence(address, length)
            .ok_or_else(|| {
                warn!("Segmentation fault at 0x{:x} (+{})", address, length);
                Error::SegmentationFault { address, length }
            })
    }

    /// Capture the current free lists, allocated blocks and counters
    pub fn snapshot(&self) -> HeapSnapshot {
        let total_allocated = self.allocated.total_allocated_bytes();

        HeapSnapshot {
            total_memory: self.stats.total_memory,
            total_allocated,
            total_free: self.stats.total_memory.saturating_sub(total_allocated),
            free_block_count: self.free_lists.free_block_count(),
            malloc_calls: self.stats.malloc_calls,
            free_calls: self.stats.free_calls,
            fragmentations: self.stats.fragmentations,
            free_lists: self
                .free_lists
                .classes()
                .iter()
                .map(|class| FreeListSnapshot {
                    capacity: class.capacity,
                    addresses: class.blocks().iter().map(|b| b.address).collect(),
                })
                .collect(),
            allocated: self
                .allocated
                .blocks()
                .iter()
                .map(|b| AllocatedSnapshot {
                    address: b.address,
                    size: b.size,
                })
                .collect(),
            heap_type: self.heap_type,
        }
    }

    /// Tear the heap down, dropping every block and payload
    pub fn shutdown(self) {
        info!(
            allocated_blocks = self.allocated.len(),
            free_blocks = self.free_lists.free_block_count(),
            "Heap at 0x{:x} destroyed",
            self.base
        );
    }

    pub fn free_lists(&self) -> &CapacityClassRegistry {
        &self.free_lists
    }

    pub fn allocated(&self) -> &AllocatedBlockRegistry {
        &self.allocated
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn heap_type(&self) -> i64 {
        self.heap_type
    }
}

/// Part of `[start, end)` that falls inside `block`
fn overlap(block: &Block, start: usize, end: usize) -> Range<usize> {
    start.max(block.address)..end.min(block.end())
}
