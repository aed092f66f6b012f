//! Capacity class management for the segregated free list

use super::block::Block;
use super::reserve_one;
use crate::error::{Error, Result};
use tracing::debug;

/// Capacity of the smallest class created at initialization
pub const MIN_CAPACITY: usize = 8;

/// A capacity class holds free blocks of one exact size
///
/// Free blocks are kept ascending by address, so allocation always hands out
/// the lowest free address of the class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityClass {
    /// Size of every block in this class (bytes)
    pub capacity: usize,
    /// Free blocks, ascending by address
    free_blocks: Vec<Block>,
}

impl CapacityClass {
    /// Create an empty capacity class
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free_blocks: Vec::new(),
        }
    }

    /// Insert a free block, keeping the list ascending by address
    ///
    /// Returns the position the block landed at.
    pub fn insert_sorted(&mut self, block: Block) -> Result<usize> {
        debug_assert_eq!(block.size, self.capacity);
        reserve_one(&mut self.free_blocks, "capacity class")?;

        let pos = self
            .free_blocks
            .partition_point(|b| b.address <= block.address);
        self.free_blocks.insert(pos, block);
        Ok(pos)
    }

    /// Lowest-address free block, if any
    pub fn first(&self) -> Option<&Block> {
        self.free_blocks.first()
    }

    /// Remove and return the lowest-address free block
    pub fn take_first(&mut self) -> Option<Block> {
        if self.free_blocks.is_empty() {
            None
        } else {
            Some(self.free_blocks.remove(0))
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.free_blocks
    }

    /// Get the number of free blocks
    pub fn free_count(&self) -> usize {
        self.free_blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free_blocks.is_empty()
    }

    /// Check if a request of the given size fits in this class
    pub fn can_fit(&self, size: usize) -> bool {
        size <= self.capacity
    }
}

/// All capacity classes of a heap, ascending by capacity with unique capacities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapacityClassRegistry {
    classes: Vec<CapacityClass>,
}

impl CapacityClassRegistry {
    /// Partition `[base, base + class_count * bytes_per_class)` into classes
    ///
    /// Class `i` gets capacity `8 * 2^i` and `(bytes_per_class / 8) >> i`
    /// blocks. Classes follow each other in address order.
    pub fn initialize(base: usize, class_count: usize, bytes_per_class: usize) -> Result<Self> {
        if class_count == 0 {
            return Err(Error::InvalidArgument(
                "a heap needs at least one capacity class".to_string(),
            ));
        }
        if bytes_per_class < MIN_CAPACITY {
            return Err(Error::InvalidArgument(format!(
                "bytes per class must be at least {}, got {}",
                MIN_CAPACITY, bytes_per_class
            )));
        }
        class_count
            .checked_mul(bytes_per_class)
            .and_then(|total| base.checked_add(total))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "heap of {} x {} bytes at 0x{:x} overflows the address space",
                    class_count, bytes_per_class, base
                ))
            })?;

        let mut classes = Vec::new();
        classes
            .try_reserve(class_count)
            .map_err(|e| Error::ResourceExhausted(format!("cannot build class table: {}", e)))?;

        let mut capacity = MIN_CAPACITY;
        let mut block_count = bytes_per_class / MIN_CAPACITY;
        let mut address = base;

        for index in 0..class_count {
            let mut class = CapacityClass::new(capacity);
            class
                .free_blocks
                .try_reserve(block_count)
                .map_err(|e| Error::ResourceExhausted(format!("cannot build free list: {}", e)))?;

            for _ in 0..block_count {
                class.free_blocks.push(Block::new(address, capacity));
                address += capacity;
            }
            debug!(
                "Class {}: {} blocks of {} bytes",
                index, block_count, capacity
            );
            classes.push(class);

            if index + 1 < class_count {
                capacity = capacity.checked_mul(2).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "{} capacity classes overflow the block size",
                        class_count
                    ))
                })?;
                block_count /= 2;
            }
        }

        Ok(Self { classes })
    }

    /// First class, in ascending capacity order, that can hold `requested`
    /// bytes and still has a free block
    ///
    /// Size-eligible but empty classes are skipped. This is first-fit over
    /// capacities, not best-fit over blocks.
    pub fn find_fitting_class(&self, requested: usize) -> Option<(usize, &Block)> {
        self.classes
            .iter()
            .enumerate()
            .filter(|(_, class)| class.can_fit(requested))
            .find_map(|(index, class)| class.first().map(|block| (index, block)))
    }

    /// Class with exactly this capacity
    pub fn class_for_capacity(&self, capacity: usize) -> Option<&CapacityClass> {
        self.position_of(capacity).map(|index| &self.classes[index])
    }

    fn position_of(&self, capacity: usize) -> Option<usize> {
        self.classes
            .binary_search_by_key(&capacity, |class| class.capacity)
            .ok()
    }

    /// Put a free block back into the class of its capacity
    ///
    /// A missing class is appended with the block as its only member, then
    /// the registry is re-sorted by capacity.
    pub fn insert_or_create_class(&mut self, capacity: usize, block: Block) -> Result<()> {
        if let Some(index) = self.position_of(capacity) {
            self.classes[index].insert_sorted(block)?;
            return Ok(());
        }

        reserve_one(&mut self.classes, "capacity class registry")?;
        let mut class = CapacityClass::new(capacity);
        class.insert_sorted(block)?;
        self.classes.push(class);
        self.classes.sort_by_key(|class| class.capacity);

        debug!("Created capacity class of {} bytes", capacity);
        Ok(())
    }

    /// Remove the lowest-address block of the class at `index`
    pub fn take_first(&mut self, index: usize) -> Option<Block> {
        self.classes.get_mut(index).and_then(CapacityClass::take_first)
    }

    pub fn classes(&self) -> &[CapacityClass] {
        &self.classes
    }

    /// Number of capacity classes, empty ones included
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Total number of free blocks across all classes
    pub fn free_block_count(&self) -> usize {
        self.classes.iter().map(CapacityClass::free_count).sum()
    }

    /// Total bytes held in free blocks
    pub fn free_bytes(&self) -> usize {
        self.classes
            .iter()
            .map(|class| class.capacity * class.free_count())
            .sum()
    }
}
