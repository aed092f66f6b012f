//! Registry of allocated blocks

use super::block::Block;
use super::reserve_one;
use crate::error::Result;
use std::ops::Range;

/// Allocated blocks, ascending by address
///
/// Blocks never overlap and addresses are unique, so a block can be found by
/// binary search on its start address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatedBlockRegistry {
    blocks: Vec<Block>,
}

impl AllocatedBlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block at its address-ordered position
    pub fn insert_sorted(&mut self, block: Block) -> Result<usize> {
        reserve_one(&mut self.blocks, "allocated block registry")?;

        let pos = self.blocks.partition_point(|b| b.address <= block.address);
        self.blocks.insert(pos, block);
        Ok(pos)
    }

    /// Block starting exactly at `address`, with its position
    pub fn find_by_address(&self, address: usize) -> Option<(&Block, usize)> {
        self.blocks
            .binary_search_by_key(&address, |b| b.address)
            .ok()
            .map(|pos| (&self.blocks[pos], pos))
    }

    /// Remove the block at `pos`
    ///
    /// # Panics
    /// Panics if `pos` is out of bounds.
    pub fn remove_at(&mut self, pos: usize) -> Block {
        self.blocks.remove(pos)
    }

    /// Positions of the blocks covering `[start, start + length)`
    ///
    /// The first block must contain `start`. Each following block must begin
    /// exactly where the previous one ends. Returns `None` on a gap, or when
    /// the registry runs out before `length` bytes are covered.
    pub fn find_covering_sequence(&self, start: usize, length: usize) -> Option<Range<usize>> {
        let end = start.checked_add(length)?;

        let first = self
            .blocks
            .partition_point(|b| b.address <= start)
            .checked_sub(1)?;
        if !self.blocks[first].contains(start) {
            return None;
        }

        let mut last = first;
        while self.blocks[last].end() < end {
            let next = self.blocks.get(last + 1)?;
            if next.address != self.blocks[last].end() {
                return None;
            }
            last += 1;
        }

        Some(first..last + 1)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self, positions: Range<usize>) -> &mut [Block] {
        &mut self.blocks[positions]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sum of the sizes of all allocated blocks
    pub fn total_allocated_bytes(&self) -> usize {
        self.blocks.iter().map(|b| b.size).sum()
    }
}
