//! Block management for the simulated heap

use std::fmt;

/// A contiguous range of the virtual heap
///
/// The same type describes free blocks (inside a capacity class) and
/// allocated blocks. Only allocated blocks ever carry a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// First address of the block
    pub address: usize,
    /// Size of this block in bytes
    pub size: usize,
    /// Bytes written into the block, created on first write
    payload: Option<Vec<u8>>,
}

impl Block {
    /// Create a new block with no payload
    pub fn new(address: usize, size: usize) -> Self {
        Self {
            address,
            size,
            payload: None,
        }
    }

    /// One past the last address of the block
    pub fn end(&self) -> usize {
        self.address + self.size
    }

    /// Check if an address falls inside this block
    pub fn contains(&self, address: usize) -> bool {
        self.address <= address && address < self.end()
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Get the payload buffer, creating it (zeroed, `size` bytes) if absent
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let size = self.size;
        self.payload.get_or_insert_with(|| vec![0; size])
    }

    /// Drop the payload, leaving only the address range
    pub fn release_payload(&mut self) {
        self.payload = None;
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(0x{:x} - {})", self.address, self.size)
    }
}
