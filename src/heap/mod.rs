//! Segregated Free List heap
//!
//! Simulates a heap over a virtual address range. Free memory is kept in
//! capacity classes, one free list per block size.
//!
//! # Architecture
//!
//! ```text
//! AllocatorEngine
//!   ├─→ CapacityClassRegistry (ascending capacity)
//!   │     ├─→ CapacityClass(8B)   → Free: [0x0, 0x8, 0x10]
//!   │     ├─→ CapacityClass(16B)  → Free: [0x40]
//!   │     ├─→ CapacityClass(24B)  → Free: [0x88]        (split remainder)
//!   │     └─→ CapacityClass(32B)  → Free: []
//!   │
//!   ├─→ AllocatedBlockRegistry (ascending address)
//!   │     └─→ (0x18 - 8) (0x20 - 8) (0x80 - 8)
//!   │
//!   └─→ SessionStats (malloc / free / fragmentation counters)
//! ```
//!
//! Allocation is first-fit over ascending capacity. A larger block is split
//! and the remainder goes to the class of its own size, created on demand.
//! Freed blocks are never merged with their neighbours.
//!
//! Reads and writes may span several allocated blocks as long as they are
//! address-adjacent with no gap between them.

pub mod allocated;
pub mod block;
pub mod capacity_class;
pub mod engine;
pub mod stats;

pub use allocated::AllocatedBlockRegistry;
pub use block::Block;
pub use capacity_class::{CapacityClass, CapacityClassRegistry, MIN_CAPACITY};
pub use engine::AllocatorEngine;
pub use stats::{AllocatedSnapshot, FreeListSnapshot, HeapSnapshot, SessionStats};

use crate::error::{Error, Result};

/// Reserve room for one more element, mapping allocation failure to a fatal error.
pub(crate) fn reserve_one<T>(items: &mut Vec<T>, what: &str) -> Result<()> {
    items
        .try_reserve(1)
        .map_err(|e| Error::ResourceExhausted(format!("cannot grow {}: {}", what, e)))
}
