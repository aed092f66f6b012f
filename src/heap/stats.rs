//! Session counters and heap snapshots

use serde::{Deserialize, Serialize};

/// Counters kept by the engine for one heap session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Successful allocations
    pub malloc_calls: u64,
    /// Successful frees
    pub free_calls: u64,
    /// Allocations served by a larger block that had to be split
    pub fragmentations: u64,
    /// Size of the heap extent given at initialization
    pub total_memory: usize,
}

impl SessionStats {
    pub fn new(total_memory: usize) -> Self {
        Self {
            total_memory,
            ..Self::default()
        }
    }
}

/// Free list of one capacity class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeListSnapshot {
    pub capacity: usize,
    pub addresses: Vec<usize>,
}

/// One allocated block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedSnapshot {
    pub address: usize,
    pub size: usize,
}

/// Structural state of the heap at one point in time
///
/// Numbers only; turning it into text is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapSnapshot {
    pub total_memory: usize,
    pub total_allocated: usize,
    pub total_free: usize,
    pub free_block_count: usize,
    pub malloc_calls: u64,
    pub free_calls: u64,
    pub fragmentations: u64,
    /// Every capacity class in ascending order, empty ones included
    pub free_lists: Vec<FreeListSnapshot>,
    /// Allocated blocks in ascending address order
    pub allocated: Vec<AllocatedSnapshot>,
    /// Heap type given at initialization, not interpreted
    pub heap_type: i64,
}

impl HeapSnapshot {
    /// Free lists that currently hold at least one block
    pub fn non_empty_free_lists(&self) -> impl Iterator<Item = &FreeListSnapshot> {
        self.free_lists.iter().filter(|list| !list.addresses.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_start_at_zero() {
        let stats = SessionStats::new(1024);
        assert_eq!(stats.total_memory, 1024);
        assert_eq!(stats.malloc_calls, 0);
        assert_eq!(stats.free_calls, 0);
        assert_eq!(stats.fragmentations, 0);
    }

    #[test]
    fn test_snapshot_json_fields() {
        let snapshot = HeapSnapshot {
            total_memory: 64,
            total_allocated: 8,
            total_free: 56,
            free_block_count: 1,
            malloc_calls: 1,
            free_calls: 0,
            fragmentations: 0,
            free_lists: vec![
                FreeListSnapshot {
                    capacity: 8,
                    addresses: vec![8],
                },
                FreeListSnapshot {
                    capacity: 16,
                    addresses: vec![],
                },
            ],
            allocated: vec![AllocatedSnapshot { address: 0, size: 8 }],
            heap_type: 0,
        };

        let json = serde_json::to_value(&snapshot).expect("snapshot serializes");
        assert_eq!(json["total_free"], 56);
        assert_eq!(json["free_lists"][0]["addresses"][0], 8);
        assert_eq!(json["allocated"][0]["size"], 8);
        assert_eq!(snapshot.non_empty_free_lists().count(), 1);
    }
}
