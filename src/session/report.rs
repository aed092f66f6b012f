//! Dump report formatting

use crate::heap::HeapSnapshot;
use std::fmt;

/// Text form of a heap dump, framed by `+++++DUMP+++++` and `-----DUMP-----`
pub struct DumpReport<'a>(pub &'a HeapSnapshot);

impl fmt::Display for DumpReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.0;

        writeln!(f, "+++++DUMP+++++")?;
        writeln!(f, "Total memory: {} bytes", snapshot.total_memory)?;
        writeln!(f, "Total allocated memory: {} bytes", snapshot.total_allocated)?;
        writeln!(f, "Total free memory: {} bytes", snapshot.total_free)?;
        writeln!(f, "Free blocks: {}", snapshot.free_block_count)?;
        writeln!(f, "Number of allocated blocks: {}", snapshot.allocated.len())?;
        writeln!(f, "Number of malloc calls: {}", snapshot.malloc_calls)?;
        writeln!(f, "Number of fragmentations: {}", snapshot.fragmentations)?;
        writeln!(f, "Number of free calls: {}", snapshot.free_calls)?;

        for list in snapshot.non_empty_free_lists() {
            write!(
                f,
                "Blocks with {} bytes - {} free block(s) :",
                list.capacity,
                list.addresses.len()
            )?;
            for address in &list.addresses {
                write!(f, " 0x{:x}", address)?;
            }
            writeln!(f)?;
        }

        write!(f, "Allocated blocks :")?;
        for block in &snapshot.allocated {
            write!(f, " (0x{:x} - {})", block.address, block.size)?;
        }
        writeln!(f)?;
        writeln!(f, "-----DUMP-----")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::AllocatorEngine;

    #[test]
    fn test_dump_layout() -> crate::error::Result<()> {
        let mut engine = AllocatorEngine::init(0x100, 2, 16, 0)?;
        engine.allocate(8)?;
        engine.allocate(5)?;

        let text = DumpReport(&engine.snapshot()).to_string();
        let expected = "\
+++++DUMP+++++
Total memory: 32 bytes
Total allocated memory: 13 bytes
Total free memory: 19 bytes
Free blocks: 2
Number of allocated blocks: 2
Number of malloc calls: 2
Number of fragmentations: 1
Number of free calls: 0
Blocks with 3 bytes - 1 free block(s) : 0x10d
Blocks with 16 bytes - 1 free block(s) : 0x110
Allocated blocks : (0x100 - 8) (0x108 - 5)
-----DUMP-----
";
        assert_eq!(text, expected);
        Ok(())
    }

    #[test]
    fn test_empty_heap_has_no_allocated_entries() -> crate::error::Result<()> {
        let engine = AllocatorEngine::init(0, 1, 8, 0)?;
        let text = DumpReport(&engine.snapshot()).to_string();
        assert!(text.contains("Blocks with 8 bytes - 1 free block(s) : 0x0\n"));
        assert!(text.contains("Allocated blocks :\n"));
        Ok(())
    }
}
