//! End-to-end command transcripts through a heap session

use sflheap::error::Result;
use sflheap::{Session, SessionConfig};

fn run(script: &str) -> Result<String> {
    let mut session = Session::new(SessionConfig::default());
    let mut out = Vec::new();
    session.run(script.as_bytes(), &mut out)?;
    assert!(!session.is_initialized(), "heap must be released when the run ends");
    Ok(String::from_utf8(out).expect("protocol output is UTF-8"))
}

const DUMP: &str = "\
+++++DUMP+++++
Total memory: 256 bytes
Total allocated memory: 26 bytes
Total free memory: 230 bytes
Free blocks: 14
Number of allocated blocks: 2
Number of malloc calls: 3
Number of fragmentations: 1
Number of free calls: 1
Blocks with 6 bytes - 1 free block(s) : 0x4b
Blocks with 8 bytes - 8 free block(s) : 0x1 0x9 0x11 0x19 0x21 0x29 0x31 0x39
Blocks with 16 bytes - 2 free block(s) : 0x61 0x71
Blocks with 32 bytes - 2 free block(s) : 0x81 0xa1
Blocks with 64 bytes - 1 free block(s) : 0xc1
Allocated blocks : (0x41 - 10) (0x51 - 16)
-----DUMP-----
";

#[test]
fn test_full_session_ends_on_segmentation_fault() -> Result<()> {
    let script = r#"INIT_HEAP 0x1 4 64 0
MALLOC 10
MALLOC 6
MALLOC 16
WRITE 0x41 "abcdefghijklmnopqrstuvwxyz" 26
READ 0x45 20
FREE 0x4b
FREE 0x4b
MALLOC 100
DUMP_MEMORY
READ 0x41 12
MALLOC 8
DUMP_MEMORY
"#;

    let expected = format!(
        "efghijklmnopqrstuvwx\nInvalid free\nOut of memory\n{}Segmentation fault (core dumped)\n{}",
        DUMP, DUMP
    );
    assert_eq!(run(script)?, expected);
    Ok(())
}

#[test]
fn test_declared_length_limits_write() -> Result<()> {
    let script = r#"INIT_HEAP 0x0 1 64 0
MALLOC 8
WRITE 0x0 "hello" 3
READ 0x0 3
WRITE 0x0 "hi" 40
READ 0x0 3
DESTROY_HEAP
READ 0x0 3
"#;
    assert_eq!(run(script)?, "hel\nhil\n");
    Ok(())
}

#[test]
fn test_write_into_unallocated_memory_dumps() -> Result<()> {
    let script = r#"INIT_HEAP 0x0 1 16 0
WRITE 0x0 "x" 1
MALLOC 8
"#;
    let expected = "\
Segmentation fault (core dumped)
+++++DUMP+++++
Total memory: 16 bytes
Total allocated memory: 0 bytes
Total free memory: 16 bytes
Free blocks: 2
Number of allocated blocks: 0
Number of malloc calls: 0
Number of fragmentations: 0
Number of free calls: 0
Blocks with 8 bytes - 2 free block(s) : 0x0 0x8
Allocated blocks :
-----DUMP-----
";
    assert_eq!(run(script)?, expected);
    Ok(())
}

#[test]
fn test_dump_after_free_of_adjacent_blocks() -> Result<()> {
    let script = "INIT_HEAP 0x0 1 32 0\nMALLOC 8\nMALLOC 8\nFREE 0x0\nFREE 0x8\nDUMP_MEMORY\n";
    let out = run(script)?;

    assert!(out.contains("Blocks with 8 bytes - 4 free block(s) : 0x0 0x8 0x10 0x18\n"));
    assert!(out.contains("Number of free calls: 2\n"));
    assert!(!out.contains("Blocks with 16 bytes"));
    Ok(())
}

#[test]
fn test_binary_payload_survives_session() -> Result<()> {
    let mut script = b"INIT_HEAP 0x0 1 16 0\nMALLOC 8\nWRITE 0x0 \"\xff\xfe\" 2\nREAD 0x0 2\n".to_vec();
    script.extend_from_slice(b"MALLOC \xff\nDUMP_MEMORY\n");

    let mut session = Session::new(SessionConfig::default());
    let mut out = Vec::new();
    session.run(&script[..], &mut out)?;

    let mut expected = b"\xff\xfe\n".to_vec();
    expected.extend_from_slice(
        b"\
+++++DUMP+++++
Total memory: 16 bytes
Total allocated memory: 8 bytes
Total free memory: 8 bytes
Free blocks: 1
Number of allocated blocks: 1
Number of malloc calls: 1
Number of fragmentations: 0
Number of free calls: 0
Blocks with 8 bytes - 1 free block(s) : 0x8
Allocated blocks : (0x0 - 8)
-----DUMP-----
",
    );
    assert_eq!(out, expected);
    assert!(!session.is_initialized());
    Ok(())
}
