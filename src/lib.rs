// sflheap - Segregated Free List heap simulator
// A virtual heap driven by a small text command protocol

#![warn(rust_2018_idioms)]

pub mod config;
pub mod heap;
pub mod session;

// Re-exports for convenience
pub use config::{OutputFormat, SessionConfig};
pub use heap::{AllocatorEngine, HeapSnapshot};
pub use session::{Command, Flow, Session, SharedSession};

/// sflheap error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Out of memory: no free block can hold {requested} bytes")]
        OutOfMemory { requested: usize },

        #[error("Invalid free: 0x{address:x} is not an allocated block")]
        InvalidFree { address: usize },

        #[error("Segmentation fault: [0x{address:x}, +{length}) is not a continuous allocated region")]
        SegmentationFault { address: usize, length: usize },

        #[error("Uninitialized read: block at 0x{address:x} was never written")]
        UninitializedRead { address: usize },

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Heap is not initialized")]
        NotInitialized,

        #[error("Heap is already initialized")]
        AlreadyInitialized,

        #[error("Parse error on `{line}`: {reason}")]
        Parse { line: String, reason: String },

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Resource exhausted: {0}")]
        ResourceExhausted(String),
    }

    impl Error {
        /// Faults the simulated program can recover from; everything else ends the session.
        pub fn is_recoverable(&self) -> bool {
            !matches!(self, Error::Io(_) | Error::ResourceExhausted(_))
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
