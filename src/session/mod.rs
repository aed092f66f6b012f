//! Heap session: command dispatch, fault policy and lifecycle
//!
//! A session owns at most one heap at a time. `INIT_HEAP` creates it,
//! `DESTROY_HEAP` drops it together with every block and payload. Command
//! output goes to any `std::io::Write`; diagnostics go through `tracing`.

pub mod command;
pub mod report;

pub use command::Command;
pub use report::DumpReport;

use crate::config::{OutputFormat, SessionConfig};
use crate::error::{Error, Result};
use crate::heap::{AllocatorEngine, HeapSnapshot};
use parking_lot::Mutex;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const OUT_OF_MEMORY: &str = "Out of memory";
const INVALID_FREE: &str = "Invalid free";
const SEGMENTATION_FAULT: &str = "Segmentation fault (core dumped)";

/// Whether the session keeps accepting commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// One heap session
#[derive(Debug, Default)]
pub struct Session {
    engine: Option<AllocatorEngine>,
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            engine: None,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    pub fn engine(&self) -> Option<&AllocatorEngine> {
        self.engine.as_ref()
    }

    fn engine_mut(&mut self) -> Result<&mut AllocatorEngine> {
        self.engine.as_mut().ok_or(Error::NotInitialized)
    }

    /// Snapshot of the live heap
    pub fn snapshot(&self) -> Result<HeapSnapshot> {
        self.engine
            .as_ref()
            .map(AllocatorEngine::snapshot)
            .ok_or(Error::NotInitialized)
    }

    /// Run one command, writing its user-visible output to `out`
    ///
    /// Out of memory, invalid free and segmentation faults are reported on
    /// `out` and are not errors. Anything else the command cannot do comes
    /// back as `Err`, with the session left as it was.
    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> Result<Flow> {
        debug!(command = command.name(), "Executing");

        match command {
            Command::Init {
                base,
                class_count,
                bytes_per_class,
                heap_type,
            } => {
                if self.engine.is_some() {
                    return Err(Error::AlreadyInitialized);
                }
                self.engine = Some(AllocatorEngine::init(
                    base,
                    class_count,
                    bytes_per_class,
                    heap_type,
                )?);
            }
            Command::Malloc { size } => match self.engine_mut()?.allocate(size) {
                Ok(_) => {}
                Err(Error::OutOfMemory { .. }) => writeln!(out, "{}", OUT_OF_MEMORY)?,
                Err(e) => return Err(e),
            },
            Command::Free { address } => match self.engine_mut()?.free(address) {
                Ok(()) => {}
                Err(Error::InvalidFree { .. }) => writeln!(out, "{}", INVALID_FREE)?,
                Err(e) => return Err(e),
            },
            Command::Read { address, length } => match self.engine_mut()?.read(address, length) {
                Ok(bytes) => {
                    out.write_all(&bytes)?;
                    writeln!(out)?;
                }
                Err(Error::SegmentationFault { .. }) => return self.fault(out),
                Err(e) => return Err(e),
            },
            Command::Write {
                address,
                data,
                declared_length,
            } => match self.engine_mut()?.write(address, &data, declared_length) {
                Ok(_) => {}
                Err(Error::SegmentationFault { .. }) => return self.fault(out),
                Err(e) => return Err(e),
            },
            Command::Dump => {
                let snapshot = self.snapshot()?;
                self.write_dump(&snapshot, out)?;
            }
            Command::Destroy => {
                self.shutdown();
                return Ok(Flow::Stop);
            }
        }

        Ok(Flow::Continue)
    }

    /// Report a segmentation fault and apply the configured policy
    fn fault<W: Write>(&mut self, out: &mut W) -> Result<Flow> {
        writeln!(out, "{}", SEGMENTATION_FAULT)?;
        if self.config.dump_on_fault {
            let snapshot = self.snapshot()?;
            self.write_dump(&snapshot, out)?;
        }

        if self.config.terminate_on_fault {
            warn!("Segmentation fault, ending session");
            self.shutdown();
            Ok(Flow::Stop)
        } else {
            Ok(Flow::Continue)
        }
    }

    fn write_dump<W: Write>(&self, snapshot: &HeapSnapshot, out: &mut W) -> Result<()> {
        match self.config.output_format {
            OutputFormat::Text => write!(out, "{}", DumpReport(snapshot))?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, snapshot).map_err(std::io::Error::from)?;
                writeln!(out)?;
            }
        }
        Ok(())
    }

    /// Drop the heap, if any
    pub fn shutdown(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.shutdown();
        }
    }

    /// Read commands line by line until `DESTROY_HEAP`, a terminating fault,
    /// or end of input
    ///
    /// Lines are read as raw bytes. Malformed lines and rejected commands are
    /// logged and skipped. Only I/O failures and resource exhaustion end the
    /// run with an error.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, out: &mut W) -> Result<()> {
        let mut buf = Vec::new();
        for index in 0usize.. {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = trim_line_end(&buf);
            let command = match Command::parse(line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    warn!(line = index + 1, "Skipping command: {}", e);
                    continue;
                }
            };

            match self.execute(command, out) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(e) if e.is_recoverable() => {
                    warn!(line = index + 1, "Command rejected: {}", e);
                }
                Err(e) => {
                    error!(line = index + 1, "Session aborted: {}", e);
                    self.shutdown();
                    out.flush()?;
                    return Err(e);
                }
            }
        }

        if self.engine.is_some() {
            info!("End of input, releasing heap");
            self.shutdown();
        }
        out.flush()?;
        Ok(())
    }
}

/// Strip the `\n` or `\r\n` line terminator
fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// A session shared between threads behind one lock
///
/// Commands from different callers are serialized; each one runs to
/// completion before the next starts.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn execute<W: Write>(&self, command: Command, out: &mut W) -> Result<Flow> {
        self.inner.lock().execute(command, out)
    }

    pub fn snapshot(&self) -> Result<HeapSnapshot> {
        self.inner.lock().snapshot()
    }

    /// Run a closure with exclusive access to the session
    pub fn with<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        f(&mut self.inner.lock())
    }
}
