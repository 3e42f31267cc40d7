//! Memory access trace output.
//!
//! Cores can log every data access (and optionally every instruction fetch) as
//! one text line. The format is:
//!
//! ```text
//! <thread> <core> <uops-since-last> <L|S|I> <addr> <size>
//! ```
//!
//! Addresses are decimal. The third column counts the non-memory micro-ops the
//! core executed since its previous data access; fetch lines carry `-` there.
//!
//! This module provides:
//! 1. **Sink:** [`TraceSink`], one buffered writer shared by all cores behind a mutex.
//! 2. **Per-core Writer:** [`CoreTracer`], which stamps lines with the core and
//!    thread columns.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::common::ConfigError;

/// Shared, buffered trace writer.
///
/// Cloning is cheap; all clones write to the same output.
#[derive(Clone)]
pub struct TraceSink {
    inner: Arc<Mutex<BufWriter<Box<dyn Write + Send>>>>,
}

impl fmt::Debug for TraceSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceSink")
            .field("writers", &Arc::strong_count(&self.inner))
            .finish_non_exhaustive()
    }
}

impl TraceSink {
    /// Wraps an arbitrary writer.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BufWriter::new(writer))),
        }
    }

    /// Creates (or truncates) the file at `path` and traces into it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Appends one line.
    ///
    /// # Errors
    ///
    /// Propagates write errors of the underlying writer.
    pub fn record(&self, line: fmt::Arguments<'_>) -> io::Result<()> {
        let mut out = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_fmt(line)?;
        out.write_all(b"\n")
    }

    /// Flushes buffered lines to the underlying writer.
    ///
    /// # Errors
    ///
    /// Propagates flush errors of the underlying writer.
    pub fn flush(&self) -> io::Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

/// Access kind written in the fourth column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceKind {
    /// Data load.
    Load,
    /// Data store.
    Store,
    /// Instruction fetch.
    Fetch,
}

impl TraceKind {
    const fn letter(self) -> char {
        match self {
            Self::Load => 'L',
            Self::Store => 'S',
            Self::Fetch => 'I',
        }
    }
}

/// One core's view of the trace.
#[derive(Clone, Debug)]
pub struct CoreTracer {
    sink: Option<TraceSink>,
    core_id: u32,
    thread_id: u32,
    trace_ifetch: bool,
}

impl CoreTracer {
    /// Creates a tracer; with `sink == None` every call is a no-op.
    pub const fn new(sink: Option<TraceSink>, core_id: u32, trace_ifetch: bool) -> Self {
        Self {
            sink,
            core_id,
            thread_id: 0,
            trace_ifetch,
        }
    }

    /// Sets the thread column of subsequent lines.
    pub const fn set_thread(&mut self, thread_id: u32) {
        self.thread_id = thread_id;
    }

    /// Writes one data access line.
    ///
    /// `uops` is the number of non-memory micro-ops since the previous data access.
    pub fn access(&mut self, uops: u64, kind: TraceKind, addr: u64, size: u32) {
        let (thread, core, letter) = (self.thread_id, self.core_id, kind.letter());
        self.write(format_args!("{thread} {core} {uops} {letter} {addr} {size}"));
    }

    /// Writes one instruction fetch line if fetch tracing is on.
    pub fn fetch(&mut self, addr: u64, size: u32) {
        if !self.trace_ifetch {
            return;
        }
        let (thread, core, letter) = (self.thread_id, self.core_id, TraceKind::Fetch.letter());
        self.write(format_args!("{thread} {core} - {letter} {addr} {size}"));
    }

    /// A failed write is logged once and disables the tracer; the timing model
    /// itself never fails because of its trace.
    fn write(&mut self, line: fmt::Arguments<'_>) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(err) = sink.record(line) {
            warn!(core = self.core_id, %err, "access trace write failed, tracing disabled");
            self.sink = None;
        }
    }
}
