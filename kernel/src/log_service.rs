//! Structured kernel log service.
//!
//! Provides a fixed-size, heap-free circular buffer of structured log
//! entries. Each entry carries a timestamp, severity level, subsystem tag,
//! and a fixed-length message. The buffer is exposed to the rest of the
//! kernel both through a small direct API (`klog`) and through a `log`-crate
//! [`log::Log`] implementation so ordinary `log::info!`/`log::warn!` call
//! sites work without every caller depending on this module directly.
//!
//! The buffer holds up to [`LOG_BUFFER_CAPACITY`] entries. Once full it wraps
//! around and silently overwrites the oldest entries.

use lazy_static::lazy_static;
use log::{Level, LevelFilter, Metadata, Record};
use spin::Mutex;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Maximum number of log entries the circular buffer can hold.
const LOG_BUFFER_CAPACITY: usize = 256;

/// Maximum length (in bytes) of a log message stored in a [`LogEntry`].
const LOG_MESSAGE_MAX_LEN: usize = 128;

/// Maximum length (in bytes) of the subsystem tag in a [`LogEntry`].
const LOG_SUBSYSTEM_MAX_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Severity levels for kernel log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Unrecoverable or critical errors.
    Error = 0,
    /// Conditions that may indicate a problem.
    Warn = 1,
    /// Normal operational messages.
    Info = 2,
    /// Verbose diagnostic output.
    Debug = 3,
    /// Very detailed tracing information.
    Trace = 4,
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warn,
            Level::Info => LogLevel::Info,
            Level::Debug => LogLevel::Debug,
            Level::Trace => LogLevel::Trace,
        }
    }
}

/// A single structured log entry, stored inline so it can live in a static
/// circular buffer without heap allocation.
#[derive(Clone)]
pub struct LogEntry {
    /// Timer ticks since boot (see `arch::x86_64::timer::get_ticks`).
    pub timestamp_ticks: u64,
    /// Severity of the message.
    pub level: LogLevel,
    subsystem_buf: [u8; LOG_SUBSYSTEM_MAX_LEN],
    subsystem_len: u8,
    message_buf: [u8; LOG_MESSAGE_MAX_LEN],
    message_len: u8,
}

impl LogEntry {
    const fn empty() -> Self {
        Self {
            timestamp_ticks: 0,
            level: LogLevel::Trace,
            subsystem_buf: [0u8; LOG_SUBSYSTEM_MAX_LEN],
            subsystem_len: 0,
            message_buf: [0u8; LOG_MESSAGE_MAX_LEN],
            message_len: 0,
        }
    }

    /// Return the subsystem tag as a `&str`.
    pub fn subsystem(&self) -> &str {
        let len = self.subsystem_len as usize;
        core::str::from_utf8(&self.subsystem_buf[..len]).unwrap_or("")
    }

    /// Return the message text as a `&str`.
    pub fn message(&self) -> &str {
        let len = self.message_len as usize;
        core::str::from_utf8(&self.message_buf[..len]).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Circular buffer
// ---------------------------------------------------------------------------

struct LogBuffer {
    entries: [LogEntry; LOG_BUFFER_CAPACITY],
    head: usize,
    count: usize,
}

impl LogBuffer {
    fn new() -> Self {
        const EMPTY: LogEntry = LogEntry::empty();
        Self {
            entries: [EMPTY; LOG_BUFFER_CAPACITY],
            head: 0,
            count: 0,
        }
    }

    fn push(&mut self, entry: LogEntry) {
        self.entries[self.head] = entry;
        self.head = (self.head + 1) % LOG_BUFFER_CAPACITY;
        if self.count < LOG_BUFFER_CAPACITY {
            self.count += 1;
        }
    }

    fn len(&self) -> usize {
        self.count
    }

    fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }

    fn tail(&self) -> usize {
        if self.count < LOG_BUFFER_CAPACITY {
            0
        } else {
            self.head
        }
    }

    fn get(&self, i: usize) -> Option<&LogEntry> {
        if i >= self.count {
            return None;
        }
        let physical = (self.tail() + i) % LOG_BUFFER_CAPACITY;
        Some(&self.entries[physical])
    }
}

// ---------------------------------------------------------------------------
// Global state
// ---------------------------------------------------------------------------

lazy_static! {
    static ref LOG_BUFFER: Mutex<LogBuffer> = Mutex::new(LogBuffer::new());
}

fn record(level: LogLevel, subsystem: &str, message: &str) {
    let timestamp_ticks = crate::arch::x86_64::timer::get_ticks();

    let mut subsystem_buf = [0u8; LOG_SUBSYSTEM_MAX_LEN];
    let sub_len = subsystem.len().min(LOG_SUBSYSTEM_MAX_LEN);
    subsystem_buf[..sub_len].copy_from_slice(&subsystem.as_bytes()[..sub_len]);

    let mut message_buf = [0u8; LOG_MESSAGE_MAX_LEN];
    let msg_len = message.len().min(LOG_MESSAGE_MAX_LEN);
    message_buf[..msg_len].copy_from_slice(&message.as_bytes()[..msg_len]);

    LOG_BUFFER.lock().push(LogEntry {
        timestamp_ticks,
        level,
        subsystem_buf,
        subsystem_len: sub_len as u8,
        message_buf,
        message_len: msg_len as u8,
    });
}

// ---------------------------------------------------------------------------
// Public direct API
// ---------------------------------------------------------------------------

/// Record a structured log entry directly, bypassing the `log` crate.
pub fn klog(level: LogLevel, subsystem: &str, message: &str) {
    record(level, subsystem, message);
}

/// Iterate over all buffered log entries from oldest to newest.
pub fn log_drain<F: FnMut(&LogEntry)>(mut f: F) -> usize {
    let buffer = LOG_BUFFER.lock();
    let n = buffer.len();
    for i in 0..n {
        if let Some(entry) = buffer.get(i) {
            f(entry);
        }
    }
    n
}

/// Number of entries currently in the log buffer.
pub fn log_count() -> usize {
    LOG_BUFFER.lock().len()
}

/// Clear all log entries.
pub fn log_clear() {
    LOG_BUFFER.lock().clear()
}

// ---------------------------------------------------------------------------
// log::Log implementation
// ---------------------------------------------------------------------------

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, r: &Record) {
        // Fixed-size message buffer: format into a stack array instead of
        // allocating, since this runs before (and after) the heap exists.
        use core::fmt::Write;

        struct FixedBuf {
            buf: [u8; LOG_MESSAGE_MAX_LEN],
            len: usize,
        }
        impl Write for FixedBuf {
            fn write_str(&mut self, s: &str) -> core::fmt::Result {
                let remaining = LOG_MESSAGE_MAX_LEN - self.len;
                let take = remaining.min(s.len());
                self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
                self.len += take;
                Ok(())
            }
        }

        let mut fixed = FixedBuf {
            buf: [0u8; LOG_MESSAGE_MAX_LEN],
            len: 0,
        };
        let _ = write!(fixed, "{}", r.args());
        let message = core::str::from_utf8(&fixed.buf[..fixed.len]).unwrap_or("");

        record(LogLevel::from(r.level()), r.target(), message);
    }

    fn flush(&self) {}
}

/// Install the kernel logger as the global `log` crate backend.
///
/// Must be called once during boot. Subsequent calls are ignored (the `log`
/// crate itself reports re-initialization as an error, which we discard).
pub fn init() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Trace);
}
