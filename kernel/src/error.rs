//! Kernel error taxonomy.
//!
//! A single closed enum covering every failure mode the kernel surfaces
//! internally. Public entry points (allocator, heap, syscall dispatch) still
//! honour their documented sentinel contracts (null pointers, -1 return
//! values, silent no-ops) at the boundary; internally, fallible functions
//! return `Result<T, KernelError>` and propagate with `?`.

use core::fmt;

/// Kernel-wide error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// Boot-info magic did not match the expected loader constant.
    BadMagic { found: u32 },
    /// A physical frame, heap chunk, or stack could not be allocated.
    OutOfMemory,
    /// `process_create` was called while the process table was full.
    TooManyProcesses,
    /// `free()` was called with a frame index outside the managed range.
    InvalidFrame { index: usize },
    /// `heap::free()` was called twice on the same block.
    DoubleFree,
    /// `syscall_handler` was invoked with a number outside the dispatch table.
    UnknownSyscall { number: usize },
    /// A CPU exception that this kernel treats as unrecoverable.
    FatalException { vector: u8 },
}

pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { found } => {
                write!(f, "bad boot magic: 0x{:x}", found)
            }
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::TooManyProcesses => write!(f, "process table full"),
            Self::InvalidFrame { index } => write!(f, "invalid frame index {}", index),
            Self::DoubleFree => write!(f, "double free detected"),
            Self::UnknownSyscall { number } => write!(f, "unknown syscall {}", number),
            Self::FatalException { vector } => write!(f, "fatal exception, vector {}", vector),
        }
    }
}
