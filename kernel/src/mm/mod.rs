//! Memory management: physical frames, the 4-level page-table mapper, and
//! the kernel heap.
//!
//! Orchestrates, in dependency order: the frame allocator (over the memory
//! map reported by the boot-info parser), the virtual-memory mapper (reusing
//! the page tables the boot stub already installed), and the kernel heap
//! (backed by frame-allocated pages).

use bitflags::bitflags;

pub mod frame_allocator;
pub mod heap;
pub mod page_table;

/// Size of a single physical/virtual page on x86_64.
pub const FRAME_SIZE: usize = 4096;

/// Physical memory address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysicalAddress(pub u64);

impl PhysicalAddress {
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn frame_number(self) -> FrameNumber {
        FrameNumber((self.0 / FRAME_SIZE as u64) as usize)
    }
}

/// Virtual memory address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualAddress(pub u64);

impl VirtualAddress {
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Index of a physical frame (physical address / [`FRAME_SIZE`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameNumber(pub usize);

impl FrameNumber {
    pub const fn address(self) -> PhysicalAddress {
        PhysicalAddress((self.0 * FRAME_SIZE) as u64)
    }
}

bitflags! {
    /// Page-table entry flag bits, matching the x86_64 page-table entry
    /// format (bits 12..52 carry the frame address; these are the low/high
    /// control bits).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u64 {
        const PRESENT       = 1 << 0;
        const WRITABLE      = 1 << 1;
        const USER          = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const NO_CACHE      = 1 << 4;
        const ACCESSED      = 1 << 5;
        const DIRTY         = 1 << 6;
        const HUGE          = 1 << 7;
        const GLOBAL        = 1 << 8;
        const NO_EXECUTE    = 1 << 63;
    }
}

/// Diagnostic snapshot of the whole memory-management subsystem, printed
/// during the staged boot log.
#[derive(Debug, Clone, Copy)]
pub struct MemoryStats {
    pub frames: frame_allocator::FrameStats,
    pub heap: heap::HeapStats,
}

pub fn stats() -> MemoryStats {
    MemoryStats {
        frames: frame_allocator::stats(),
        heap: heap::stats(),
    }
}
