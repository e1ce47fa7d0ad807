//! Physical frame bitmap allocator.
//!
//! One bit per 4 KiB physical frame, covering addresses 0 up to
//! [`SUPPORTED_MEMORY`]. Bit=1 means allocated. Allocation is first-fit by
//! ascending frame index; `free` is tolerant of double-free (a no-op on an
//! already-clear bit) since there is no reference-count or owner tracking at
//! this layer.

use lazy_static::lazy_static;
use spin::Mutex;

use super::{FrameNumber, PhysicalAddress, FRAME_SIZE};
use crate::arch::x86_64::multiboot::{BootInfo, MemoryMapEntryType};
use crate::error::KernelError;

/// Upper bound on physical memory this allocator can track: 4 GiB.
const SUPPORTED_MEMORY: u64 = 4 * 1024 * 1024 * 1024;
const TOTAL_FRAMES: usize = (SUPPORTED_MEMORY / FRAME_SIZE as u64) as usize;
const WORDS: usize = TOTAL_FRAMES / 64;

/// Physical range occupied by the kernel image itself, bracketed by symbols
/// the linker script provides. Frames in this range are never handed out.
///
/// Gated on `target_os = "none"`: the host test target links this crate
/// against an ordinary host binary rather than `link.ld`, so the real
/// symbols don't exist there. `init()` is never exercised by a host test
/// (tests drive `Bitmap` directly), so the exact range doesn't matter on
/// that target -- only that the reference resolves.
#[cfg(target_os = "none")]
fn kernel_image_range() -> (u64, u64) {
    extern "C" {
        static __kernel_start: u8;
        static __kernel_end: u8;
    }
    // SAFETY: __kernel_start/__kernel_end are linker-provided symbols
    // bracketing every loaded section; taking their addresses (not
    // dereferencing them) is always valid.
    unsafe {
        (
            &__kernel_start as *const u8 as u64,
            &__kernel_end as *const u8 as u64,
        )
    }
}

#[cfg(not(target_os = "none"))]
fn kernel_image_range() -> (u64, u64) {
    (0, 0)
}

struct Bitmap {
    words: [u64; WORDS],
    used: usize,
    total: usize,
}

impl Bitmap {
    fn new() -> Self {
        // Start fully allocated; `init` clears the frames the boot-info
        // memory map reports as available.
        Self {
            words: [u64::MAX; WORDS],
            used: TOTAL_FRAMES,
            total: TOTAL_FRAMES,
        }
    }

    fn is_set(&self, index: usize) -> bool {
        self.words[index / 64] & (1 << (index % 64)) != 0
    }

    fn set(&mut self, index: usize) {
        let was_set = self.is_set(index);
        self.words[index / 64] |= 1 << (index % 64);
        if !was_set {
            self.used += 1;
        }
    }

    fn clear(&mut self, index: usize) {
        let was_set = self.is_set(index);
        self.words[index / 64] &= !(1 << (index % 64));
        if was_set {
            self.used -= 1;
        }
    }

    fn alloc(&mut self) -> Option<usize> {
        for word_idx in 0..WORDS {
            if self.words[word_idx] != u64::MAX {
                for bit in 0..64 {
                    let idx = word_idx * 64 + bit;
                    if idx >= self.total {
                        break;
                    }
                    if !self.is_set(idx) {
                        self.set(idx);
                        return Some(idx);
                    }
                }
            }
        }
        None
    }
}

lazy_static! {
    static ref BITMAP: Mutex<Bitmap> = Mutex::new(Bitmap::new());
}

/// Diagnostic snapshot, mirroring the original `pmm_get_total/free/used`
/// trio in a single struct.
#[derive(Debug, Clone, Copy)]
pub struct FrameStats {
    pub total_frames: usize,
    pub used_frames: usize,
    pub free_frames: usize,
}

pub fn stats() -> FrameStats {
    let bitmap = BITMAP.lock();
    FrameStats {
        total_frames: bitmap.total,
        used_frames: bitmap.used,
        free_frames: bitmap.total - bitmap.used,
    }
}

/// Mark every frame wholly contained in an available region as free, then
/// re-reserve the frames occupied by the kernel image (frames occupied by
/// the bitmap itself live in the kernel's `.bss` and are covered by the
/// same range).
pub fn init(boot_info: &BootInfo) {
    let mut bitmap = BITMAP.lock();

    for entry in boot_info.memory_map() {
        if entry.entry_type != MemoryMapEntryType::Available {
            continue;
        }
        let start_frame = (entry.base_addr / FRAME_SIZE as u64) as usize;
        let end_addr = entry.base_addr.saturating_add(entry.length);
        let end_frame = (end_addr / FRAME_SIZE as u64) as usize;
        for idx in start_frame..end_frame.min(TOTAL_FRAMES) {
            bitmap.clear(idx);
        }
    }

    let (kernel_start, kernel_end) = kernel_image_range();
    let start_frame = (kernel_start / FRAME_SIZE as u64) as usize;
    let end_frame = kernel_end.div_ceil(FRAME_SIZE as u64) as usize;
    for idx in start_frame..end_frame.min(TOTAL_FRAMES) {
        bitmap.set(idx);
    }

    // The first 1 MiB holds real-mode/BIOS structures and is never handed
    // out even if the memory map marks parts of it available.
    let low_meg_frames = (0x100000 / FRAME_SIZE) as usize;
    for idx in 0..low_meg_frames.min(TOTAL_FRAMES) {
        bitmap.set(idx);
    }
}

/// Allocate the lowest-indexed free frame. Returns `None` when exhausted.
pub fn alloc() -> Option<FrameNumber> {
    BITMAP.lock().alloc().map(FrameNumber)
}

/// Free a previously allocated frame. Out-of-range or already-free indices
/// are tolerated (never corrupt the bitmap or panic) but logged, since both
/// indicate a caller bug.
pub fn free(frame: FrameNumber) {
    let mut bitmap = BITMAP.lock();
    if frame.0 >= bitmap.total {
        let err = KernelError::InvalidFrame { index: frame.0 };
        log::warn!("frame_allocator::free: {err}");
        return;
    }
    if !bitmap.is_set(frame.0) {
        let err = KernelError::DoubleFree;
        log::warn!("frame_allocator::free: {err} (frame {})", frame.0);
        return;
    }
    bitmap.clear(frame.0);
}

/// Allocate a frame and zero its contents via the identity-mapped region
/// the boot stub establishes for the first 2 MiB plus any additional
/// identity mapping the mapper has installed for kernel-owned pages.
pub fn alloc_zeroed() -> Option<FrameNumber> {
    let frame = alloc()?;
    let addr = frame.address();
    zero_frame(addr);
    Some(frame)
}

fn zero_frame(addr: PhysicalAddress) {
    // SAFETY: the frame was just allocated and is identity-mapped (all
    // physical memory below SUPPORTED_MEMORY is identity-mapped by the page
    // tables the mapper builds on top of the boot stub's initial mapping).
    unsafe {
        let ptr = addr.as_u64() as *mut u8;
        core::ptr::write_bytes(ptr, 0, FRAME_SIZE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_alloc_free_roundtrip() {
        let mut bitmap = Bitmap::new();
        // Simulate a cleared region as `init` would produce.
        for idx in 0..16 {
            bitmap.clear(idx);
        }
        let a = bitmap.alloc().unwrap();
        let b = bitmap.alloc().unwrap();
        assert_ne!(a, b);
        assert_eq!(bitmap.used, TOTAL_FRAMES - 16 + 2);

        bitmap.clear(a);
        assert_eq!(bitmap.used, TOTAL_FRAMES - 16 + 1);

        // Double-free is a silent no-op.
        bitmap.clear(a);
        assert_eq!(bitmap.used, TOTAL_FRAMES - 16 + 1);
    }

    #[test]
    fn bitmap_first_fit_ascending() {
        let mut bitmap = Bitmap::new();
        for idx in 0..8 {
            bitmap.clear(idx);
        }
        assert_eq!(bitmap.alloc(), Some(0));
        assert_eq!(bitmap.alloc(), Some(1));
    }
}
