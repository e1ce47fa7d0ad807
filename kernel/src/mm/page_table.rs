//! 4-level x86_64 page-table mapper.
//!
//! `init()` does not build anything from scratch: the boot stub has already
//! installed identity-mapped page tables and loaded their root into CR3, so
//! this module just records that root and walks/extends the same tree. All
//! physical memory below [`super::frame_allocator`]'s supported range is
//! identity-mapped, so a page-table node's physical address doubles as a
//! dereferenceable pointer to it -- the same assumption the frame allocator
//! already makes when zeroing a freshly allocated frame.

use lazy_static::lazy_static;
use spin::Mutex;
use x86_64::registers::control::Cr3;

use super::{frame_allocator, PageFlags, PhysicalAddress, VirtualAddress};
use crate::error::{KernelError, KernelResult};

const ENTRIES: usize = 512;

#[repr(transparent)]
#[derive(Clone, Copy)]
struct PageTableEntry(u64);

const ADDR_MASK: u64 = 0x000f_ffff_ffff_f000;

impl PageTableEntry {
    const fn empty() -> Self {
        Self(0)
    }

    fn is_present(self) -> bool {
        self.0 & PageFlags::PRESENT.bits() != 0
    }

    fn addr(self) -> PhysicalAddress {
        PhysicalAddress(self.0 & ADDR_MASK)
    }

    fn set(&mut self, addr: PhysicalAddress, flags: PageFlags) {
        self.0 = (addr.as_u64() & ADDR_MASK) | flags.bits();
    }

    fn clear(&mut self) {
        self.0 = 0;
    }
}

#[repr(C, align(4096))]
struct PageTable {
    entries: [PageTableEntry; ENTRIES],
}

impl PageTable {
    /// # Safety
    /// `addr` must be the identity-mapped physical address of a 4 KiB page
    /// table node, either freshly zeroed or already populated.
    unsafe fn at_mut<'a>(addr: PhysicalAddress) -> &'a mut PageTable {
        unsafe { &mut *(addr.as_u64() as *mut PageTable) }
    }
}

/// The four 9-bit indices a virtual address decomposes into, plus its 12-bit
/// page offset.
struct VirtualAddressBreakdown {
    l4: usize,
    l3: usize,
    l2: usize,
    l1: usize,
    offset: u64,
}

fn breakdown(virt: VirtualAddress) -> VirtualAddressBreakdown {
    let v = virt.as_u64();
    VirtualAddressBreakdown {
        l4: ((v >> 39) & 0x1ff) as usize,
        l3: ((v >> 30) & 0x1ff) as usize,
        l2: ((v >> 21) & 0x1ff) as usize,
        l1: ((v >> 12) & 0x1ff) as usize,
        offset: v & 0xfff,
    }
}

lazy_static! {
    /// Physical address of the kernel's top-level page table, recorded from
    /// CR3 at `init()` time.
    static ref KERNEL_ROOT: Mutex<PhysicalAddress> = Mutex::new(PhysicalAddress(0));
}

/// Record the active page-table root (set up by the boot stub) as the
/// kernel's. Does not touch the tables themselves.
pub fn init() {
    let (frame, _flags) = Cr3::read();
    *KERNEL_ROOT.lock() = PhysicalAddress(frame.start_address().as_u64());
}

/// The kernel's top-level page-table root.
pub fn kernel_root() -> PhysicalAddress {
    *KERNEL_ROOT.lock()
}

/// Walk to the child table an entry points at, allocating and zeroing a
/// fresh one first if the entry is absent.
fn get_or_create_table(
    table: &mut PageTable,
    index: usize,
) -> KernelResult<&'static mut PageTable> {
    let entry = &mut table.entries[index];
    if !entry.is_present() {
        let frame = frame_allocator::alloc_zeroed().ok_or(KernelError::OutOfMemory)?;
        entry.set(
            frame.address(),
            PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER,
        );
    }
    let addr = entry.addr();
    // SAFETY: addr is either a table we just allocated and zeroed, or one
    // already installed by a previous map() / the boot stub; both are valid
    // identity-mapped page-table nodes.
    Ok(unsafe { PageTable::at_mut(addr) })
}

/// Map a single 4 KiB page, creating any missing intermediate tables.
///
/// Returns [`KernelError::OutOfMemory`] if a new intermediate table could
/// not be allocated, rather than silently leaving the mapping half-built
/// (see `DESIGN.md` for why this deviates from a bare "silently return").
pub fn map(virt: VirtualAddress, phys: PhysicalAddress, flags: PageFlags) -> KernelResult<()> {
    let idx = breakdown(virt);
    let root = kernel_root();
    // SAFETY: root is the page table CR3 currently points at.
    let l4 = unsafe { PageTable::at_mut(root) };
    let l3 = get_or_create_table(l4, idx.l4)?;
    let l2 = get_or_create_table(l3, idx.l3)?;
    let l1 = get_or_create_table(l2, idx.l2)?;
    l1.entries[idx.l1].set(phys, flags | PageFlags::PRESENT);
    crate::arch::x86_64::tlb_flush_address(virt.as_u64());
    Ok(())
}

/// Unmap a single page. A no-op if any level of the walk is absent.
pub fn unmap(virt: VirtualAddress) {
    let idx = breakdown(virt);
    let root = kernel_root();
    // SAFETY: root is the page table CR3 currently points at.
    let l4 = unsafe { PageTable::at_mut(root) };
    let Some(l3) = walk(l4, idx.l4) else { return };
    let Some(l2) = walk(l3, idx.l3) else { return };
    let Some(l1) = walk(l2, idx.l2) else { return };
    if !l1.entries[idx.l1].is_present() {
        return;
    }
    l1.entries[idx.l1].clear();
    crate::arch::x86_64::tlb_flush_address(virt.as_u64());
}

/// Follow a present entry to its child table, without creating one.
fn walk(table: &mut PageTable, index: usize) -> Option<&'static mut PageTable> {
    let entry = table.entries[index];
    if !entry.is_present() {
        return None;
    }
    // SAFETY: entry is present, so its address is a previously installed
    // page-table node.
    Some(unsafe { PageTable::at_mut(entry.addr()) })
}

/// Translate a virtual address to its mapped physical address, or
/// `PhysicalAddress(0)` if any level of the walk is absent or not present.
pub fn translate(virt: VirtualAddress) -> PhysicalAddress {
    let idx = breakdown(virt);
    let root = kernel_root();
    // SAFETY: root is the page table CR3 currently points at.
    let l4 = unsafe { PageTable::at_mut(root) };
    let Some(l3) = walk(l4, idx.l4) else {
        return PhysicalAddress(0);
    };
    let Some(l2) = walk(l3, idx.l3) else {
        return PhysicalAddress(0);
    };
    let Some(l1) = walk(l2, idx.l2) else {
        return PhysicalAddress(0);
    };
    let entry = l1.entries[idx.l1];
    if !entry.is_present() {
        return PhysicalAddress(0);
    }
    PhysicalAddress(entry.addr().as_u64() | idx.offset)
}

/// Allocate a fresh top-level table sharing the kernel's upper half (the
/// top 256 entries, indices 256..512), for a new address space.
pub fn create_address_space() -> KernelResult<PhysicalAddress> {
    let frame = frame_allocator::alloc_zeroed().ok_or(KernelError::OutOfMemory)?;
    let root_addr = frame.address();
    let kernel_root_addr = kernel_root();
    // SAFETY: both addresses are identity-mapped page-table nodes (one just
    // allocated and zeroed, the other the live kernel root).
    let (new_root, kernel) = unsafe {
        (
            PageTable::at_mut(root_addr),
            PageTable::at_mut(kernel_root_addr),
        )
    };
    for i in 256..ENTRIES {
        new_root.entries[i] = kernel.entries[i];
    }
    Ok(root_addr)
}

/// Load a new top-level table into CR3, flushing non-global TLB entries.
pub fn switch_to(root: PhysicalAddress) {
    use x86_64::structures::paging::PhysFrame;
    use x86_64::PhysAddr;

    let frame = PhysFrame::containing_address(PhysAddr::new(root.as_u64()));
    let (_, flags) = Cr3::read();
    // SAFETY: frame is a valid top-level page table (either the kernel root
    // or one built by create_address_space, which shares the kernel's upper
    // half so kernel code and data remain mapped after the switch).
    unsafe {
        Cr3::write(frame, flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakdown_round_trips_indices() {
        // 0x0000_0040_0000_1234 -> l4=0, l3=1, l2=0, l1=1, offset=0x234
        let virt = VirtualAddress(0x0000_0040_0000_1234);
        let idx = breakdown(virt);
        assert_eq!(idx.l4, 0);
        assert_eq!(idx.l3, 1);
        assert_eq!(idx.l2, 0);
        assert_eq!(idx.l1, 1);
        assert_eq!(idx.offset, 0x234);
    }

    #[test]
    fn entry_set_masks_flags_into_low_bits() {
        let mut entry = PageTableEntry::empty();
        assert!(!entry.is_present());
        entry.set(
            PhysicalAddress(0x2000),
            PageFlags::PRESENT | PageFlags::WRITABLE,
        );
        assert!(entry.is_present());
        assert_eq!(entry.addr(), PhysicalAddress(0x2000));
    }
}
