//! x86_64 architecture support.
//!
//! Provides hardware initialization (GDT, IDT, PIC), interrupt control,
//! serial I/O (COM1 at 0x3F8), VGA text output, and I/O port primitives
//! for the x86_64 platform.

#![allow(clippy::missing_safety_doc)]

use pic8259::ChainedPics;
use spin::Mutex;

pub mod bootstrap;
pub mod context;
pub mod early_serial;
pub mod entry;
pub mod gdt;
pub mod idt;
pub mod multiboot;
pub mod preempt;
pub mod serial;
pub mod syscall;
pub mod timer;
pub mod vga;

/// Vector base for the remapped master/slave PIC (IRQ0 -> 0x20, IRQ8 -> 0x28).
pub const PIC_1_OFFSET: u8 = 0x20;
pub const PIC_2_OFFSET: u8 = 0x28;

/// IRQ line carrying the PIT tick, relative to the remapped base.
pub const TIMER_IRQ: u8 = 0;
/// IRQ line carrying keyboard scancodes, relative to the remapped base.
pub const KEYBOARD_IRQ: u8 = 1;

// SAFETY: PIC_1_OFFSET/PIC_2_OFFSET place the remapped vectors outside the
// CPU exception range (0x00-0x1F), the precondition `ChainedPics::new`
// documents.
pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

/// Bring up the architecture: GDT, IDT, PIC remap, then unmask the timer and
/// keyboard lines and enable interrupts. Called once during `bootstrap::init`
/// stage 5, after the frame allocator, page-table mapper, and heap are all
/// already initialized (the IDT's double-fault IST and process stacks rely
/// on the heap existing first).
pub fn init() {
    // SAFETY: disables interrupts while the IDT/PIC are being configured, so
    // a stray IRQ can't land on an incomplete descriptor table.
    unsafe {
        core::arch::asm!("cli", options(nomem, nostack));
    }

    gdt::init();
    idt::init();

    // SAFETY: PICS is only touched here and from enable_interrupts/EOI
    // paths, all of which run with interrupts disabled or from within an
    // IRQ handler.
    unsafe {
        PICS.lock().initialize();
    }

    timer::setup_timer();
    unmask_irq(TIMER_IRQ);
    unmask_irq(KEYBOARD_IRQ);

    enable_interrupts();
}

/// Clear the mask bit for a single IRQ line on whichever PIC owns it.
fn unmask_irq(irq: u8) {
    // The `pic8259` crate exposes only read/write_masks, so flip a single
    // bit through them rather than hand-rolling port access again.
    let mut pics = PICS.lock();
    // SAFETY: reading/writing the PIC data ports is well defined during
    // initialization; interrupts are still disabled at every call site.
    unsafe {
        let masks = pics.read_masks();
        let mut masks = masks;
        if irq < 8 {
            masks[0] &= !(1 << irq);
        } else {
            masks[1] &= !(1 << (irq - 8));
        }
        pics.write_masks(masks[0], masks[1]);
    }
}

/// Halt the CPU forever. Used by the panic path and fatal exception handlers.
pub fn halt() -> ! {
    disable_interrupts_forever();
    loop {
        x86_64::instructions::hlt();
    }
}

fn disable_interrupts_forever() {
    x86_64::instructions::interrupts::disable();
}

/// Enable hardware interrupts.
pub fn enable_interrupts() {
    x86_64::instructions::interrupts::enable();
}

pub fn disable_interrupts() -> impl Drop {
    struct InterruptGuard {
        was_enabled: bool,
    }

    impl Drop for InterruptGuard {
        fn drop(&mut self) {
            if self.was_enabled {
                x86_64::instructions::interrupts::enable();
            }
        }
    }

    let was_enabled = x86_64::instructions::interrupts::are_enabled();
    x86_64::instructions::interrupts::disable();
    InterruptGuard { was_enabled }
}

/// Halt until the next interrupt, without disabling interrupts first. Used
/// by the idle loop and by the blocking `SLEEP`/keyboard-read paths.
pub fn idle() {
    x86_64::instructions::hlt();
}

pub fn serial_init() -> uart_16550::SerialPort {
    // SAFETY: SerialPort::new(0x3F8) creates a serial port handle for COM1
    // at the standard I/O base address. The address is well-known and the
    // port is initialized immediately after construction.
    let mut serial_port = unsafe { uart_16550::SerialPort::new(0x3F8) };
    serial_port.init();
    serial_port
}

/// Basic I/O port functions -- used by the keyboard and PIT drivers.
#[allow(dead_code)]
pub unsafe fn outb(port: u16, value: u8) {
    x86_64::instructions::port::Port::new(port).write(value);
}

#[allow(dead_code)]
pub unsafe fn inb(port: u16) -> u8 {
    x86_64::instructions::port::Port::new(port).read()
}

#[allow(dead_code)]
pub unsafe fn outw(port: u16, value: u16) {
    x86_64::instructions::port::Port::new(port).write(value);
}

#[allow(dead_code)]
pub unsafe fn inw(port: u16) -> u16 {
    x86_64::instructions::port::Port::new(port).read()
}

/// Flush TLB for a specific virtual address.
#[allow(dead_code)]
pub fn tlb_flush_address(addr: u64) {
    // SAFETY: `invlpg` invalidates the TLB entry for the page containing the
    // given virtual address. Privileged, no side effects beyond TLB.
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) addr);
    }
}

/// Flush entire TLB.
#[allow(dead_code)]
pub fn tlb_flush_all() {
    // SAFETY: Reloading CR3 with its current value flushes all non-global TLB
    // entries. Privileged, no memory side effects.
    unsafe {
        let cr3: u64;
        core::arch::asm!("mov {}, cr3", out(reg) cr3);
        core::arch::asm!("mov cr3, {}", in(reg) cr3);
    }
}
