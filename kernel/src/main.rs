//! Kernel entry point.
//!
//! `_start` is the address the boot stub transfers control to once it has
//! enabled long mode, loaded a GDT with selectors at 0x08/0x10, identity
//! mapped the first 2 MiB, and built an initial page-table root (see
//! `SPEC_FULL.md` §6, "Boot contract"). It hands off with the Multiboot2
//! magic in `eax` and the physical address of the info blob in `ebx` --
//! neither a Rust-ABI calling convention nor something `extern "C"` can
//! express directly, so `_start` is naked and moves both into the ordinary
//! System V argument registers before calling into [`kernel_main`], the same
//! pattern `arch::x86_64::syscall::syscall_entry` uses for its own
//! non-standard register ABI.

#![no_std]
#![no_main]

use core::arch::naked_asm;
use core::panic::PanicInfo;

use veridian_kernel::arch::x86_64::multiboot::BootInfo;
use veridian_kernel::{arch, bootstrap, early_println, sched};

/// # Safety
/// Must only ever be invoked once, by the boot stub, with the Multiboot2
/// magic in `eax` and the physical address of the info blob in `ebx`, on a
/// CPU already in long mode with a valid GDT and an identity-mapped first
/// 2 MiB.
#[unsafe(naked)]
#[no_mangle]
pub unsafe extern "C" fn _start() -> ! {
    naked_asm!(
        "mov edi, eax", // magic -> first SysV argument (zero-extends rdi)
        "mov rsi, rbx", // info blob address -> second SysV argument
        "call {kernel_main}",
        kernel_main = sym kernel_main,
    )
}

extern "C" fn kernel_main(magic: u32, info_addr: u64) -> ! {
    arch::x86_64::entry::arch_early_init();

    // SAFETY: info_addr is the physical address the boot stub passed in
    // rbx, pointing at a Multiboot2 info blob that stays mapped and
    // unmodified for the remainder of boot (the identity mapping the boot
    // stub installed covers it).
    let boot_info = match unsafe { BootInfo::parse(magic, info_addr) } {
        Ok(info) => info,
        Err(e) => {
            early_println!("[BOOT] {}", e);
            arch::halt();
        }
    };

    if let Err(e) = bootstrap::init(&boot_info) {
        early_println!("[BOOT] bootstrap failed: {}", e);
        arch::halt();
    }

    // Never returns: control passes to whichever process the ready queue
    // hands the scheduler first.
    sched::scheduler_start();
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    arch::x86_64::entry::arch_panic_handler(info);
    arch::halt();
}
