//! Entry into the very first process.
//!
//! Every later switch flows through `arch::x86_64::preempt`'s naked stubs,
//! which save the interrupted frame, call into the scheduler, and resume
//! whatever stack pointer it returns. The first process never arrives via an
//! interrupt, though -- `sched::scheduler_start` has a bare stack pointer
//! built by [`crate::sched::process::Pcb::new`] and needs a way to fall into
//! the same register-restore / `iretq` tail the preempt stubs use. That tail
//! is small enough, and used from exactly one place, that it is kept here
//! rather than threading a `call` out of the naked preempt stubs just to
//! share it.
//!
//! Floating-point state is never saved or restored anywhere in this kernel:
//! preserving it across a switch is explicitly out of scope.

use core::arch::naked_asm;

/// Load `sp` as the stack pointer and fall through the same register-restore
/// sequence `preempt`'s stubs use to resume a process, ending in `iretq`.
///
/// # Safety
/// `sp` must point at the bottom (lowest address) of a
/// [`crate::sched::process::TrapFrame`] built by `Pcb::new`. Never returns:
/// control passes to the frame's `rip` with interrupts enabled.
#[unsafe(naked)]
pub unsafe extern "C" fn enter_first_frame(sp: usize) -> ! {
    naked_asm!(
        "mov rsp, rdi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rbp",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "pop rax",
        "add rsp, 16", // skip the padding pair ahead of the iretq frame
        "iretq",
    )
}
