//! `int 0x80` syscall gateway entry point.
//!
//! Unlike the timer/yield trampolines in `preempt`, a syscall never changes
//! which process is running -- it always returns to its caller -- so there
//! is no stack-pointer dance here. The stub's only job is to translate the
//! register-passed calling convention {accumulator, base, counter, data,
//! source, destination} into the ordinary System V argument registers
//! `syscall_handler` expects, then hand its return value back in `rax`
//! exactly where the caller left its syscall number.

use core::arch::naked_asm;

use crate::syscall::syscall_handler;

/// Trap-gate handler for vector 0x80. Preserves every register but `rax`.
///
/// # Safety
/// Must only be installed as the IDT handler for vector 0x80; relies on the
/// CPU pushing an interrupt frame for this gate.
#[unsafe(naked)]
pub unsafe extern "C" fn syscall_entry() {
    naked_asm!(
        "push rax", // [rsp+40] accumulator: syscall number
        "push rbx", // [rsp+32] base:        arg1
        "push rcx", // [rsp+24] counter:      arg2
        "push rdx", // [rsp+16] data:         arg3
        "push rsi", // [rsp+8]  source:       arg4
        "push rdi", // [rsp+0]  destination:  arg5
        // Read the saved values back out of memory rather than
        // register-to-register (several target regs double as sources for
        // a different slot, e.g. rdx/rcx swap positions).
        "mov rdi, [rsp + 40]",
        "mov rsi, [rsp + 32]",
        "mov rdx, [rsp + 24]",
        "mov rcx, [rsp + 16]",
        "mov r8, [rsp + 8]",
        "mov r9, [rsp]",
        "call {handler}",
        "mov [rsp + 40], rax", // overwrite the saved accumulator with the result
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "pop rax",
        "iretq",
        handler = sym syscall_handler,
    )
}
