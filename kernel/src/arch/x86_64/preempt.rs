//! Naked trampolines for the two ways which-process-is-running can change:
//! the timer tick (vector 32, a real interrupt) and the cooperative yield
//! [`crate::sched::do_schedule`] performs via an ordinary function call.
//!
//! Both share one shape: push the interrupted register file onto the
//! interrupted stack in exactly the order [`crate::sched::process::TrapFrame`]
//! declares its fields, call a typed Rust dispatcher with that stack pointer,
//! then resume from whatever pointer it returns -- which may belong to a
//! different process's kernel stack entirely. Neither `extern "x86-interrupt"`
//! nor ordinary Rust functions can express "return to a caller-chosen stack",
//! hence naked functions here.
//!
//! [`cooperative_yield_stub`] is not installed anywhere in the IDT -- it is
//! `call`ed directly -- so it cannot rely on the CPU having pushed an
//! interrupt frame the way [`timer_interrupt_stub`] can. It manufactures one
//! itself before falling into the identical save/dispatch/restore sequence,
//! so there remains exactly one on-stack representation a suspended process
//! is resumed from, regardless of which path suspended it.
//!
//! Every process runs at ring 0, so neither stub's `iretq` ever pops
//! `ss`/`rsp` (the CPU only does that across a privilege change); see
//! `TrapFrame`'s own doc comment for what that implies about the two fields.

use core::arch::naked_asm;

/// Timer IRQ (vector 32, IRQ0 post-remap). Saves the full frame, calls
/// [`crate::sched::preempt_handler`], resumes the returned stack.
///
/// # Safety
/// Must only be installed as the IDT handler for vector 32; relies on the
/// CPU pushing an interrupt frame and on no other code sharing this stack.
#[unsafe(naked)]
pub unsafe extern "C" fn timer_interrupt_stub() {
    naked_asm!(
        "sub rsp, 16",
        "push rax",
        "push rcx",
        "push rbx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "call {handler}",
        "mov rsp, rax",
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
        "add rsp, 16",
        "iretq",
        handler = sym crate::sched::preempt_handler,
    )
}

/// Cooperative yield trampoline `sched::do_schedule` reaches with an
/// ordinary `call` -- never installed in the IDT, never entered by an
/// interrupt. Calls [`crate::sched::yield_handler`], same as the timer path.
///
/// Since no interrupt delivered us here, the CPU never pushed the
/// `rip`/`cs`/`rflags`/`rsp`/`ss` tail [`timer_interrupt_stub`] gets for
/// free; the first block below manufactures an equivalent one so the rest
/// of this function is byte-for-byte the same shape. `rip` is simply this
/// function's own return address (read out of `[rsp]` before anything is
/// pushed) -- resuming here later is indistinguishable from the `call`
/// that got us here just returning. `rsp`/`ss` are the same unused
/// placeholders `TrapFrame`'s doc comment describes.
///
/// # Safety
/// Must only ever be reached via an ordinary `call`, on the caller's own
/// kernel stack, with interrupts already enabled (matching the `rflags`
/// `pushfq` captures) and no other code sharing that stack.
#[unsafe(naked)]
pub unsafe extern "C" fn cooperative_yield_stub() {
    naked_asm!(
        "mov rax, [rsp]", // our own return address, before touching the stack
        "push 0",         // ss (unused at ring 0)
        "push 0",         // rsp (unused at ring 0)
        "pushfq",         // rflags
        "mov rcx, cs",
        "push rcx", // cs
        "push rax", // rip: resume point == our own return address
        "sub rsp, 16",
        "push rax",
        "push rcx",
        "push rbx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "call {handler}",
        "mov rsp, rax",
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
        "add rsp, 16",
        "iretq",
        handler = sym crate::sched::yield_handler,
    )
}
