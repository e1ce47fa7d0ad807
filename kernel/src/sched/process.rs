//! Process control blocks and the trap-frame layout a suspended process is
//! resumed from.
//!
//! A process's saved register file always has the same on-stack shape,
//! whether it got there via the timer interrupt (`preempt_handler`) or via a
//! cooperative call to `do_schedule`: both paths fall through the same
//! install-pointer-then-`iretq` trampoline in `arch::x86_64::preempt`, so
//! there is exactly one frame shape to reason about. `do_schedule` reaches
//! that trampoline with an ordinary function call rather than a second
//! interrupt gate -- see `arch::x86_64::preempt::cooperative_yield_stub`,
//! which manufactures the interrupt-return tail a real interrupt would have
//! given it for free.

use crate::arch::x86_64::gdt;

/// Maximum live processes. The original C source budgeted 256; a teaching
/// kernel with a fixed-size table backing a ready queue of stable slot
/// indices needs far fewer to exercise the same invariants.
pub const MAX_PROCESSES: usize = 64;
/// Bytes reserved for each process's kernel stack.
pub const PROCESS_STACK_SIZE: usize = 8192;
/// Priority assigned when the caller doesn't specify one. Stored, not yet
/// consulted by the scheduling policy (round-robin ignores it).
pub const DEFAULT_PRIORITY: u8 = 128;
/// Ticks a process runs before involuntary preemption (200 ms at 100 Hz).
pub const TIME_SLICE_TICKS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Waiting,
    Sleeping,
    Terminated,
}

/// The register file a suspended process is resumed from, laid out bottom
/// (lowest address, popped first) to top exactly as `preempt.rs`'s
/// trampoline expects.
///
/// `rsp`/`ss` are carried for structural symmetry with the frame this
/// kernel's own entry stub would push if it ever ran at a different
/// privilege level; since every process shares ring 0 (no user-mode
/// non-goal), `iretq` here never pops them -- execution simply continues
/// using whatever `rsp` the trampoline installed before `iretq`, which lands
/// exactly on this struct's `rip` field. They're still written so the layout
/// matches the 17-GPR-slot-plus-five-field shape literally.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    _pad: [u64; 2],
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl TrapFrame {
    const fn zeroed() -> Self {
        Self {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            r11: 0,
            r10: 0,
            r9: 0,
            r8: 0,
            rbp: 0,
            rdi: 0,
            rsi: 0,
            rdx: 0,
            rcx: 0,
            rbx: 0,
            rax: 0,
            _pad: [0; 2],
            rip: 0,
            cs: 0,
            rflags: 0,
            rsp: 0,
            ss: 0,
        }
    }
}

const NAME_CAP: usize = 31;

pub struct Pcb {
    pub pid: u64,
    pub parent_pid: u64,
    name_buf: [u8; NAME_CAP],
    name_len: u8,
    pub state: ProcessState,
    /// Pointer to this process's `TrapFrame`, sitting near the top of its
    /// kernel stack. Valid whenever `state != Running` for the current CPU.
    pub saved_sp: usize,
    pub kernel_stack_base: usize,
    pub kernel_stack_top: usize,
    /// Always zero: processes share the kernel address space and privilege
    /// level, so there is no separate user-mode stack to back (non-goal).
    pub user_stack_base: usize,
    pub user_stack_top: usize,
    /// `None` means "shares the kernel root" -- the only option exercised,
    /// since per-process address spaces are a non-goal.
    pub page_table_root: Option<u64>,
    pub priority: u8,
    pub time_slice_remaining: u32,
    pub total_ticks: u64,
    pub wake_tick: u64,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl Pcb {
    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name_buf[..self.name_len as usize]).unwrap_or("")
    }

    /// Build a fresh PCB whose trap frame will `iretq` straight into `entry`
    /// with interrupts enabled, the first time it's dispatched.
    ///
    /// # Safety
    /// `kernel_stack_base` must be the start of a `PROCESS_STACK_SIZE`-byte
    /// region this PCB now owns exclusively (typically just returned by
    /// `heap::alloc`).
    pub unsafe fn new(
        pid: u64,
        parent_pid: u64,
        name: &str,
        entry: extern "C" fn() -> !,
        priority: u8,
        kernel_stack_base: usize,
    ) -> Self {
        let kernel_stack_top = kernel_stack_base + PROCESS_STACK_SIZE;
        let frame_addr = kernel_stack_top - core::mem::size_of::<TrapFrame>();

        let mut frame = TrapFrame::zeroed();
        frame.rip = entry as usize as u64;
        frame.cs = gdt::selectors().code_selector.0 as u64;
        frame.rflags = 0x202; // IF set, reserved bit 1 set
        frame.rsp = kernel_stack_top as u64;
        frame.ss = gdt::selectors().data_selector.0 as u64;

        // SAFETY: frame_addr lies within the caller-owned kernel stack
        // region and is large enough for a TrapFrame (stack size minus the
        // frame size is well above zero for PROCESS_STACK_SIZE).
        unsafe {
            (frame_addr as *mut TrapFrame).write(frame);
        }

        let mut name_buf = [0u8; NAME_CAP];
        let name_len = name.len().min(NAME_CAP);
        name_buf[..name_len].copy_from_slice(&name.as_bytes()[..name_len]);

        Self {
            pid,
            parent_pid,
            name_buf,
            name_len: name_len as u8,
            state: ProcessState::Ready,
            saved_sp: frame_addr,
            kernel_stack_base,
            kernel_stack_top,
            user_stack_base: 0,
            user_stack_top: 0,
            page_table_root: None,
            priority,
            time_slice_remaining: TIME_SLICE_TICKS,
            total_ticks: 0,
            wake_tick: 0,
            prev: None,
            next: None,
        }
    }

    /// Build a PCB for queue-discipline tests, without touching memory at a
    /// synthesized stack address the way `new` does.
    #[cfg(test)]
    pub fn new_for_test(pid: u64) -> Self {
        Self {
            pid,
            parent_pid: 0,
            name_buf: [0; NAME_CAP],
            name_len: 0,
            state: ProcessState::Ready,
            saved_sp: 0,
            kernel_stack_base: 0,
            kernel_stack_top: 0,
            user_stack_base: 0,
            user_stack_top: 0,
            page_table_root: None,
            priority: DEFAULT_PRIORITY,
            time_slice_remaining: TIME_SLICE_TICKS,
            total_ticks: 0,
            wake_tick: 0,
            prev: None,
            next: None,
        }
    }
}
