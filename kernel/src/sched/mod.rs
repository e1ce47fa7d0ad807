//! Round-robin preemptive scheduler.
//!
//! Owns the process table, the FIFO ready queue ([`queue`]), and the two
//! Rust-side handlers the naked stubs in `arch::x86_64::preempt` call into:
//! [`preempt_handler`] (timer-driven, switches only on time-slice exhaustion)
//! and [`yield_handler`] (cooperative, always switches). Both share the same
//! on-stack `TrapFrame` shape described in [`process`], so there is exactly
//! one context-restore mechanism in the kernel, even though [`do_schedule`]
//! reaches it through an ordinary function call rather than a real
//! interrupt -- see `arch::x86_64::preempt::cooperative_yield_stub`.

use core::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use spin::Mutex;

use crate::arch::x86_64::{context, PIC_1_OFFSET, PICS};
use crate::error::{KernelError, KernelResult};
use crate::mm::heap;

pub mod process;
mod queue;

use process::{Pcb, ProcessState, MAX_PROCESSES, PROCESS_STACK_SIZE, TIME_SLICE_TICKS};

/// Vector the timer stub fires on; see `arch::x86_64::preempt`.
const TIMER_VECTOR: u8 = PIC_1_OFFSET;

/// pid reserved for the idle process, created lazily by [`scheduler_start`].
const IDLE_PID: u64 = 0;

/// Ticks since boot. Tracked outside the scheduler's own `Mutex` so logging
/// and `SLEEP` deadlines can read it without risking a self-deadlock from
/// inside `preempt_handler`, which already holds [`SCHEDULER`] while it runs.
static TOTAL_TICKS: AtomicU64 = AtomicU64::new(0);

pub struct Scheduler {
    table: [Option<Pcb>; MAX_PROCESSES],
    head: Option<usize>,
    tail: Option<usize>,
    current: Option<usize>,
    next_pid: u64,
    process_count: usize,
    /// pid of a Terminated process that was just switched away from and
    /// still needs [`process_kill`] run against it -- deferred because the
    /// switch-out handler is still executing on that process's own kernel
    /// stack at the point it notices `Terminated`.
    pending_reap: Option<u64>,
}

impl Scheduler {
    pub const fn new() -> Self {
        const EMPTY: Option<Pcb> = None;
        Self {
            table: [EMPTY; MAX_PROCESSES],
            head: None,
            tail: None,
            current: None,
            next_pid: 1,
            process_count: 0,
            pending_reap: None,
        }
    }

    fn free_slot(&self) -> Option<usize> {
        self.table.iter().position(Option::is_none)
    }
}

lazy_static! {
    static ref SCHEDULER: Mutex<Scheduler> = Mutex::new(Scheduler::new());
}

/// Ticks elapsed since boot (10 ms each, at 100 Hz).
pub fn total_ticks() -> u64 {
    TOTAL_TICKS.load(Ordering::Relaxed)
}

/// Diagnostic snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SchedStats {
    pub total_ticks: u64,
    pub process_count: usize,
    pub current_pid: u64,
}

pub fn scheduler_stats() -> SchedStats {
    let sched = SCHEDULER.lock();
    SchedStats {
        total_ticks: total_ticks(),
        process_count: sched.process_count,
        current_pid: current_slot_pid(&sched),
    }
}

fn current_slot_pid(sched: &Scheduler) -> u64 {
    sched
        .current
        .and_then(|s| sched.table[s].as_ref())
        .map(|p| p.pid)
        .unwrap_or(0)
}

/// The currently running process's pid, or 0 if none.
pub fn current_pid() -> u64 {
    current_slot_pid(&SCHEDULER.lock())
}

/// The currently running process's parent pid, or 0 if none.
pub fn current_parent_pid() -> u64 {
    let sched = SCHEDULER.lock();
    sched
        .current
        .and_then(|s| sched.table[s].as_ref())
        .map(|p| p.parent_pid)
        .unwrap_or(0)
}

pub fn init() {
    crate::println!("[SCHED] Process table ready ({} slots)", MAX_PROCESSES);
}

/// Create a new process in state Ready, enqueued at the tail. Rejects the
/// request once the process table is full rather than evicting anything.
pub fn process_create(
    name: &str,
    entry: extern "C" fn() -> !,
    priority: u8,
) -> KernelResult<u64> {
    let mut sched = SCHEDULER.lock();
    if sched.process_count >= MAX_PROCESSES {
        return Err(KernelError::TooManyProcesses);
    }
    let slot = sched.free_slot().ok_or(KernelError::TooManyProcesses)?;

    let stack_base = heap::alloc(PROCESS_STACK_SIZE);
    if stack_base.is_null() {
        return Err(KernelError::OutOfMemory);
    }

    let pid = sched.next_pid;
    let parent_pid = current_slot_pid(&sched);

    // SAFETY: stack_base is a freshly allocated PROCESS_STACK_SIZE region
    // this PCB now owns exclusively.
    let pcb = unsafe { Pcb::new(pid, parent_pid, name, entry, priority, stack_base as usize) };

    sched.table[slot] = Some(pcb);
    sched.next_pid += 1;
    sched.process_count += 1;
    queue::enqueue(&mut sched, slot);

    Ok(pid)
}

/// Terminate and reclaim a process's resources. A no-op if `pid` is unknown
/// (tolerant, matching the allocator layer's double-free tolerance). Must
/// never be called against the currently running process's own stack; use
/// [`exit_current`] for that.
pub fn process_kill(pid: u64) {
    let mut sched = SCHEDULER.lock();
    let Some(slot) = sched
        .table
        .iter()
        .position(|p| p.as_ref().map(|p| p.pid) == Some(pid))
    else {
        return;
    };

    queue::remove(&mut sched, slot);
    if sched.current == Some(slot) {
        sched.current = None;
    }
    let stack_base = sched.table[slot].as_ref().map(|p| p.kernel_stack_base);
    sched.table[slot] = None;
    sched.process_count -= 1;
    drop(sched);

    if let Some(base) = stack_base {
        heap::free(base as *mut u8);
    }
}

/// Mark the running process Terminated without touching its stack (it's
/// running on it right now). Resource reclamation happens in a later
/// `process_kill` pass.
pub fn exit_current(_exit_code: i32) {
    let mut sched = SCHEDULER.lock();
    if let Some(cur) = sched.current {
        if let Some(p) = sched.table[cur].as_mut() {
            p.state = ProcessState::Terminated;
        }
    }
}

/// Voluntarily give up the remainder of the current time slice.
///
/// An ordinary function call, not a second interrupt gate: resolves to
/// `arch::x86_64::preempt::cooperative_yield_stub`, which manufactures its
/// own interrupt-return tail and falls through the same save/dispatch/
/// restore/`iretq` sequence the timer path uses; see [`yield_handler`].
pub fn do_schedule() {
    // SAFETY: cooperative_yield_stub's only contract is "call it directly,
    // from ring 0, with interrupts enabled" -- all true of every caller in
    // this kernel.
    unsafe {
        crate::arch::x86_64::preempt::cooperative_yield_stub();
    }
}

extern "C" fn idle_entry() -> ! {
    loop {
        crate::arch::idle();
    }
}

/// Create the idle process (pid 0) if it doesn't already exist. Guarantees
/// the ready queue is never truly empty once the scheduler has started.
fn ensure_idle_process() {
    let mut sched = SCHEDULER.lock();
    if sched
        .table
        .iter()
        .any(|p| p.as_ref().map(|p| p.pid) == Some(IDLE_PID))
    {
        return;
    }
    let slot = sched
        .free_slot()
        .expect("process table full before idle process could be created");
    let stack = heap::alloc(PROCESS_STACK_SIZE);
    assert!(!stack.is_null(), "out of memory creating idle process");
    // SAFETY: stack is a freshly allocated PROCESS_STACK_SIZE region this
    // PCB now owns exclusively.
    let pcb =
        unsafe { Pcb::new(IDLE_PID, IDLE_PID, "idle", idle_entry, u8::MAX, stack as usize) };
    sched.table[slot] = Some(pcb);
    sched.process_count += 1;
    queue::enqueue(&mut sched, slot);
}

/// Pop the head of the ready queue, mark it Running, and transfer control to
/// it. Never returns.
pub fn scheduler_start() -> ! {
    ensure_idle_process();

    let first_sp = {
        let mut sched = SCHEDULER.lock();
        let slot = queue::dequeue(&mut sched).expect("ready queue empty at scheduler_start");
        let p = sched.table[slot].as_mut().expect("dequeued slot is empty");
        p.state = ProcessState::Running;
        p.time_slice_remaining = TIME_SLICE_TICKS;
        sched.current = Some(slot);
        p.saved_sp
    };

    // SAFETY: first_sp points at the TrapFrame Pcb::new built on a kernel
    // stack owned solely by that process.
    unsafe { context::enter_first_frame(first_sp) }
}

/// Timer-tick dispatcher: called by `preempt::timer_interrupt_stub` with the
/// interrupted frame's stack pointer. Implements the contract in full: tick
/// bookkeeping, EOI before any switch, and a conditional rotation of the
/// ready queue on time-slice exhaustion.
#[no_mangle]
pub extern "C" fn preempt_handler(saved_sp: usize) -> usize {
    TOTAL_TICKS.fetch_add(1, Ordering::Relaxed);

    // SAFETY: called only from the timer ISR; EOI must precede any possible
    // switch so the next tick can reach whichever process ends up running.
    unsafe {
        PICS.lock().notify_end_of_interrupt(TIMER_VECTOR);
    }

    let mut sched = SCHEDULER.lock();
    let Some(cur) = sched.current else {
        return saved_sp;
    };

    let (terminated, slice_remaining) = match sched.table[cur].as_mut() {
        Some(p) => {
            if p.state == ProcessState::Terminated {
                (true, 0)
            } else {
                p.total_ticks += 1;
                if p.time_slice_remaining > 0 {
                    p.time_slice_remaining -= 1;
                }
                (false, p.time_slice_remaining)
            }
        }
        None => return saved_sp,
    };

    if !terminated && slice_remaining > 0 {
        return saved_sp;
    }

    if terminated {
        sched.pending_reap = sched.table[cur].as_ref().map(|p| p.pid);
    } else {
        sched.table[cur].as_mut().unwrap().saved_sp = saved_sp;
        sched.table[cur].as_mut().unwrap().state = ProcessState::Ready;
        queue::enqueue(&mut sched, cur);
    }

    let next = queue::dequeue(&mut sched).unwrap_or(cur);
    let p = sched.table[next].as_mut().unwrap();
    p.state = ProcessState::Running;
    p.time_slice_remaining = TIME_SLICE_TICKS;
    let next_sp = p.saved_sp;
    sched.current = Some(next);
    let reap = sched.pending_reap.take();
    drop(sched);
    if let Some(pid) = reap {
        process_kill(pid);
    }
    next_sp
}

/// Cooperative-yield dispatcher: called by `preempt::cooperative_yield_stub`.
/// Unlike [`preempt_handler`] this always switches (subject to there being
/// another ready process); a Terminated caller (the `EXIT` path, via
/// [`exit_current`]) is not re-enqueued -- it never runs again, and its PCB
/// slot and stack are reclaimed as soon as the switch lands somewhere else.
#[no_mangle]
pub extern "C" fn yield_handler(saved_sp: usize) -> usize {
    let mut sched = SCHEDULER.lock();
    let Some(cur) = sched.current else {
        return saved_sp;
    };

    if let Some(p) = sched.table[cur].as_mut() {
        if p.state != ProcessState::Terminated {
            p.saved_sp = saved_sp;
            p.state = ProcessState::Ready;
            queue::enqueue(&mut sched, cur);
        } else {
            sched.pending_reap = Some(p.pid);
        }
    }

    let Some(next) = queue::dequeue(&mut sched) else {
        // Nothing runnable -- should not happen once the idle process
        // exists, but fall back to the caller's own frame rather than
        // returning an invalid stack pointer.
        sched.current = None;
        return saved_sp;
    };

    let p = sched.table[next].as_mut().unwrap();
    p.state = ProcessState::Running;
    p.time_slice_remaining = TIME_SLICE_TICKS;
    let next_sp = p.saved_sp;
    sched.current = Some(next);
    let reap = sched.pending_reap.take();
    drop(sched);
    if let Some(pid) = reap {
        process_kill(pid);
    }
    next_sp
}
