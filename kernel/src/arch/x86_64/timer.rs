//! PIT (8253/8254) programming for the 100 Hz scheduler tick.
//!
//! Tick counting itself lives in `sched::preempt_handler`, which owns the
//! authoritative count alongside the rest of its scheduling state; this
//! module's only job is getting the PIT to actually fire vector 32 at the
//! rate the scheduler assumes.

/// PIT input clock frequency, in Hz.
const PIT_FREQUENCY: u32 = 1_193_182;
/// Target tick rate. `SLEEP` and the decorative syscalls convert millisecond
/// arguments assuming exactly this.
const TICK_HZ: u32 = 100;
/// Channel 0, lobyte/hibyte access, mode 3 (square wave rate generator).
const PIT_COMMAND: u8 = 0x36;

/// Ticks elapsed since boot, delegating to the scheduler's own counter so
/// there is a single source of truth for "how much time has passed."
pub fn get_ticks() -> u64 {
    crate::sched::total_ticks()
}

/// Program PIT channel 0 to fire at [`TICK_HZ`] and wire it to IRQ0.
pub fn setup_timer() {
    let divisor = (PIT_FREQUENCY / TICK_HZ) as u16;

    // SAFETY: ports 0x43 (PIT command) and 0x40 (channel 0 data) are the
    // standard PIT control registers; this is the documented
    // command-then-lobyte-then-hibyte programming sequence.
    unsafe {
        super::outb(0x43, PIT_COMMAND);
        super::outb(0x40, (divisor & 0xff) as u8);
        super::outb(0x40, (divisor >> 8) as u8);
    }

    crate::println!("[TIMER] PIT configured for {TICK_HZ}Hz (divisor {divisor})");
}
