//! `int 0x80` syscall dispatch table.
//!
//! [`syscall_handler`] is called from `arch::x86_64::syscall::syscall_entry`
//! with the six register-passed inputs already translated into ordinary
//! System V argument registers. Unknown syscall numbers return `-1` and log
//! a diagnostic rather than panicking -- a user-mode program firing a typo'd
//! syscall number must not be able to bring the kernel down.

#![allow(dead_code)]

use crate::arch::x86_64::vga::Color;
use crate::{arch, sched};

/// File descriptor [`Syscall::WRITE`] accepts for normal output.
const FD_STDOUT: usize = 1;
/// File descriptor [`Syscall::WRITE`] accepts for error output.
const FD_STDERR: usize = 2;

/// Timer ticks per `SLEEP` millisecond unit (100 Hz -> 10 ms/tick).
const MS_PER_TICK: u64 = 10;

#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Exit = 0,
    Write = 1,
    Read = 2,
    Sleep = 3,
    GetPid = 4,
    GetPPid = 5,
    PrintRainbow = 6,
    PrintCool = 7,
    ScreenBlink = 8,
    PartyMode = 9,
    Beep = 10,
    CursorDance = 11,
}

impl TryFrom<usize> for Syscall {
    type Error = ();

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Exit,
            1 => Self::Write,
            2 => Self::Read,
            3 => Self::Sleep,
            4 => Self::GetPid,
            5 => Self::GetPPid,
            6 => Self::PrintRainbow,
            7 => Self::PrintCool,
            8 => Self::ScreenBlink,
            9 => Self::PartyMode,
            10 => Self::Beep,
            11 => Self::CursorDance,
            _ => return Err(()),
        })
    }
}

/// Entry point `syscall_entry` calls into. `num` is the accumulator-register
/// value; `a1..a5` are base/counter/data/source/destination in that order.
#[no_mangle]
pub extern "C" fn syscall_handler(
    num: usize,
    a1: usize,
    a2: usize,
    a3: usize,
    a4: usize,
    _a5: usize,
) -> isize {
    let Ok(syscall) = Syscall::try_from(num) else {
        log::warn!("unknown syscall number {num}");
        return -1;
    };

    match syscall {
        Syscall::Exit => sys_exit(a1 as i32),
        Syscall::Write => sys_write(a1, a2, a3),
        Syscall::Read => -1,
        Syscall::Sleep => sys_sleep(a1),
        Syscall::GetPid => sched::current_pid() as isize,
        Syscall::GetPPid => sched::current_parent_pid() as isize,
        Syscall::PrintRainbow => sys_print_rainbow(a1, a2),
        Syscall::PrintCool => sys_print_cool(a1, a2),
        Syscall::ScreenBlink => sys_screen_blink(a1, a2),
        Syscall::PartyMode => sys_party_mode(a1),
        Syscall::Beep => sys_beep(a1, a2),
        Syscall::CursorDance => sys_cursor_dance(a1),
    }
}

/// Read up to `len` bytes from `ptr`, stopping early at a NUL. `ptr` is
/// always a kernel-space pointer: every process shares the kernel address
/// space (no user/kernel split in this kernel).
fn read_str<'a>(ptr: usize, len: usize) -> &'a [u8] {
    if ptr == 0 || len == 0 {
        return &[];
    }
    // SAFETY: every process shares the kernel's address space and page
    // tables; the caller is trusted to pass a live pointer, matching this
    // kernel's no-user-mode-isolation non-goal.
    let full = unsafe { core::slice::from_raw_parts(ptr as *const u8, len) };
    match full.iter().position(|&b| b == 0) {
        Some(nul) => &full[..nul],
        None => full,
    }
}

fn sys_exit(code: i32) -> isize {
    sched::exit_current(code);
    sched::do_schedule();
    0
}

fn sys_write(fd: usize, buf: usize, len: usize) -> isize {
    let color = match fd {
        FD_STDOUT => Color::White,
        FD_STDERR => Color::LightRed,
        _ => return -1,
    };
    let bytes = read_str(buf, len);
    crate::arch::x86_64::vga::write_colored_bytes(bytes, color);
    bytes.len() as isize
}

fn sys_sleep(ms: usize) -> isize {
    let ticks = (ms as u64).div_ceil(MS_PER_TICK).max(1);
    let deadline = sched::total_ticks() + ticks;
    while sched::total_ticks() < deadline {
        arch::idle();
    }
    0
}

fn sys_print_rainbow(buf: usize, len: usize) -> isize {
    const PALETTE: [Color; 6] = [
        Color::LightRed,
        Color::Yellow,
        Color::LightGreen,
        Color::LightCyan,
        Color::LightBlue,
        Color::Pink,
    ];
    let bytes = read_str(buf, len);
    for (i, &b) in bytes.iter().enumerate() {
        crate::arch::x86_64::vga::write_colored_bytes(
            core::slice::from_ref(&b),
            PALETTE[i % PALETTE.len()],
        );
    }
    0
}

fn sys_print_cool(buf: usize, len: usize) -> isize {
    let bytes = read_str(buf, len);
    crate::arch::x86_64::vga::write_colored_bytes(bytes, Color::LightCyan);
    0
}

fn sys_screen_blink(count: usize, speed_ms: usize) -> isize {
    for _ in 0..count {
        sys_sleep(speed_ms);
    }
    0
}

fn sys_party_mode(ms: usize) -> isize {
    const PALETTE: [Color; 4] = [Color::Magenta, Color::Yellow, Color::Cyan, Color::LightGreen];
    let ticks = (ms as u64).div_ceil(MS_PER_TICK).max(1);
    let deadline = sched::total_ticks() + ticks;
    let mut i = 0usize;
    while sched::total_ticks() < deadline {
        crate::arch::x86_64::vga::write_colored_bytes(b".", PALETTE[i % PALETTE.len()]);
        i += 1;
        arch::idle();
    }
    0
}

/// Square-wave the PC speaker (PIT channel 2) at `freq` Hz for `ticks` timer
/// ticks. `freq == 0` silences the speaker.
fn sys_beep(freq: usize, ticks: usize) -> isize {
    // SAFETY: ports 0x43 (PIT command), 0x42 (PIT channel 2 data), and 0x61
    // (speaker gate) are the standard PC speaker control registers;
    // programming them here is the well-known square-wave beep sequence.
    unsafe {
        if freq == 0 {
            let gate = arch::x86_64::inb(0x61) & 0xfc;
            arch::x86_64::outb(0x61, gate);
        } else {
            let divisor = (1_193_182u32 / freq as u32) as u16;
            arch::x86_64::outb(0x43, 0xb6);
            arch::x86_64::outb(0x42, (divisor & 0xff) as u8);
            arch::x86_64::outb(0x42, (divisor >> 8) as u8);
            let gate = arch::x86_64::inb(0x61) | 0x03;
            arch::x86_64::outb(0x61, gate);
        }
    }

    let deadline = sched::total_ticks() + ticks as u64;
    while sched::total_ticks() < deadline {
        arch::idle();
    }

    if freq != 0 {
        // SAFETY: same speaker gate register as above.
        unsafe {
            let gate = arch::x86_64::inb(0x61) & 0xfc;
            arch::x86_64::outb(0x61, gate);
        }
    }
    0
}

fn sys_cursor_dance(ticks: usize) -> isize {
    const GLYPHS: [u8; 4] = [b'|', b'/', b'-', b'\\'];
    let deadline = sched::total_ticks() + ticks as u64;
    let mut i = 0usize;
    while sched::total_ticks() < deadline {
        crate::arch::x86_64::vga::write_colored_bytes(
            core::slice::from_ref(&GLYPHS[i % GLYPHS.len()]),
            Color::White,
        );
        i += 1;
        arch::idle();
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_numbers_do_not_parse() {
        assert!(Syscall::try_from(9999).is_err());
    }

    #[test]
    fn known_numbers_round_trip() {
        assert_eq!(Syscall::try_from(0), Ok(Syscall::Exit));
        assert_eq!(Syscall::try_from(4), Ok(Syscall::GetPid));
    }
}
