//! PS/2 keyboard driver for x86_64.
//!
//! Scancode Set 1 decoding is hand-rolled against two 128-entry lookup
//! tables (unshifted / shifted) rather than pulled in from a crate: the
//! kernel only ever needs plain ASCII out of this, and set 1's layout is
//! small enough that a table beats a dependency. Bit 7 of the scancode
//! marks a key-release; everything else is a make code indexing straight
//! into the tables. Decoded bytes land in a single-producer (IRQ1)
//! single-consumer (syscall/shell) ring buffer.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Check if the keyboard driver has been initialized.
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// Bitmask: Shift is held.
pub const MOD_SHIFT: u8 = 0x01;
/// Bitmask: Ctrl is held.
pub const MOD_CTRL: u8 = 0x02;
/// Bitmask: Alt is held.
pub const MOD_ALT: u8 = 0x04;

static MODIFIER_STATE: AtomicU8 = AtomicU8::new(0);

/// Get the current modifier key bitmask.
pub fn get_modifiers() -> u8 {
    MODIFIER_STATE.load(Ordering::Relaxed)
}

fn update_modifier(bit: u8, down: bool) {
    if down {
        MODIFIER_STATE.fetch_or(bit, Ordering::Relaxed);
    } else {
        MODIFIER_STATE.fetch_and(!bit, Ordering::Relaxed);
    }
}

/// Release flag: set 1 marks key-up by setting the top bit of the make code.
const RELEASE_BIT: u8 = 0x80;

const SCANCODE_LSHIFT: u8 = 0x2a;
const SCANCODE_RSHIFT: u8 = 0x36;
const SCANCODE_LCTRL: u8 = 0x1d;
const SCANCODE_LALT: u8 = 0x38;

/// Unshifted ASCII for each scancode set 1 make code, 0 where there is no
/// printable mapping.
#[rustfmt::skip]
const UNSHIFTED: [u8; 128] = [
    0,    0x1b, b'1', b'2', b'3', b'4', b'5', b'6',
    b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t',
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i',
    b'o', b'p', b'[', b']', b'\n', 0,    b'a', b's',
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';',
    b'\'',b'`', 0,    b'\\',b'z', b'x', b'c', b'v',
    b'b', b'n', b'm', b',', b'.', b'/', 0,    b'*',
    0,    b' ', 0,    0,    0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    b'7',
    b'8', b'9', b'-', b'4', b'5', b'6', b'+', b'1',
    b'2', b'3', b'0', b'.', 0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    0,
];

/// Shifted ASCII for each make code, same layout as [`UNSHIFTED`].
#[rustfmt::skip]
const SHIFTED: [u8; 128] = [
    0,    0x1b, b'!', b'@', b'#', b'$', b'%', b'^',
    b'&', b'*', b'(', b')', b'_', b'+', 0x08, b'\t',
    b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I',
    b'O', b'P', b'{', b'}', b'\n', 0,    b'A', b'S',
    b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':',
    b'"', b'~', 0,    b'|', b'Z', b'X', b'C', b'V',
    b'B', b'N', b'M', b'<', b'>', b'?', 0,    b'*',
    0,    b' ', 0,    0,    0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    b'7',
    b'8', b'9', b'-', b'4', b'5', b'6', b'+', b'1',
    b'2', b'3', b'0', b'.', 0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    0,
    0,    0,    0,    0,    0,    0,    0,    0,
];

/// Ring buffer size for decoded key bytes (must be power of 2).
const KEY_BUFFER_SIZE: usize = 256;

/// Single-producer (IRQ1) single-consumer (shell/syscall) ring buffer.
struct KeyBuffer {
    buf: [u8; KEY_BUFFER_SIZE],
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl KeyBuffer {
    const fn new() -> Self {
        Self {
            buf: [0; KEY_BUFFER_SIZE],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    fn push(&mut self, byte: u8) {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) & (KEY_BUFFER_SIZE - 1);
        let tail = self.tail.load(Ordering::Acquire);
        if next == tail {
            return; // full, drop
        }
        self.buf[head] = byte;
        self.head.store(next, Ordering::Release);
    }

    fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let byte = self.buf[tail];
        self.tail
            .store((tail + 1) & (KEY_BUFFER_SIZE - 1), Ordering::Release);
        Some(byte)
    }
}

// SAFETY: push is only ever called from IRQ1 (single producer), pop only
// from the shell/syscall path (single consumer); head/tail are atomics.
unsafe impl Send for KeyBuffer {}
unsafe impl Sync for KeyBuffer {}

static mut KEY_BUFFER: KeyBuffer = KeyBuffer::new();

pub fn init() {
    INITIALIZED.store(true, Ordering::Release);
}

/// Decode one scancode set 1 byte from IRQ1 and push any resulting ASCII
/// byte to the ring buffer. Must not call `println!` or touch a lock also
/// taken by the serial/VGA print path.
pub fn handle_scancode(scancode: u8) {
    let is_release = scancode & RELEASE_BIT != 0;
    let code = scancode & !RELEASE_BIT;

    match code {
        SCANCODE_LSHIFT | SCANCODE_RSHIFT => {
            update_modifier(MOD_SHIFT, !is_release);
            return;
        }
        SCANCODE_LCTRL => {
            update_modifier(MOD_CTRL, !is_release);
            return;
        }
        SCANCODE_LALT => {
            update_modifier(MOD_ALT, !is_release);
            return;
        }
        _ => {}
    }

    if is_release {
        return;
    }

    let table = if get_modifiers() & MOD_SHIFT != 0 {
        &SHIFTED
    } else {
        &UNSHIFTED
    };

    let Some(&byte) = table.get(code as usize) else {
        return;
    };
    if byte == 0 {
        return;
    }

    // SAFETY: sole producer, called from IRQ1 with interrupts disabled.
    #[allow(static_mut_refs)]
    unsafe {
        KEY_BUFFER.push(byte);
    }
}

/// Read a decoded key byte (non-blocking).
pub fn read_key() -> Option<u8> {
    // SAFETY: sole consumer, called from the shell/syscall path.
    #[allow(static_mut_refs)]
    unsafe {
        KEY_BUFFER.pop()
    }
}

/// Read a decoded key byte, blocking until one is available. Spins on
/// `hlt` rather than a busy-wait so the CPU stays parked between IRQ1s --
/// the timer tick still wakes it every 10ms even if no key arrives.
pub fn keyboard_getchar() -> u8 {
    loop {
        if let Some(byte) = read_key() {
            return byte;
        }
        crate::arch::idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_boundary_decodes_mixed_case() {
        // a-down, b-down, c-down, shift-down, a-down, shift-up
        let sequence = [0x1e, 0x30, 0x2e, 0x2a, 0x1e, 0xaa];
        MODIFIER_STATE.store(0, Ordering::Relaxed);
        for &sc in &sequence {
            handle_scancode(sc);
        }
        let mut decoded = alloc::vec::Vec::new();
        while let Some(b) = read_key() {
            decoded.push(b);
        }
        assert_eq!(decoded, b"abcA");
    }

    #[test]
    fn release_then_shift_sequence_decodes_to_abca() {
        // press a, press b, press c, release a, press shift, press a, release shift
        let sequence = [0x1e, 0x30, 0x2e, 0x9e, 0x2a, 0x1e, 0xaa];
        MODIFIER_STATE.store(0, Ordering::Relaxed);
        for &sc in &sequence {
            handle_scancode(sc);
        }
        let mut decoded = alloc::vec::Vec::new();
        while let Some(b) = read_key() {
            decoded.push(b);
        }
        assert_eq!(decoded, b"abcA");
    }
}
