//! Device drivers.
//!
//! The only device this kernel talks to beyond the VGA text buffer and the
//! serial/PIT/PIC plumbing already handled in `arch` is the PS/2 keyboard.

pub mod keyboard;

/// Initialize all drivers.
pub fn init() {
    crate::println!("[DRIVERS] Initializing device drivers...");
    keyboard::init();
    crate::println!("[DRIVERS] Device drivers initialized");
}
