//! VeridianOS kernel library.
//!
//! Exposes every kernel subsystem as a module so both the bare-metal binary
//! (`main.rs`) and the host-target unit test harness can exercise them.
//! `#![no_std]` everywhere except under `cfg(test)` on the host target,
//! where the standard library backs the test harness and the global
//! allocator so `alloc`-crate collections work in ordinary `#[test]`s.

#![no_std]
#![cfg_attr(all(test, target_os = "none"), no_main)]
#![feature(abi_x86_interrupt)]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]
// naked_functions is stable since Rust 1.88.0, no feature flag needed.

extern crate alloc;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
use mm::heap::KernelHeap;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
#[global_allocator]
static ALLOCATOR: KernelHeap = KernelHeap;

// Host target (e.g. running `cargo test --lib`): delegate to the system
// allocator so unit tests can use `Vec`/`String`/`Box` normally.
#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

#[macro_use]
pub mod print;

pub mod arch;
pub mod bootstrap;
pub mod drivers;
pub mod error;
pub mod log_service;
pub mod mm;
pub mod sched;
mod syscall;

/// Heap allocation error handler. The `alloc_error_handler` ABI requires
/// `-> !`; a failed kernel-heap allocation is always unrecoverable here
/// since no subsystem retries or reclaims on this path (see `KernelError::OutOfMemory`).
#[cfg(target_os = "none")]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("allocation error: {:?}", layout);
}
