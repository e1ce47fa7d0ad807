//! Kernel bootstrap: brings up every CORE subsystem in dependency order and
//! creates the initial demo processes before handing off to the scheduler.
//!
//! Stage banners come from `arch::x86_64::bootstrap`, one pair per component
//! in `SPEC_FULL.md`'s system-overview table. `main::kernel_main` calls
//! [`init`] once, after `BootInfo::parse` has already validated the loader
//! magic, and transfers control to `sched::scheduler_start()` on success.

use crate::arch::x86_64::bootstrap as stage;
use crate::arch::x86_64::multiboot::BootInfo;
use crate::error::KernelResult;
use crate::mm::{frame_allocator, heap, page_table};
use crate::sched::process::DEFAULT_PRIORITY;
use crate::syscall::Syscall;
use crate::{arch, drivers, early_println, log_service, mm, println, sched};

pub fn init(boot_info: &BootInfo) -> KernelResult<()> {
    stage::stage1_start();
    if let Some(name) = boot_info.bootloader_name() {
        early_println!("[BOOT] loader: {}", name);
    }
    if let Some((lower, upper)) = boot_info.basic_meminfo() {
        early_println!("[BOOT] memory: {} KiB lower, {} KiB upper", lower, upper);
    }
    stage::stage1_complete();

    stage::stage2_start();
    frame_allocator::init(boot_info);
    let frames = frame_allocator::stats();
    early_println!(
        "[BOOT] frames: {} total, {} free",
        frames.total_frames,
        frames.free_frames
    );
    stage::stage2_complete();

    stage::stage3_start();
    page_table::init();
    stage::stage3_complete();

    stage::stage4_start();
    heap::init()?;
    stage::stage4_complete();

    stage::stage5_start();
    arch::x86_64::init();
    log_service::init();
    drivers::init();
    stage::stage5_complete();

    stage::stage6_start();
    sched::init();
    create_demo_processes()?;
    stage::stage6_complete();

    stage::stage7_start();
    // Vector 0x80 (and the cooperative-yield vector 0x81) were installed
    // into the IDT by `arch::x86_64::init()` in stage 5; there is nothing
    // left to wire here beyond announcing readiness.
    stage::stage7_complete();

    let stats = mm::stats();
    println!(
        "[BOOT] heap: {}/{} bytes used, {} free blocks, {} used blocks",
        stats.heap.used_bytes, stats.heap.total_bytes, stats.heap.free_blocks, stats.heap.used_blocks
    );

    Ok(())
}

/// Invoke the `int 0x80` syscall gateway with up to three arguments,
/// mirroring the `SYSCALL(num, a, b, c)` macro in
/// `examples/original_source/kernel/test_syscalls.c`. `rbx`/`rcx`/`rdx`
/// come back unchanged -- the stub in `arch::x86_64::syscall` restores every
/// register but `rax`, which carries the dispatcher's return value.
unsafe fn syscall3(num: usize, a1: usize, a2: usize, a3: usize) -> isize {
    let ret: usize;
    // SAFETY: vector 0x80 is a trap gate installed by `arch::x86_64::init()`
    // during stage 5, which has already run by the time any demo process
    // (and thus this function) executes.
    unsafe {
        core::arch::asm!(
            "int 0x80",
            inout("rax") num => ret,
            in("rbx") a1,
            in("rcx") a2,
            in("rdx") a3,
            options(nostack),
        );
    }
    ret as isize
}

const FD_STDOUT: usize = 1;

/// Demo process exercising the decorative display syscalls, grounded on
/// `test_syscall_fun` in `examples/original_source/kernel/test_syscalls.c`.
extern "C" fn demo_fun_process() -> ! {
    let msg = b"[demo-fun] hello from a rainbow!\n";
    // SAFETY: msg is a 'static byte slice; its pointer/len stay valid for
    // the duration of the syscall.
    unsafe {
        syscall3(
            Syscall::PrintRainbow as usize,
            msg.as_ptr() as usize,
            msg.len(),
            0,
        );
    }
    let cool = b"[demo-fun] and some cool text too\n";
    // SAFETY: same as above.
    unsafe {
        syscall3(Syscall::PrintCool as usize, cool.as_ptr() as usize, cool.len(), 0);
    }
    // SAFETY: EXIT takes no pointer arguments.
    unsafe {
        syscall3(Syscall::Exit as usize, 0, 0, 0);
    }
    unreachable!("a terminated process never returns from its yield");
}

/// Demo process exercising the core identity/IO syscalls, grounded on
/// `test_syscall_core` in `examples/original_source/kernel/test_syscalls.c`.
extern "C" fn demo_core_process() -> ! {
    // SAFETY: GETPID/GETPPID take no pointer arguments.
    let (pid, ppid) = unsafe {
        (
            syscall3(Syscall::GetPid as usize, 0, 0, 0),
            syscall3(Syscall::GetPPid as usize, 0, 0, 0),
        )
    };
    let line = b"[demo-core] pid/ppid queried via int 0x80\n";
    // SAFETY: line is a 'static byte slice.
    unsafe {
        syscall3(Syscall::Write as usize, FD_STDOUT, line.as_ptr() as usize, line.len());
    }
    let _ = (pid, ppid);
    // SAFETY: EXIT takes no pointer arguments.
    unsafe {
        syscall3(Syscall::Exit as usize, 0, 0, 0);
    }
    unreachable!("a terminated process never returns from its yield");
}

/// Demo process exercising the party-mode decorative syscall, grounded on
/// `test_syscall_party` in `examples/original_source/kernel/test_syscalls.c`.
extern "C" fn demo_party_process() -> ! {
    // SAFETY: PARTY_MODE takes a millisecond count, no pointer arguments.
    unsafe {
        syscall3(Syscall::PartyMode as usize, 200, 0, 0);
    }
    // SAFETY: EXIT takes no pointer arguments.
    unsafe {
        syscall3(Syscall::Exit as usize, 0, 0, 0);
    }
    unreachable!("a terminated process never returns from its yield");
}

fn create_demo_processes() -> KernelResult<()> {
    sched::process_create("demo-fun", demo_fun_process, DEFAULT_PRIORITY)?;
    sched::process_create("demo-core", demo_core_process, DEFAULT_PRIORITY)?;
    sched::process_create("demo-party", demo_party_process, DEFAULT_PRIORITY)?;
    Ok(())
}
