// Interrupt Descriptor Table
//
// Vectors 0-31 are CPU exceptions: all fatal by design, printing a message
// keyed by the exception name and then halting in a loop (double-fault is
// the one exception that truly cannot return, since the frame it receives
// may already be corrupt -- it runs on its own IST stack for the same
// reason). Vector 32 is the remapped timer IRQ and vector 33 the keyboard
// IRQ; 0x80 is the syscall gate. The scheduler's cooperative yield path
// (`sched::do_schedule`) uses no vector at all -- it reaches
// `preempt::cooperative_yield_stub` with an ordinary `call`. Everything else
// is a spare IRQ line the PIC never unmasks, wired to a handler that just
// EOIs and returns.

use lazy_static::lazy_static;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};
use x86_64::VirtAddr;

use super::preempt::timer_interrupt_stub;
use super::{gdt, halt, PICS};

/// Software interrupt vector the syscall gateway is installed at.
pub const SYSCALL_VECTOR: u8 = 0x80;

macro_rules! fatal_no_error_code {
    ($name:ident, $label:expr) => {
        extern "x86-interrupt" fn $name(stack_frame: InterruptStackFrame) {
            crate::println!("[EXCEPTION] {}\n{:#?}", $label, stack_frame);
            halt();
        }
    };
}

macro_rules! fatal_with_error_code {
    ($name:ident, $label:expr) => {
        extern "x86-interrupt" fn $name(stack_frame: InterruptStackFrame, error_code: u64) {
            crate::println!(
                "[EXCEPTION] {} (error code {:#x})\n{:#?}",
                $label,
                error_code,
                stack_frame
            );
            halt();
        }
    };
}

fatal_no_error_code!(divide_error_handler, "DIVIDE ERROR");
fatal_no_error_code!(debug_handler, "DEBUG");
fatal_no_error_code!(nmi_handler, "NON-MASKABLE INTERRUPT");
fatal_no_error_code!(breakpoint_handler, "BREAKPOINT");
fatal_no_error_code!(overflow_handler, "OVERFLOW");
fatal_no_error_code!(bound_range_handler, "BOUND RANGE EXCEEDED");
fatal_no_error_code!(invalid_opcode_handler, "INVALID OPCODE");
fatal_no_error_code!(device_not_available_handler, "DEVICE NOT AVAILABLE");
fatal_no_error_code!(x87_floating_point_handler, "X87 FLOATING POINT");
fatal_no_error_code!(simd_floating_point_handler, "SIMD FLOATING POINT");
fatal_no_error_code!(machine_check_handler, "MACHINE CHECK");

fatal_with_error_code!(invalid_tss_handler, "INVALID TSS");
fatal_with_error_code!(segment_not_present_handler, "SEGMENT NOT PRESENT");
fatal_with_error_code!(stack_segment_fault_handler, "STACK SEGMENT FAULT");
fatal_with_error_code!(general_protection_fault_handler, "GENERAL PROTECTION FAULT");
fatal_with_error_code!(alignment_check_handler, "ALIGNMENT CHECK");

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) -> ! {
    crate::println!(
        "[EXCEPTION] DOUBLE FAULT (error code {:#x})\n{:#?}",
        error_code,
        stack_frame
    );
    halt();
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;

    crate::println!(
        "[EXCEPTION] PAGE FAULT at {:?} (error code {:?})\n{:#?}",
        Cr2::read(),
        error_code,
        stack_frame
    );
    halt();
}

/// IRQ1: PS/2 keyboard. Unlike the timer, this never switches context, so it
/// keeps the ordinary `extern "x86-interrupt"` ABI.
extern "x86-interrupt" fn keyboard_interrupt_handler(_stack_frame: InterruptStackFrame) {
    // SAFETY: port 0x60 is the well-known PS/2 data port; reading it is how
    // the controller releases the IRQ1 condition.
    let scancode: u8 = unsafe { super::inb(0x60) };
    crate::drivers::keyboard::handle_scancode(scancode);
    // SAFETY: called from within IRQ1 dispatch; EOI is always valid here.
    unsafe {
        PICS.lock().notify_end_of_interrupt(super::PIC_1_OFFSET + 1);
    }
}

/// Any remapped IRQ line this kernel never unmasks still needs a present
/// gate -- an unhandled vector is itself a (spurious) GPF. Just EOI both
/// PICs and return.
extern "x86-interrupt" fn spurious_irq_handler(_stack_frame: InterruptStackFrame) {
    // SAFETY: called from IRQ dispatch context; EOI is always valid here.
    unsafe {
        PICS.lock().notify_end_of_interrupt(0xff);
    }
}

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();

        idt.divide_error.set_handler_fn(divide_error_handler);
        idt.debug.set_handler_fn(debug_handler);
        idt.non_maskable_interrupt.set_handler_fn(nmi_handler);
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        idt.overflow.set_handler_fn(overflow_handler);
        idt.bound_range_exceeded.set_handler_fn(bound_range_handler);
        idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
        idt.device_not_available
            .set_handler_fn(device_not_available_handler);
        idt.invalid_tss.set_handler_fn(invalid_tss_handler);
        idt.segment_not_present
            .set_handler_fn(segment_not_present_handler);
        idt.stack_segment_fault
            .set_handler_fn(stack_segment_fault_handler);
        idt.general_protection_fault
            .set_handler_fn(general_protection_fault_handler);
        idt.page_fault.set_handler_fn(page_fault_handler);
        idt.x87_floating_point
            .set_handler_fn(x87_floating_point_handler);
        idt.alignment_check.set_handler_fn(alignment_check_handler);
        idt.machine_check.set_handler_fn(machine_check_handler);
        idt.simd_floating_point
            .set_handler_fn(simd_floating_point_handler);

        // SAFETY: DOUBLE_FAULT_IST_INDEX names a stack the GDT's TSS reserves
        // solely for this handler.
        unsafe {
            idt.double_fault
                .set_handler_fn(double_fault_handler)
                .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
        }

        for vector in 34u8..=47 {
            idt[vector as usize].set_handler_fn(spurious_irq_handler);
        }
        idt[33].set_handler_fn(keyboard_interrupt_handler);

        // SAFETY: timer_interrupt_stub and syscall_entry are naked functions
        // whose entire body is the documented save/dispatch/restore/iretq
        // sequence; installing their address directly (rather than via
        // set_handler_fn, which expects the `x86-interrupt` ABI) is exactly
        // how that contract is met.
        unsafe {
            idt[32].set_handler_addr(VirtAddr::new(timer_interrupt_stub as usize as u64));
            idt[SYSCALL_VECTOR as usize]
                .set_handler_addr(VirtAddr::new(
                    super::syscall::syscall_entry as usize as u64,
                ))
                .set_privilege_level(x86_64::PrivilegeLevel::Ring3)
                .disable_interrupts(false);
        }

        idt
    };
}

pub fn init() {
    IDT.load();
}
