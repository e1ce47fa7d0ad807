// Staged boot banners, one pair per CORE component in dependency order (see
// SPEC_FULL.md's system-overview table): boot-info parser, frame allocator,
// virtual-memory mapper, kernel heap, interrupt layer, scheduler/processes,
// syscall gateway. `crate::bootstrap::init` calls these around each
// subsystem's own `init()`.

use crate::early_println;

pub fn stage1_start() {
    early_println!("[BOOTSTRAP] Starting kernel initialization...");
    early_println!("[BOOTSTRAP] Stage 1: Boot-info parser");
}

pub fn stage1_complete() {
    early_println!("[BOOTSTRAP] Boot-info parsed");
}

pub fn stage2_start() {
    early_println!("[BOOTSTRAP] Stage 2: Frame allocator");
}

pub fn stage2_complete() {
    early_println!("[BOOTSTRAP] Frame allocator initialized");
}

pub fn stage3_start() {
    early_println!("[BOOTSTRAP] Stage 3: Virtual memory mapper");
}

pub fn stage3_complete() {
    early_println!("[BOOTSTRAP] Virtual memory mapper initialized");
}

pub fn stage4_start() {
    early_println!("[BOOTSTRAP] Stage 4: Kernel heap");
}

pub fn stage4_complete() {
    early_println!("[BOOTSTRAP] Kernel heap initialized");
}

pub fn stage5_start() {
    early_println!("[BOOTSTRAP] Stage 5: Interrupt layer");
}

pub fn stage5_complete() {
    early_println!("[BOOTSTRAP] Interrupt layer initialized, IRQ0/IRQ1 unmasked");
}

pub fn stage6_start() {
    early_println!("[BOOTSTRAP] Stage 6: Scheduler / processes");
}

pub fn stage6_complete() {
    early_println!("[BOOTSTRAP] Initial processes created");
}

pub fn stage7_start() {
    early_println!("[BOOTSTRAP] Stage 7: Syscall gateway");
}

pub fn stage7_complete() {
    early_println!("[BOOTSTRAP] Syscall gateway ready");
    early_println!("[KERNEL] Boot sequence complete!");
    early_println!("BOOTOK");
}
