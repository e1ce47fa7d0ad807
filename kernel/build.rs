use std::{env, path::PathBuf};

fn main() {
    let target = env::var("TARGET").expect("TARGET not set");

    // Get the manifest directory (where Cargo.toml is)
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let kernel_dir = PathBuf::from(manifest_dir);

    // This kernel boots via a hand-rolled Multiboot2 header and builds its
    // own page tables (see arch/x86_64/multiboot.rs, mm/page_table.rs) rather
    // than delegating to a bootloader crate, so it always needs its own
    // linker script to place the header in the first 8 KiB and to expose
    // the __kernel_start/__kernel_end symbols the frame allocator reads.
    //
    // Only apply it to the freestanding bare-metal build (target_os = "none"):
    // `cargo test --lib` builds this same crate for the host triple (e.g.
    // x86_64-unknown-linux-gnu), which also "contains x86_64" but must link
    // against the host's ordinary C runtime, not this kernel's ELF layout.
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target.contains("x86_64") && target_os == "none" {
        let linker_script = kernel_dir.join("src/arch/x86_64/link.ld");
        println!("cargo:rustc-link-arg=-T{}", linker_script.display());
    }

    println!("cargo:rerun-if-changed=src/arch/x86_64/link.ld");
}
