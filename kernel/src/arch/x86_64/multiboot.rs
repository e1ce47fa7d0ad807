//! Multiboot2 header emission and boot-info tag parser.
//!
//! The header below is read by the loader before the CPU enters long mode;
//! it is emitted via `global_asm!` into its own section so the linker script
//! can place it within the first 8 KiB of the image, as Multiboot2 requires.
//! [`BootInfo`] parses the tagged info blob the loader hands back to the
//! kernel entry point (in `rbx`, with the magic value in `rax`).

use core::arch::global_asm;

use crate::error::{KernelError, KernelResult};

/// Magic value the loader passes in `eax`, confirming Multiboot2 boot.
pub const MULTIBOOT2_BOOTLOADER_MAGIC: u32 = 0x36d76289;

global_asm!(
    r#"
.section .multiboot_header, "a"
.align 8
multiboot_header_start:
    .long 0xe85250d6                                      // magic
    .long 0                                               // architecture: i386
    .long multiboot_header_end - multiboot_header_start   // header length
    .long -(0xe85250d6 + 0 + (multiboot_header_end - multiboot_header_start))

    // End tag
    .word 0
    .word 0
    .long 8
multiboot_header_end:
"#
);

// ---------------------------------------------------------------------------
// Tag-walking parser
// ---------------------------------------------------------------------------

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagType {
    End = 0,
    BootLoaderName = 2,
    BasicMemInfo = 4,
    Mmap = 6,
}

#[repr(C)]
struct TagHeader {
    typ: u32,
    size: u32,
}

/// Type of a single memory-map region, matching the Multiboot2 wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMapEntryType {
    Available,
    Reserved,
    AcpiReclaimable,
    AcpiNvs,
    Bad,
    Unknown(u32),
}

impl From<u32> for MemoryMapEntryType {
    fn from(v: u32) -> Self {
        match v {
            1 => Self::Available,
            2 => Self::Reserved,
            3 => Self::AcpiReclaimable,
            4 => Self::AcpiNvs,
            5 => Self::Bad,
            other => Self::Unknown(other),
        }
    }
}

/// One entry of the Multiboot2 memory map.
#[derive(Debug, Clone, Copy)]
pub struct MemoryMapEntry {
    pub base_addr: u64,
    pub length: u64,
    pub entry_type: MemoryMapEntryType,
}

/// Parsed view over the loader-provided boot-info blob.
///
/// Stores only the address; all accessors re-walk the tag list, since the
/// blob is small (a handful of tags) and this avoids needing heap storage
/// before the allocator exists.
pub struct BootInfo {
    info_addr: u64,
    total_size: u32,
}

impl BootInfo {
    /// Validate the magic and record the info-blob address.
    ///
    /// # Safety
    /// `info_addr` must be the physical address the loader passed in `rbx`,
    /// pointing at a valid Multiboot2 info blob that remains mapped and
    /// unmodified for the lifetime of the returned `BootInfo`.
    pub unsafe fn parse(magic: u32, info_addr: u64) -> KernelResult<Self> {
        if magic != MULTIBOOT2_BOOTLOADER_MAGIC {
            return Err(KernelError::BadMagic { found: magic });
        }
        // SAFETY: caller guarantees info_addr is a valid Multiboot2 blob.
        let total_size = unsafe { *(info_addr as *const u32) };
        Ok(Self {
            info_addr,
            total_size,
        })
    }

    fn tags(&self) -> TagIter<'_> {
        TagIter {
            info: self,
            offset: 8, // skip (total_size, reserved)
        }
    }

    /// The loader-reported name of the bootloader, if present.
    pub fn bootloader_name(&self) -> Option<&str> {
        self.tags().find_map(|(typ, payload)| {
            if typ == TagType::BootLoaderName as u32 {
                // Payload is a NUL-terminated string.
                let nul = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
                core::str::from_utf8(&payload[..nul]).ok()
            } else {
                None
            }
        })
    }

    /// `(mem_lower_kib, mem_upper_kib)` from the basic-meminfo tag.
    pub fn basic_meminfo(&self) -> Option<(u32, u32)> {
        self.tags().find_map(|(typ, payload)| {
            if typ == TagType::BasicMemInfo as u32 && payload.len() >= 8 {
                let lower = u32::from_le_bytes(payload[0..4].try_into().ok()?);
                let upper = u32::from_le_bytes(payload[4..8].try_into().ok()?);
                Some((lower, upper))
            } else {
                None
            }
        })
    }

    /// Iterate the physical memory-map entries.
    pub fn memory_map(&self) -> impl Iterator<Item = MemoryMapEntry> + '_ {
        self.tags()
            .filter(move |(typ, _)| *typ == TagType::Mmap as u32)
            .flat_map(|(_, payload)| MmapEntryIter::new(payload))
    }
}

/// Iterates (tag_type, payload_bytes) pairs over the tagged blob.
struct TagIter<'a> {
    info: &'a BootInfo,
    offset: u32,
}

impl<'a> Iterator for TagIter<'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.info.total_size {
            return None;
        }
        // SAFETY: offset stays within [0, total_size), which the loader
        // guarantees is backed by the info blob for the reported length.
        let header = unsafe {
            &*((self.info.info_addr + self.offset as u64) as *const TagHeader)
        };
        if header.typ == TagType::End as u32 {
            return None;
        }
        let payload_len = (header.size as usize).saturating_sub(core::mem::size_of::<TagHeader>());
        // SAFETY: payload lies within the same tag whose header was just
        // read, itself within the validated blob range.
        let payload = unsafe {
            core::slice::from_raw_parts(
                (self.info.info_addr + self.offset as u64 + 8) as *const u8,
                payload_len,
            )
        };
        let advance = (header.size + 7) & !7;
        self.offset += advance;
        Some((header.typ, payload))
    }
}

struct MmapEntryIter<'a> {
    payload: &'a [u8],
    entry_size: usize,
    offset: usize,
}

impl<'a> MmapEntryIter<'a> {
    fn new(payload: &'a [u8]) -> Self {
        // Mmap tag payload: entry_size:u32, entry_version:u32, entries[].
        let entry_size = if payload.len() >= 4 {
            u32::from_le_bytes(payload[0..4].try_into().unwrap()) as usize
        } else {
            0
        };
        Self {
            payload,
            entry_size,
            offset: 8,
        }
    }
}

impl<'a> Iterator for MmapEntryIter<'a> {
    type Item = MemoryMapEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.entry_size == 0 || self.offset + self.entry_size > self.payload.len() {
            return None;
        }
        let entry = &self.payload[self.offset..self.offset + self.entry_size];
        self.offset += self.entry_size;

        let base_addr = u64::from_le_bytes(entry[0..8].try_into().ok()?);
        let length = u64::from_le_bytes(entry[8..16].try_into().ok()?);
        let entry_type = u32::from_le_bytes(entry[16..20].try_into().ok()?);
        Some(MemoryMapEntry {
            base_addr,
            length,
            entry_type: entry_type.into(),
        })
    }
}
