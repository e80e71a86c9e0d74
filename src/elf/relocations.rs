//! Relocation records and the relocation types that describe GOT/PLT slots.
//! see https://intezer.com/blog/executable-and-linkable-format-101-part-3-relocations/
use crate::elf::{ElfClass, Reader, Stream};
use std::error::Error;

pub const R_386_32: u32 = 1;
pub const R_386_GLOB_DAT: u32 = 6;
pub const R_386_JMP_SLOT: u32 = 7;
pub const R_ARM_ABS32: u32 = 2;
pub const R_ARM_GLOB_DAT: u32 = 21;
pub const R_ARM_JUMP_SLOT: u32 = 22;

pub const R_X86_64_64: u32 = 1;
pub const R_X86_64_GLOB_DAT: u32 = 6;
pub const R_X86_64_JUMP_SLOT: u32 = 7;
pub const R_AARCH64_ABS64: u32 = 257;
pub const R_AARCH64_GLOB_DAT: u32 = 1025;
pub const R_AARCH64_JUMP_SLOT: u32 = 1026;

/// True when a relocation of this type fills a PLT jump slot. The matching
/// type values collide across machines of the same width (e.g.
/// `R_386_JMP_SLOT` and `R_X86_64_JUMP_SLOT` are both 7), so the class is
/// all the discrimination needed.
pub fn is_jump_slot(class: ElfClass, rtype: u32) -> bool {
    match class {
        ElfClass::Elf32 => rtype == R_ARM_JUMP_SLOT || rtype == R_386_JMP_SLOT,
        ElfClass::Elf64 => rtype == R_AARCH64_JUMP_SLOT || rtype == R_X86_64_JUMP_SLOT,
        ElfClass::None => false,
    }
}

/// True when a relocation of this type fills a GOT data slot.
pub fn is_data_slot(class: ElfClass, rtype: u32) -> bool {
    match class {
        ElfClass::Elf32 => {
            rtype == R_ARM_ABS32
                || rtype == R_ARM_GLOB_DAT
                || rtype == R_386_32
                || rtype == R_386_GLOB_DAT
        }
        ElfClass::Elf64 => {
            rtype == R_AARCH64_ABS64
                || rtype == R_AARCH64_GLOB_DAT
                || rtype == R_X86_64_64
                || rtype == R_X86_64_GLOB_DAT
        }
        ElfClass::None => false,
    }
}

#[derive(Debug)]
pub struct Relocation {
    /// Where the linker patches, as a virtual address.
    pub offset: u64,

    /// Index of the referenced symbol in `.dynsym`.
    pub symbol_index: u32,

    /// Machine-specific relocation type.
    pub rtype: u32,

    pub addend: Option<i64>,
}

impl Relocation {
    /// Size in bytes of one `Rel` entry.
    pub fn rel_entry_size(class: ElfClass) -> usize {
        match class {
            ElfClass::Elf64 => 16,
            _ => 8,
        }
    }

    /// Size in bytes of one `Rela` entry.
    pub fn rela_entry_size(class: ElfClass) -> usize {
        match class {
            ElfClass::Elf64 => 24,
            _ => 12,
        }
    }

    pub fn with_no_addend(reader: &Reader, offset: usize) -> Result<Self, Box<dyn Error>> {
        Relocation::new(reader, offset, false)
    }

    pub fn with_addend(reader: &Reader, offset: usize) -> Result<Self, Box<dyn Error>> {
        Relocation::new(reader, offset, true)
    }

    fn new(reader: &Reader, offset: usize, has_addend: bool) -> Result<Self, Box<dyn Error>> {
        let mut s = Stream::new(reader, offset);
        let offset = s.read_addr()?;
        let info = s.read_addr()?;
        let addend = if has_addend {
            let raw = s.read_addr()?;
            // sign-extend from the class width
            if reader.sixty_four_bit {
                Some(raw as i64)
            } else {
                Some(raw as u32 as i32 as i64)
            }
        } else {
            None
        };
        // The r_info split differs per class: 8 type bits for ELF32, 32 for
        // ELF64.
        if reader.sixty_four_bit {
            Ok(Relocation {
                offset,
                symbol_index: (info >> 32) as u32,
                rtype: (info & 0xffffffff) as u32,
                addend,
            })
        } else {
            Ok(Relocation {
                offset,
                symbol_index: (info >> 8) as u32,
                rtype: (info & 0xff) as u32,
                addend,
            })
        }
    }
}
