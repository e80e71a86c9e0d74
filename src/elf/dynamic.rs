//! The dynamic section: tag/value records inside the `PT_DYNAMIC` segment
//! describing what the dynamic linker needs. Only the tags the parser
//! recognizes are named; everything else is skipped.
use crate::elf::{ElfClass, Reader, Stream};
use std::error::Error;

pub const DT_NULL: i64 = 0;
pub const DT_PLTRELSZ: i64 = 2;
pub const DT_STRTAB: i64 = 5;
pub const DT_RELA: i64 = 7;
pub const DT_RELASZ: i64 = 8;
pub const DT_SONAME: i64 = 14;
pub const DT_REL: i64 = 17;
pub const DT_RELSZ: i64 = 18;
pub const DT_PLTREL: i64 = 20;
pub const DT_JMPREL: i64 = 23;

/// One Elf32_Dyn or Elf64_Dyn record. On disk the value is a union of
/// `d_val` and `d_ptr`; both are plain integers here.
pub struct DynamicEntry {
    pub tag: i64,
    pub value: u64,
}

impl DynamicEntry {
    pub fn entry_size(class: ElfClass) -> usize {
        match class {
            ElfClass::Elf64 => 16,
            _ => 8,
        }
    }

    pub fn new(reader: &Reader, offset: usize) -> Result<Self, Box<dyn Error>> {
        let mut s = Stream::new(reader, offset);
        if reader.sixty_four_bit {
            let tag = s.read_xword()? as i64;
            let value = s.read_xword()?;
            Ok(DynamicEntry { tag, value })
        } else {
            let tag = s.read_word()? as i32 as i64;
            let value = s.read_word()? as u64;
            Ok(DynamicEntry { tag, value })
        }
    }
}
