//! Section headers, used for linking and debugging. Also see segments.
use crate::elf::{Reader, Stream};
use std::error::Error;

/// Section occupies memory during execution. Sections without this flag
/// (`.symtab`, `.strtab`, `.gnu_debugdata`) exist only in the file.
pub const SHF_ALLOC: u64 = 1 << 1;

/// Describes a section.
#[derive(Clone)]
pub struct SectionHeader {
    // Elf32_Shdr or Elf64_Shdr, see https://gist.github.com/x0nu11byt3/bcb35c3de461e5fb66173071a2379779
    /// Index into the section-name string table. Zero means no name.
    pub name: u32,

    /// Type of the section.
    pub stype: SectionType,

    /// Write, alloc, and/or exec.
    pub flags: u64,

    /// Virtual address of the section inside the loaded image, zero for
    /// sections that are not loaded.
    pub addr: u64,

    /// Offset to the section contents in the file.
    pub offset: u64,

    /// Size of the section contents in bytes.
    pub size: u64,

    /// Set if the section holds a table of entries.
    pub entry_size: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SectionType {
    /// Dynamic linking information.
    Dynamic,

    /// Dynamic linker symbol table.
    DynamicSymbolTable,

    /// GNU style hash table with a bloom prefilter.
    GnuHash,

    /// Uninitialized data.
    NoBits,

    /// Arbitrary metadata.
    Note,

    /// Not to be used.
    Null,

    /// CPU instructions or constant data. `.gnu_debugdata` is one of these.
    ProgBits,

    /// Relocation entries with addends.
    RelocationsWith,

    /// Relocation entries without addends.
    RelocationsWithout,

    /// Strings for use by the linker and debugger.
    StringTable,

    /// Original System V symbol hash table.
    SysvHash,

    /// Full symbol table, often stripped from release builds.
    SymbolTable,

    /// A type this crate has no use for.
    Other,
}

impl SectionType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0x0 => SectionType::Null, // see https://android.googlesource.com/platform/art/+/e34fa1d/runtime/elf.h
            0x1 => SectionType::ProgBits,
            0x2 => SectionType::SymbolTable,
            0x3 => SectionType::StringTable,
            0x4 => SectionType::RelocationsWith,
            0x5 => SectionType::SysvHash,
            0x6 => SectionType::Dynamic,
            0x7 => SectionType::Note,
            0x8 => SectionType::NoBits,
            0x9 => SectionType::RelocationsWithout,
            0xb => SectionType::DynamicSymbolTable,
            0x6ffffff6 => SectionType::GnuHash,
            _ => SectionType::Other,
        }
    }
}

impl SectionHeader {
    pub fn new(reader: &Reader, offset: usize) -> Result<Self, Box<dyn Error>> {
        let mut s = Stream::new(reader, offset);
        if reader.sixty_four_bit {
            let name = s.read_word()?;
            let stype = SectionType::from_u32(s.read_word()?);
            let flags = s.read_xword()?;
            let addr = s.read_addr()?;
            let offset = s.read_offset()?;
            let size = s.read_xword()?;
            let _link = s.read_word()?;
            let _info = s.read_word()?;
            let _align = s.read_xword()?;
            let entry_size = s.read_xword()?;
            Ok(SectionHeader {
                name,
                stype,
                flags,
                addr,
                offset,
                size,
                entry_size,
            })
        } else {
            let name = s.read_word()?;
            let stype = SectionType::from_u32(s.read_word()?);
            let flags = s.read_word()? as u64;
            let addr = s.read_addr()?;
            let offset = s.read_offset()?;
            let size = s.read_word()? as u64;
            let _link = s.read_word()?;
            let _info = s.read_word()?;
            let _align = s.read_word()?;
            let entry_size = s.read_word()? as u64;
            Ok(SectionHeader {
                name,
                stype,
                flags,
                addr,
                offset,
                size,
                entry_size,
            })
        }
    }
}
