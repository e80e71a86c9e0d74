use crate::elf::{Reader, Stream};
use std::error::Error;

/// The ELF class selects the width of every on-disk record. `None` means no
/// parse happened (empty view, bad magic, or an unrecognized class byte).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ElfClass {
    #[default]
    None,
    Elf32,
    Elf64,
}

impl ElfClass {
    /// Maps the `EI_CLASS` ident byte; anything but 1 or 2 is `None`.
    pub fn from_ei_class(value: u8) -> Self {
        match value {
            1 => ElfClass::Elf32,
            2 => ElfClass::Elf64,
            _ => ElfClass::None,
        }
    }

    pub fn pointer_size(self) -> usize {
        match self {
            ElfClass::None => 0,
            ElfClass::Elf32 => 4,
            ElfClass::Elf64 => 8,
        }
    }
}

/// The fixed header at the start of every ELF image. Only the fields the
/// parser consumes are kept.
pub struct ElfHeader {
    /// Machine architecture, e.g. 62 for x86-64 or 183 for aarch64.
    pub machine: u16,

    /// Offset to the program header table, zero if absent.
    pub ph_offset: u64,
    pub ph_entry_size: u16,
    pub num_ph_entries: u16,

    /// Offset to the section header table, zero if absent.
    pub section_offset: u64,
    pub section_entry_size: u16,
    pub num_section_entries: u16,

    /// Index of the section holding section names.
    pub string_table_index: u16,
}

impl ElfHeader {
    pub fn new(reader: &Reader) -> Result<Self, Box<dyn Error>> {
        // The 16 ident bytes were validated when the reader was built; the
        // remaining fields are word-size dependent past e_version.
        let mut s = Stream::new(reader, 16);
        let _e_type = s.read_half()?;
        let machine = s.read_half()?;
        let _e_version = s.read_word()?;
        let _e_entry = s.read_addr()?;
        let ph_offset = s.read_offset()?;
        let section_offset = s.read_offset()?;
        let _e_flags = s.read_word()?;
        let _e_ehsize = s.read_half()?;
        let ph_entry_size = s.read_half()?;
        let num_ph_entries = s.read_half()?;
        let section_entry_size = s.read_half()?;
        let num_section_entries = s.read_half()?;
        let string_table_index = s.read_half()?;
        Ok(ElfHeader {
            machine,
            ph_offset,
            ph_entry_size,
            num_ph_entries,
            section_offset,
            section_entry_size,
            num_section_entries,
            string_table_index,
        })
    }
}
