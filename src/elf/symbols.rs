use crate::elf::{ElfClass, Reader, Stream};
use std::error::Error;

/// One entry of `.dynsym` or `.symtab`.
pub struct SymbolTableEntry {
    // see https://refspecs.linuxbase.org/elf/gabi4+/ch4.symtab.html
    /// Index into the symbol string table.
    pub name: u32,

    /// Can be an address, absolute value, etc. Subtracting the load bias
    /// turns an address into a file-relative offset.
    pub value: u64,

    /// Size of the symbol. Zero if the symbol has no or unknown size.
    pub size: u64,
}

impl SymbolTableEntry {
    pub fn entry_size(class: ElfClass) -> usize {
        match class {
            ElfClass::Elf64 => 24,
            _ => 16,
        }
    }

    pub fn new(reader: &Reader, offset: usize) -> Result<Self, Box<dyn Error>> {
        // Field order is different so we need both cases.
        let mut s = Stream::new(reader, offset);
        if reader.sixty_four_bit {
            let name = s.read_word()?; // 4
            let _info = s.read_byte()?; // 1
            let _other = s.read_byte()?; // 1
            let _shndx = s.read_half()?; // 2
            let value = s.read_addr()?; // 8
            let size = s.read_xword()?; // 8
            Ok(SymbolTableEntry { name, value, size })
        } else {
            let name = s.read_word()?;
            let value = s.read_addr()?;
            let size = s.read_word()? as u64;
            let _info = s.read_byte()?;
            let _other = s.read_byte()?;
            let _shndx = s.read_half()?;
            Ok(SymbolTableEntry { name, value, size })
        }
    }
}
