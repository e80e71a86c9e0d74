//! Owning convenience over [`ElfView`]: open a path, map it, parse once.
use crate::elf::{ElfClass, ElfInfo, got, lookup, minidebug};
use crate::utils;
use memmap2::Mmap;
use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

/// An ELF file mapped from disk. Holds the mapping for as long as it lives,
/// so unlike [`ElfView`] there is no borrow for the caller to manage. All
/// queries behave exactly as the file-mode view's do.
pub struct ElfFile {
    pub path: PathBuf,
    bytes: Mmap,
    info: ElfInfo,
}

impl ElfFile {
    pub fn new(path: PathBuf) -> Result<Self, Box<dyn Error>> {
        // This is unsafe because it has undefined behavior if the underlying
        // file is modified while the memory map is in use.
        let file = File::open(&path)?;
        let bytes = unsafe { Mmap::map(&file) }?;
        let mut info = ElfInfo::parse(&bytes, false);
        utils::require(info.elf_class != ElfClass::None, "not an ELF file")?;
        minidebug::ingest(&bytes, &mut info);
        Ok(ElfFile { path, bytes, info })
    }

    pub fn info(&self) -> &ElfInfo {
        &self.info
    }

    pub fn pointer_size(&self) -> usize {
        self.info.elf_class.pointer_size()
    }

    pub fn architecture(&self) -> u16 {
        self.info.machine
    }

    pub fn load_bias(&self) -> u64 {
        self.info.load_bias
    }

    pub fn loaded_size(&self) -> usize {
        self.info.loaded_size
    }

    pub fn soname(&self) -> &str {
        &self.info.soname
    }

    pub fn symbol_offset(&self, name: &str) -> u64 {
        lookup::symbol_offset(&self.bytes, &self.info, name)
    }

    pub fn first_symbol_offset_with_prefix(&self, prefix: &str) -> u64 {
        lookup::first_symbol_offset_with_prefix(&self.bytes, &self.info, prefix)
    }

    pub fn symbol_got_offsets(&self, name: &str) -> Vec<u64> {
        got::symbol_got_offsets(&self.bytes, &self.info, name)
    }
}
