//! The public query surface. An [`ElfView`] borrows the image bytes; the
//! owner keeps them alive (and unmodified) for as long as the view exists.
use crate::elf::{ElfClass, ElfInfo, got, lookup, minidebug};

/// A read-only view over an ELF image.
///
/// Attach a byte slice once ([`ElfView::attach_file`] for an on-disk file,
/// [`ElfView::attach_loaded`] for the image as it appears inside a process),
/// then query as often as needed. Nothing is mutated after attach, so a
/// fully attached view is safe to share between reader threads.
///
/// There are no errors anywhere on this surface: a slice that is not an ELF
/// leaves the view attached-but-invalid, and every query on an invalid view
/// answers zero or empty.
#[derive(Default)]
pub struct ElfView<'a> {
    bytes: &'a [u8],
    is_loaded: bool,
    info: ElfInfo,
}

impl<'a> ElfView<'a> {
    /// An empty view; attach an image to make it useful.
    pub fn new() -> Self {
        ElfView::default()
    }

    /// Attach an ELF file as it sits on disk. Tables are located through
    /// file offsets, and `.gnu_debugdata` (when present) is decompressed and
    /// merged into the symbol lookup before this returns.
    pub fn attach_file(&mut self, bytes: &'a [u8]) {
        self.attach(bytes, false);
    }

    /// Attach an ELF as it currently appears in a process's address space,
    /// e.g. the mapping found in `/proc/self/maps`. Tables are located
    /// through virtual addresses relative to the slice base. Mini debug info
    /// is not loaded into a process image and is skipped.
    pub fn attach_loaded(&mut self, bytes: &'a [u8]) {
        self.attach(bytes, true);
    }

    fn attach(&mut self, bytes: &'a [u8], is_loaded: bool) {
        self.bytes = bytes;
        self.is_loaded = is_loaded;
        self.info = ElfInfo::parse(bytes, is_loaded);
        if !is_loaded {
            minidebug::ingest(bytes, &mut self.info);
        }
    }

    /// Return to the empty state, releasing the borrow of the bytes.
    pub fn detach(&mut self) {
        *self = ElfView::default();
    }

    /// True iff an image is attached and parsed as ELF.
    pub fn is_valid(&self) -> bool {
        !self.bytes.is_empty() && self.info.elf_class != ElfClass::None
    }

    /// The parsed record behind the queries.
    pub fn info(&self) -> &ElfInfo {
        &self.info
    }

    /// 4 or 8 depending on the ELF class; 0 when invalid.
    pub fn pointer_size(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        self.info.elf_class.pointer_size()
    }

    /// The ELF `e_machine` value; 0 when invalid.
    pub fn architecture(&self) -> u16 {
        if !self.is_valid() {
            return 0;
        }
        self.info.machine
    }

    /// The smallest `p_vaddr` among the `PT_LOAD` segments. Typically only
    /// needed to convert a returned offset back to a raw `st_value`.
    pub fn load_bias(&self) -> u64 {
        self.info.load_bias
    }

    /// Span of the loaded image: `max(p_vaddr + p_memsz) - load_bias`.
    pub fn loaded_size(&self) -> usize {
        self.info.loaded_size
    }

    /// The `DT_SONAME` of the image; may be empty.
    pub fn soname(&self) -> &str {
        &self.info.soname
    }

    /// File-relative offset of `name` (`st_value - load_bias`), resolved
    /// through GNU hash, SysV hash, `.dynsym`, `.symtab`, and the mini-debug
    /// map in that order. Zero means not found.
    pub fn symbol_offset(&self, name: &str) -> u64 {
        if !self.is_valid() {
            return 0;
        }
        lookup::symbol_offset(self.bytes, &self.info, name)
    }

    /// File-relative offset of the first symbol whose name starts with
    /// `prefix` (`.dynsym` order, then `.symtab`, then the mini-debug map).
    /// Zero means none.
    pub fn first_symbol_offset_with_prefix(&self, prefix: &str) -> u64 {
        if !self.is_valid() {
            return 0;
        }
        lookup::first_symbol_offset_with_prefix(self.bytes, &self.info, prefix)
    }

    /// Every GOT/PLT slot relocated for `name`: at most one PLT jump slot
    /// first, then data slots in table order. Empty when the symbol is
    /// unknown or nothing references it.
    pub fn symbol_got_offsets(&self, name: &str) -> Vec<u64> {
        if !self.is_valid() {
            return Vec::new();
        }
        got::symbol_got_offsets(self.bytes, &self.info, name)
    }
}
