//! The parsed description of an attached ELF image. [`ElfInfo`] is built
//! once per attach and holds byte offsets into the attached slice, never
//! pointers: queries rehydrate typed views through [`Reader`] on access.
use crate::elf::{
    DT_JMPREL, DT_NULL, DT_PLTREL, DT_PLTRELSZ, DT_REL, DT_RELA, DT_RELASZ, DT_RELSZ, DT_SONAME,
    DT_STRTAB, DynamicEntry, ElfClass, ElfHeader, ProgramHeader, Reader, Relocation, SHF_ALLOC,
    SectionHeader, SectionType, SegmentType, SymbolTableEntry,
};
use crate::utils;
use std::collections::HashMap;
use std::error::Error;

/// Byte offset and entry count of one table inside the attached slice. The
/// count is in entries, not bytes.
#[derive(Clone, Copy, Debug)]
pub struct Table {
    pub offset: usize,
    pub count: usize,
}

/// The SysV hash table over `.dynsym`: two counts followed by the bucket and
/// chain arrays, all 32-bit words.
#[derive(Clone, Copy, Debug)]
pub struct SysvHash {
    pub nbucket: u32,
    pub nchain: u32,
    /// Byte offset of `bucket[0]`.
    pub bucket: usize,
    /// Byte offset of `chain[0]`.
    pub chain: usize,
}

/// Everything the queries need to know about an attached image. Populated
/// once by [`ElfInfo::parse`], then immutable.
#[derive(Debug, Default)]
pub struct ElfInfo {
    pub elf_class: ElfClass,
    pub little_endian: bool,
    pub machine: u16,

    /// The `DT_SONAME` entry resolved against `DT_STRTAB`; possibly empty.
    pub soname: String,

    /// The smallest `p_vaddr` among the `PT_LOAD` segments.
    pub load_bias: u64,

    /// `max(p_vaddr + p_memsz) - load_bias` across the `PT_LOAD` segments.
    pub loaded_size: usize,

    pub sysv_hash: Option<SysvHash>,

    /// Byte offset of the GNU hash header.
    pub gnu_hash: Option<usize>,

    /// `.symtab` and its string table. File mode only: neither is loaded.
    pub symtab: Option<Table>,
    pub strtab: Option<usize>,

    /// `.dynsym` and its string table.
    pub dynsym: Option<Table>,
    pub dynstr: Option<usize>,

    /// Whether the PLT relocations carry addends (`DT_PLTREL == DT_RELA`).
    pub use_rela: bool,

    pub reldyn: Option<Table>,
    pub reladyn: Option<Table>,
    pub relplt: Option<Table>,

    /// Offset and length of `.gnu_debugdata`, recorded in file mode only.
    pub mini_debug_info: Option<(usize, usize)>,

    /// Symbols harvested from the decompressed `.gnu_debugdata`, keyed by
    /// name. Values are the raw inner `st_value`s; the load bias is
    /// subtracted at query time like everywhere else.
    pub compressed_debug_symbols: HashMap<String, u64>,
}

impl ElfInfo {
    /// Parse `bytes` as an ELF image. A slice that fails the size, magic, or
    /// class checks yields an `ElfInfo` whose `elf_class` is `None`; this
    /// never fails outright. Malformed tables inside an otherwise healthy
    /// image are dropped with a warning, leaving the rest usable.
    pub fn parse(bytes: &[u8], is_loaded: bool) -> ElfInfo {
        let mut info = ElfInfo::default();
        let Ok(reader) = Reader::new(bytes) else {
            return info;
        };
        let class = ElfClass::from_ei_class(bytes[4]);
        if class == ElfClass::None {
            return info;
        }
        info.elf_class = class;
        info.little_endian = reader.little_endian;

        let Ok(header) = ElfHeader::new(&reader) else {
            return info;
        };
        info.machine = header.machine;

        if let Some(dynamic) = info.load_segments(&reader, &header) {
            info.load_dynamic(&reader, &dynamic, is_loaded);
        }
        info.load_sections(&reader, &header, is_loaded);
        info.validate_tables(&reader);
        info
    }

    /// Walk the program headers: track the `PT_LOAD` extent and remember the
    /// `PT_DYNAMIC` header.
    fn load_segments(&mut self, reader: &Reader, header: &ElfHeader) -> Option<ProgramHeader> {
        if header.ph_offset == 0 {
            return None;
        }
        let mut dynamic = None;
        let mut first_load = u64::MAX;
        let mut last_load_end = 0u64;
        let mut offset = header.ph_offset as usize;
        for _ in 0..header.num_ph_entries {
            match ProgramHeader::new(reader, offset) {
                Ok(ph) => match ph.stype {
                    SegmentType::Load => {
                        if ph.vaddr < first_load {
                            first_load = ph.vaddr;
                        }
                        let end = ph.vaddr.saturating_add(ph.mem_size);
                        if end > last_load_end {
                            last_load_end = end;
                        }
                    }
                    SegmentType::Dynamic => dynamic = Some(ph),
                    _ => (),
                },
                Err(err) => {
                    utils::warn(&format!("failed to read program header at {offset}: {err}"));
                }
            }
            offset += header.ph_entry_size as usize;
        }
        // An image with no PT_LOAD keeps bias and size at zero.
        if last_load_end > first_load {
            self.load_bias = first_load;
            self.loaded_size = (last_load_end - first_load) as usize;
        }
        dynamic
    }

    /// Walk the dynamic section. The entry count comes from `p_memsz`, not
    /// from the `DT_NULL` terminator, so a missing terminator is benign.
    fn load_dynamic(&mut self, reader: &Reader, phdr: &ProgramHeader, is_loaded: bool) {
        let entry_size = DynamicEntry::entry_size(self.elf_class);
        let base = if is_loaded { phdr.vaddr } else { phdr.offset } as usize;
        if base >= reader.len() {
            utils::warn("dynamic section falls outside the image");
            return;
        }
        let count = phdr.mem_size as usize / entry_size;

        let mut soname_offset = 0u64;
        // DT_STRTAB feeds the soname only; symbol lookups go through the
        // .dynstr section header instead.
        let mut strtab = None;
        let mut rel = None;
        let mut rela = None;
        let mut jmprel = None;
        let mut relsz = 0u64;
        let mut relasz = 0u64;
        let mut pltrelsz = 0u64;
        for i in 0..count {
            let entry = match DynamicEntry::new(reader, base + i * entry_size) {
                Ok(entry) => entry,
                Err(err) => {
                    utils::warn(&format!("failed to read dynamic entry {i}: {err}"));
                    break;
                }
            };
            // Tag payloads are taken as slice-relative positions in both
            // modes; see DESIGN.md.
            match entry.tag {
                DT_NULL => (),
                DT_SONAME => soname_offset = entry.value,
                DT_STRTAB => strtab = Some(entry.value as usize),
                DT_PLTREL => self.use_rela = entry.value == DT_RELA as u64,
                DT_REL => rel = Some(entry.value as usize),
                DT_RELA => rela = Some(entry.value as usize),
                DT_JMPREL => jmprel = Some(entry.value as usize),
                DT_RELSZ => relsz = entry.value,
                DT_RELASZ => relasz = entry.value,
                DT_PLTRELSZ => pltrelsz = entry.value,
                _ => (),
            }
        }

        // Counts resolve after the walk: DT_PLTREL may follow DT_PLTRELSZ,
        // and the PLT entry size depends on it.
        let rel_size = Relocation::rel_entry_size(self.elf_class);
        let rela_size = Relocation::rela_entry_size(self.elf_class);
        self.reldyn = rel.map(|offset| Table {
            offset,
            count: relsz as usize / rel_size,
        });
        self.reladyn = rela.map(|offset| Table {
            offset,
            count: relasz as usize / rela_size,
        });
        let plt_entry_size = if self.use_rela { rela_size } else { rel_size };
        self.relplt = jmprel.map(|offset| Table {
            offset,
            count: pltrelsz as usize / plt_entry_size,
        });

        if soname_offset != 0 {
            if let Some(strtab) = strtab {
                match reader.read_string(strtab.saturating_add(soname_offset as usize)) {
                    Ok(soname) => self.soname = soname,
                    Err(err) => utils::warn(&format!("failed to read soname: {err}")),
                }
            }
        }
    }

    /// Walk the section headers and record the tables the queries consume.
    fn load_sections(&mut self, reader: &Reader, header: &ElfHeader, is_loaded: bool) {
        if header.section_offset == 0 {
            return;
        }
        let names_offset = header.section_offset as usize
            + header.string_table_index as usize * header.section_entry_size as usize;
        let names = match SectionHeader::new(reader, names_offset) {
            Ok(shdr) => (if is_loaded { shdr.addr } else { shdr.offset }) as usize,
            Err(err) => {
                utils::warn(&format!("failed to read section name table header: {err}"));
                return;
            }
        };
        let mut offset = header.section_offset as usize;
        for _ in 0..header.num_section_entries {
            match SectionHeader::new(reader, offset) {
                Ok(shdr) => self.record_section(reader, &shdr, names, is_loaded),
                Err(err) => {
                    utils::warn(&format!("failed to read section header at {offset}: {err}"));
                }
            }
            offset += header.section_entry_size as usize;
        }
    }

    fn record_section(
        &mut self,
        reader: &Reader,
        shdr: &SectionHeader,
        names: usize,
        is_loaded: bool,
    ) {
        // A loaded image only contains SHF_ALLOC sections; everything else
        // (.symtab, .strtab, .gnu_debugdata) has no address inside it.
        let base = if is_loaded {
            if shdr.flags & SHF_ALLOC == 0 {
                return;
            }
            shdr.addr as usize
        } else {
            shdr.offset as usize
        };
        let name = reader
            .read_str_bytes(names.saturating_add(shdr.name as usize))
            .unwrap_or_default();
        let sym_size = SymbolTableEntry::entry_size(self.elf_class);
        match shdr.stype {
            SectionType::StringTable => {
                if name == b".dynstr" {
                    self.dynstr = Some(base);
                } else if name == b".strtab" {
                    self.strtab = Some(base);
                }
            }
            SectionType::SymbolTable => {
                if name == b".symtab" {
                    self.symtab = Some(Table {
                        offset: base,
                        count: shdr.size as usize / sym_size,
                    });
                }
            }
            SectionType::DynamicSymbolTable => {
                self.dynsym = Some(Table {
                    offset: base,
                    count: shdr.size as usize / sym_size,
                });
            }
            SectionType::SysvHash => match ElfInfo::read_sysv_hash(reader, base) {
                Ok(hash) => self.sysv_hash = Some(hash),
                Err(err) => utils::warn(&format!("dropping SysV hash table: {err}")),
            },
            SectionType::GnuHash => self.gnu_hash = Some(base),
            SectionType::ProgBits => {
                if name == b".gnu_debugdata" && !is_loaded {
                    self.mini_debug_info = Some((base, shdr.size as usize));
                }
            }
            _ => (),
        }
    }

    fn read_sysv_hash(reader: &Reader, base: usize) -> Result<SysvHash, Box<dyn Error>> {
        let nbucket = reader.read_word(base)?;
        let nchain = reader.read_word(base + 4)?;
        let bucket = base + 8;
        let chain = bucket + 4 * nbucket as usize;
        utils::require(
            chain + 4 * nchain as usize <= reader.len(),
            "bucket and chain arrays fall outside the image",
        )?;
        Ok(SysvHash {
            nbucket,
            nchain,
            bucket,
            chain,
        })
    }

    /// Drop any table whose extent falls outside the attached slice, so the
    /// queries can never be induced to read out of bounds.
    fn validate_tables(&mut self, reader: &Reader) {
        let len = reader.len();
        let check = |table: &mut Option<Table>, entry_size: usize, what: &str| {
            if let Some(t) = *table {
                let fits = t
                    .count
                    .checked_mul(entry_size)
                    .and_then(|bytes| t.offset.checked_add(bytes))
                    .is_some_and(|end| end <= len);
                if !fits {
                    utils::warn(&format!("dropping {what}: table falls outside the image"));
                    *table = None;
                }
            }
        };
        let sym_size = SymbolTableEntry::entry_size(self.elf_class);
        check(&mut self.symtab, sym_size, ".symtab");
        check(&mut self.dynsym, sym_size, ".dynsym");
        let rel_size = Relocation::rel_entry_size(self.elf_class);
        let rela_size = Relocation::rela_entry_size(self.elf_class);
        check(&mut self.reldyn, rel_size, "rel.dyn");
        check(&mut self.reladyn, rela_size, "rela.dyn");
        let plt_entry_size = if self.use_rela { rela_size } else { rel_size };
        check(&mut self.relplt, plt_entry_size, "rel.plt");

        if let Some(base) = self.gnu_hash {
            // full validation of the bloom/bucket/chain arrays happens on
            // access; the four header words must at least be present
            if base.checked_add(16).is_none_or(|end| end > len) {
                utils::warn("dropping GNU hash: header falls outside the image");
                self.gnu_hash = None;
            }
        }
        if let Some((offset, size)) = self.mini_debug_info {
            let fits = offset.checked_add(size).is_some_and(|end| end <= len);
            if !fits {
                utils::warn("dropping .gnu_debugdata: section falls outside the image");
                self.mini_debug_info = None;
            }
        }
        if self.dynstr.is_some_and(|base| base >= len) {
            utils::warn("dropping .dynstr: base falls outside the image");
            self.dynstr = None;
        }
        if self.strtab.is_some_and(|base| base >= len) {
            utils::warn("dropping .strtab: base falls outside the image");
            self.strtab = None;
        }
    }
}
